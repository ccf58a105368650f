//! Grip buttons, their press-release toggle logic and LED colors

use bitflags::bitflags;

bitflags! {
    /// Raw digital inputs of the four-button grip.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonMask: u32 {
        const BUTTON_1 = 0x01;
        const BUTTON_2 = 0x02;
        const BUTTON_3 = 0x04;
        const BUTTON_4 = 0x08;
    }
}

bitflags! {
    /// LED bits understood by the device firmware.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LedColor: u32 {
        const GREEN = 0x02;
        const BLUE = 0x04;
        const RED = 0x08;
    }
}

impl LedColor {
    pub fn from_rgb(red: bool, green: bool, blue: bool) -> Self {
        let mut led = LedColor::empty();
        led.set(LedColor::RED, red);
        led.set(LedColor::GREEN, green);
        led.set(LedColor::BLUE, blue);
        led
    }

    /// Decodes a color command vector. A component switches its color on only if it
    /// truncates to exactly 1.
    pub fn from_rgb_vector(rgb: [f64; 3]) -> Self {
        let on = |v: f64| v.trunc() == 1.0;
        Self::from_rgb(on(rgb[0]), on(rgb[1]), on(rgb[2]))
    }
}

/// The four grip buttons, in channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Right,
    Up,
    Center,
    Left,
}

impl Button {
    pub const ALL: [Button; 4] = [Button::Right, Button::Up, Button::Center, Button::Left];

    pub fn index(self) -> usize {
        match self {
            Button::Right => 0,
            Button::Up => 1,
            Button::Center => 2,
            Button::Left => 3,
        }
    }

    pub fn mask(self) -> ButtonMask {
        match self {
            Button::Right => ButtonMask::BUTTON_1,
            Button::Up => ButtonMask::BUTTON_2,
            Button::Center => ButtonMask::BUTTON_3,
            Button::Left => ButtonMask::BUTTON_4,
        }
    }

    pub fn from_name(name: &str) -> Option<Button> {
        match name.to_ascii_lowercase().as_str() {
            "right" => Some(Button::Right),
            "up" => Some(Button::Up),
            "center" | "centre" => Some(Button::Center),
            "left" => Some(Button::Left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    PressedPendingRelease,
    /// Held since before a reset; the release is swallowed.
    HeldSinceReset,
}

/// Toggle output of one button channel. The output flips exactly once per full
/// press-release cycle, at the release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToggleButton {
    phase: Phase,
    toggled: bool,
}

impl ToggleButton {
    /// Feeds the raw level of one tick. Returns true if the output flipped.
    pub fn update(&mut self, pressed: bool) -> bool {
        match (self.phase, pressed) {
            (Phase::HeldSinceReset, true) => false,
            (Phase::HeldSinceReset, false) => {
                self.phase = Phase::Idle;
                false
            }
            (_, true) => {
                self.phase = Phase::PressedPendingRelease;
                false
            }
            (Phase::PressedPendingRelease, false) => {
                self.phase = Phase::Idle;
                self.toggled = !self.toggled;
                true
            }
            (Phase::Idle, false) => false,
        }
    }

    pub fn is_on(&self) -> bool {
        self.toggled
    }

    pub fn release_pending(&self) -> bool {
        self.phase == Phase::PressedPendingRelease
    }

    /// Output as published, 0 or 1.
    pub fn value(&self) -> i16 {
        self.toggled as i16
    }

    pub fn reset(&mut self) {
        *self = ToggleButton::default();
    }

    /// Clears the output. If the button is down right now, its current press will not toggle.
    pub fn reset_while(&mut self, pressed: bool) {
        self.reset();
        if pressed {
            self.phase = Phase::HeldSinceReset;
        }
    }
}

/// All four toggle channels of the grip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonBank {
    channels: [ToggleButton; 4],
}

impl ButtonBank {
    /// Updates every channel from the raw input mask.
    pub fn update(&mut self, inputs: ButtonMask) {
        for button in Button::ALL {
            self.channels[button.index()].update(inputs.contains(button.mask()));
        }
    }


    pub fn get(&self, button: Button) -> &ToggleButton {
        &self.channels[button.index()]
    }

    pub fn values(&self) -> [i16; 4] {
        self.channels.map(|c| c.value())
    }

    /// Clears every channel. Buttons held in `inputs` need a fresh press before they toggle again.
    pub fn reset_holding(&mut self, inputs: ButtonMask) {
        for button in Button::ALL {
            self.channels[button.index()].reset_while(inputs.contains(button.mask()));
        }
    }
}
