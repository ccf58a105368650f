//! Messaging seam: what the controller publishes every tick and where it goes

use anyhow::Result;
use nalgebra::Vector3;

use crate::buttons::Button;

/// Topic names used by the publish/subscribe layer.
pub mod topics {
    pub const POSITION: &str = "position_vector";
    pub const RIGHT_BUTTON: &str = "right_button";
    pub const UP_BUTTON: &str = "up_button";
    pub const CENTER_BUTTON: &str = "center_button";
    pub const LEFT_BUTTON: &str = "left_button";

    /// Inbound force commands, three floats in device force units.
    pub const FORCE: &str = "force_vector";
    /// Inbound color commands, three components each switching one LED color.
    pub const RGB: &str = "rgb_vector";

    /// Button topics in channel order.
    pub const BUTTONS: [&str; 4] = [RIGHT_BUTTON, UP_BUTTON, CENTER_BUTTON, LEFT_BUTTON];
}

/// Snapshot computed by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceOutput {
    /// Auto-ranged position, each axis in [0, 1].
    pub position: Vector3<f64>,
    /// Toggle outputs in channel order, 0 or 1.
    pub buttons: [i16; 4],
}

impl DeviceOutput {
    pub fn button(&self, button: Button) -> i16 {
        self.buttons[button.index()]
    }

    /// Position mapped to [-1, 1] with z pointing away from the user.
    pub fn centered(&self) -> Vector3<f64> {
        Vector3::new(
            self.position.x * 2.0 - 1.0,
            self.position.y * 2.0 - 1.0,
            -(self.position.z * 2.0 - 1.0),
        )
    }
}

/// Receives the output of every tick.
pub trait OutputSink {
    fn deliver(&mut self, output: &DeviceOutput) -> Result<()>;
}

/// Keeps every delivered output in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub outputs: Vec<DeviceOutput>,
}

impl OutputSink for RecordingSink {
    fn deliver(&mut self, output: &DeviceOutput) -> Result<()> {
        self.outputs.push(*output);
        Ok(())
    }
}

impl<F> OutputSink for F
where
    F: FnMut(&DeviceOutput) -> Result<()>,
{
    fn deliver(&mut self, output: &DeviceOutput) -> Result<()> {
        self(output)
    }
}
