//! Scripted transport for exercising the controller without hardware

use std::collections::VecDeque;

use anyhow::{bail, Result};
use nalgebra::Vector3;

use crate::buttons::{ButtonMask, LedColor};
use crate::kinematic_traits::{Kinematics, KinematicsError, Position};
use crate::transport::{EncoderMapping, HapticTransport};

/// One device reading: shoulder encoder counts and button levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockFrame {
    pub encoders: [i32; 3],
    pub inputs: ButtonMask,
}

/// Replays queued frames, one per tick, and records everything written to it.
/// When the queue runs dry the last frame keeps being reported. Every encoder read, including
/// the one a controller makes when it starts, consumes a queued frame.
#[derive(Debug, Clone)]
pub struct MockTransport {
    pub mapping: EncoderMapping,
    pub current: MockFrame,
    pub frames: VecDeque<MockFrame>,
    /// Forces written, in order.
    pub forces: Vec<Vector3<f64>>,
    /// LED colors written, in order.
    pub leds: Vec<LedColor>,
    /// Number of upcoming encoder reads that fail.
    pub failing_reads: u32,
}

impl MockTransport {
    pub fn new(encoders: [i32; 3]) -> Self {
        MockTransport {
            mapping: EncoderMapping::novint_falcon(),
            current: MockFrame { encoders, inputs: ButtonMask::empty() },
            frames: VecDeque::new(),
            forces: Vec::new(),
            leds: Vec::new(),
            failing_reads: 0,
        }
    }

    /// Transport whose device currently rests at the given tool position.
    pub fn at_position(kinematics: &impl Kinematics, position: &Position) -> Result<Self, KinematicsError> {
        let mut transport = Self::new([0; 3]);
        transport.current.encoders = transport.encoders_for(kinematics, position)?;
        Ok(transport)
    }

    /// Encoder counts that report the given shoulder angles.
    pub fn encoders_for_angles(&self, theta1: &Vector3<f64>) -> [i32; 3] {
        [
            self.mapping.to_count(theta1[0]),
            self.mapping.to_count(theta1[1]),
            self.mapping.to_count(theta1[2]),
        ]
    }

    pub fn encoders_for(&self, kinematics: &impl Kinematics, position: &Position) -> Result<[i32; 3], KinematicsError> {
        let angles = kinematics.inverse(position)?;
        Ok(self.encoders_for_angles(&angles.theta1))
    }

    pub fn push_frame(&mut self, encoders: [i32; 3], inputs: ButtonMask) {
        self.frames.push_back(MockFrame { encoders, inputs });
    }

    /// Queues a frame with unchanged encoders and the given buttons.
    pub fn push_buttons(&mut self, inputs: ButtonMask) {
        let encoders = self.frames.back().unwrap_or(&self.current).encoders;
        self.push_frame(encoders, inputs);
    }

    pub fn push_position(&mut self, kinematics: &impl Kinematics, position: &Position, inputs: ButtonMask)
                         -> Result<(), KinematicsError> {
        let encoders = self.encoders_for(kinematics, position)?;
        self.push_frame(encoders, inputs);
        Ok(())
    }

    pub fn last_force(&self) -> Option<&Vector3<f64>> {
        self.forces.last()
    }
}

impl HapticTransport for MockTransport {
    fn read_encoders(&mut self) -> Result<[i32; 3]> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            bail!("mock device did not answer");
        }
        if let Some(frame) = self.frames.pop_front() {
            self.current = frame;
        }
        Ok(self.current.encoders)
    }

    fn encoder_to_angle(&self, _leg: usize, count: i32) -> f64 {
        self.mapping.to_radians(count)
    }

    fn read_digital_inputs(&mut self) -> Result<ButtonMask> {
        Ok(self.current.inputs)
    }

    fn write_force(&mut self, force: &Vector3<f64>) -> Result<()> {
        self.forces.push(*force);
        Ok(())
    }

    fn write_led(&mut self, color: LedColor) -> Result<()> {
        self.leds.push(color);
        Ok(())
    }
}
