//! Hardware I/O seam of the device controller
//!
//! The transport opens the device, loads its firmware and exchanges raw values over the wire.
//! The controller only needs the handful of operations below, invoked synchronously once per tick.
//! Transports are expected to bound their own latency; the controller neither retries nor times out.

use anyhow::Result;
use nalgebra::Vector3;

use crate::buttons::{ButtonMask, LedColor};

pub trait HapticTransport {
    /// Raw encoder counts, one per leg.
    fn read_encoders(&mut self) -> Result<[i32; 3]>;

    /// Converts the encoder count of a leg into its shoulder angle, radians.
    fn encoder_to_angle(&self, leg: usize, count: i32) -> f64;

    /// Current raw level of the grip buttons.
    fn read_digital_inputs(&mut self) -> Result<ButtonMask>;

    /// Per-axis force on the tool. Values arrive already clamped.
    fn write_force(&mut self, force: &Vector3<f64>) -> Result<()>;

    fn write_led(&mut self, color: LedColor) -> Result<()>;
}

/// Linear encoder calibration: the encoder wheel drives the shoulder capstan through a
/// friction drive, and the zero count is offset from the horizontal shoulder position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderMapping {
    /// Quadrature counts per revolution of the encoder wheel.
    pub counts_per_revolution: f64,
    /// Ratio of the shaft diameter to the capstan diameter.
    pub drive_ratio: f64,
    /// Shoulder angle at zero count, degrees.
    pub offset_degrees: f64,
}

impl EncoderMapping {
    /// Calibration of the Novint Falcon: 320 slots read in quadrature, 8.7 mm shaft on a
    /// 116 mm capstan, -15° at zero count.
    pub fn novint_falcon() -> Self {
        EncoderMapping {
            counts_per_revolution: 4.0 * 320.0,
            drive_ratio: 8.7 / 116.0,
            offset_degrees: -15.0,
        }
    }

    pub fn to_degrees(&self, count: i32) -> f64 {
        (count as f64 * 360.0 / self.counts_per_revolution) * self.drive_ratio + self.offset_degrees
    }

    pub fn to_radians(&self, count: i32) -> f64 {
        self.to_degrees(count).to_radians()
    }

    /// Inverse mapping, rounded to the nearest count.
    pub fn to_count(&self, radians: f64) -> i32 {
        ((radians.to_degrees() - self.offset_degrees) / self.drive_ratio
            * self.counts_per_revolution / 360.0).round() as i32
    }
}

impl Default for EncoderMapping {
    fn default() -> Self {
        Self::novint_falcon()
    }
}
