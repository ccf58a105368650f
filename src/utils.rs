//! Helper functions

use crate::kinematic_traits::{JointAngles, Position};
use nalgebra::Vector3;

/// Checks if all elements of the vector are finite
pub fn is_finite(v: &Vector3<f64>) -> bool {
    v.iter().all(|&q| q.is_finite())
}

/// Print joint values of all legs, converting radians to degrees.
#[allow(dead_code)]
pub fn dump_angles(angles: &JointAngles) {
    for leg in 0..3 {
        println!(
            "leg {}: [{:5.2} {:5.2} {:5.2}]",
            leg,
            angles.theta1[leg].to_degrees(),
            angles.theta2[leg].to_degrees(),
            angles.theta3[leg].to_degrees()
        );
    }
}

pub fn dump_position(position: &Position) {
    println!("x: {:.5}, y: {:.5}, z: {:.5}", position.x, position.y, position.z);
}

/// formatting for YAML output
pub(crate) fn deg(x: &f64) -> String {
    if *x == 0.0 {
        return "0".to_string();
    }
    format!("deg({:.4})", x.to_degrees())
}
