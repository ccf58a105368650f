//! Shared kinematic types, the solver trait and its error type

extern crate nalgebra as na;

use std::fmt;
use na::Vector3;

/// Cartesian position of the tool in meters.
/// ```
/// use nalgebra::Vector3;
/// use rs_falcon_haptics::kinematic_traits::Position;
///
/// let centre: Position = Vector3::new(0.0, 0.0, 0.11);
/// ```
pub type Position = Vector3<f64>;

/// Joint angles of all three legs, radians. Each field holds one value per leg,
/// in leg order, so `theta1` is directly comparable with raw encoder angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngles {
    /// Shoulder angles, the only actuated (and sensed) joints.
    pub theta1: Vector3<f64>,
    /// Elbow-adjacent angles.
    pub theta2: Vector3<f64>,
    /// Wrist-adjacent angles.
    pub theta3: Vector3<f64>,
}

impl JointAngles {
    /// True if every angle is finite.
    pub fn is_valid(&self) -> bool {
        self.theta1.iter()
            .chain(self.theta2.iter())
            .chain(self.theta3.iter())
            .all(|q| q.is_finite())
    }
}

/// Result of the iterative forward kinematics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardSolution {
    /// Best position estimate. When `converged` is false this is the last iterate.
    pub position: Position,
    /// True if the residual fell below the tolerance.
    pub converged: bool,
    /// Number of correction steps taken.
    pub iterations: usize,
    /// Norm of the shoulder angle residuals at `position`, radians.
    pub error: f64,
}

/// Kinematic solver of a three-leg parallel mechanism.
pub trait Kinematics {
    /// Joint angles that place the tool at the given position.
    fn inverse(&self, position: &Position) -> Result<JointAngles, KinematicsError>;

    /// Tool position for the given shoulder angles, starting the search from `guess`.
    fn forward(&self, theta1: &Vector3<f64>, guess: &Position) -> Result<ForwardSolution, KinematicsError>;
}

/// Failures of the kinematic solver.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// The pose cannot be reached by the given leg (acos argument outside [-1, 1],
    /// negative discriminant or zero denominator).
    Unreachable { leg: usize, reason: &'static str },
    /// The velocity Jacobian cannot be reliably inverted.
    SingularJacobian { determinant: f64 },
    /// Non-finite input values.
    InvalidInput(String),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            KinematicsError::Unreachable { leg, reason } =>
                write!(f, "Unreachable pose for leg {}: {}", leg, reason),
            KinematicsError::SingularJacobian { determinant } =>
                write!(f, "Singular Jacobian, determinant {:e}", determinant),
            KinematicsError::InvalidInput(ref msg) =>
                write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for KinematicsError {}
