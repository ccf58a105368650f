//! Rust implementation of kinematics and per-tick device control for a three-degree-of-freedom
//! parallel-link haptic controller such as the Novint Falcon.
//!
//! The inverse kinematics follows Stamper's closed-form analysis of the three-leg parallel
//! manipulator, with an additional lateral offset per leg as found in the Falcon. As no
//! closed-form forward solution exists, the tool position is searched with damped Newton-Raphson
//! steps through the analytic velocity Jacobian.
//!
//! # Features
//!
//! - Closed-form inverse kinematics with a fixed, mechanism-specific root selection.
//! - Forward kinematics bounded to a fixed number of iterations, never returning NaN.
//! - Analytic velocity Jacobian with a singularity guard, and the torque mapping.
//! - Device controller that auto-ranges the position into [0, 1], turns the four grip buttons into
//!   toggles, gates everything behind a calibration gesture and clamps the force output.
//! - Transport and messaging are traits, so the same controller runs against hardware or a
//!   scripted mock.
//!
//! # Parameters
//!
//! The linkage is described by the lengths _a, b, c, d, e, f_, the lateral offsets _r, s_ and the
//! azimuth _phy_ of every leg. Fill out a [`GeometryConstants`](parameters::falcon_kinematics::GeometryConstants)
//! structure or start from `GeometryConstants::novint_falcon()`.
//!
//! ```
//! use nalgebra::Vector3;
//! use rs_falcon_haptics::kinematic_traits::Kinematics;
//! use rs_falcon_haptics::kinematics_impl::StamperKinematics;
//! use rs_falcon_haptics::parameters::falcon_kinematics::GeometryConstants;
//!
//! let robot = StamperKinematics::new(GeometryConstants::novint_falcon());
//! let angles = robot.inverse(&Vector3::new(0.01, 0.0, 0.12)).unwrap();
//! let solution = robot.forward(&angles.theta1, &Vector3::new(0.0, 0.0, 0.11)).unwrap();
//! assert!(solution.converged);
//! ```

pub mod parameters;
pub mod parameters_robots;

#[cfg(feature = "allow_filesystem")]
pub mod parameters_from_file;
#[cfg(feature = "allow_filesystem")]
pub mod parameter_error;

pub mod utils;
pub mod kinematic_traits;
pub mod kinematics_impl;

pub mod jacobian;

pub mod buttons;
pub mod transport;
pub mod messaging;
pub mod controller;
pub mod driver;

pub mod mock;

#[cfg(test)]
mod tests;
