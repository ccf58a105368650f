//! Closed-form inverse and Newton-Raphson forward kinematics of the three-leg linkage

use crate::jacobian::VelocityJacobian;
use crate::kinematic_traits::{ForwardSolution, JointAngles, Kinematics, KinematicsError, Position};
use crate::parameters::falcon_kinematics::{GeometryConstants, SolverSettings};
use crate::utils::is_finite;
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

/// Kinematics after Stamper's analysis of the delta-style parallel manipulator, extended with
/// a second lateral offset `s` per leg.
#[derive(Debug, Clone, Copy)]
pub struct StamperKinematics {
    geometry: GeometryConstants,
    settings: SolverSettings,
}

/// Angles of one leg, in that leg's UVW frame.
struct LegAngles {
    theta1: f64,
    theta2: f64,
    theta3: f64,
}

impl StamperKinematics {
    /// Creates a new `StamperKinematics` instance with the given geometry and default solver settings.
    pub fn new(geometry: GeometryConstants) -> Self {
        StamperKinematics { geometry, settings: SolverSettings::default() }
    }

    pub fn new_with_settings(geometry: GeometryConstants, settings: SolverSettings) -> Self {
        StamperKinematics { geometry, settings }
    }

    pub fn geometry(&self) -> &GeometryConstants {
        &self.geometry
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Velocity Jacobian at the given joint angles.
    pub fn jacobian(&self, angles: &JointAngles) -> Result<VelocityJacobian, KinematicsError> {
        VelocityJacobian::new(&self.geometry, angles, self.settings.min_determinant)
    }

    /// Position of the tool in the UVW frame of the given leg.
    fn to_leg_frame(&self, leg: usize, world: &Position) -> Vector3<f64> {
        let g = &self.geometry;
        let (sin_phy, cos_phy) = g.phy[leg].sin_cos();
        let rotation = Matrix3::new(
            cos_phy, sin_phy, 0.0,
            -sin_phy, cos_phy, 0.0,
            0.0, 0.0, 1.0,
        );
        rotation * world + Vector3::new(-g.r, -g.s, 0.0)
    }

    fn solve_leg(&self, leg: usize, p: &Vector3<f64>) -> Result<LegAngles, KinematicsError> {
        let g = &self.geometry;
        let unreachable = |reason| KinematicsError::Unreachable { leg, reason };

        // theta3 has two roots; for this mechanism only the positive one is physical.
        let cos3 = (p.y + g.f) / g.b;
        if !(-1.0..=1.0).contains(&cos3) {
            return Err(unreachable("lower arm cannot span the V offset"));
        }
        let theta3 = cos3.acos();
        let sin3 = theta3.sin();

        // theta1 from the quadratic l2*T^2 + l1*T + l0 = 0 with T = tan(theta1/2).
        let common = p.z * p.z + p.x * p.x + 2.0 * g.c * p.x + g.a * g.a + g.c * g.c
            - g.d * g.d - g.e * g.e
            - g.b * g.b * sin3 * sin3
            - 2.0 * g.b * g.e * sin3
            - 2.0 * g.b * g.d * sin3
            - 2.0 * g.d * g.e;
        let l0 = common - 2.0 * g.a * p.x - 2.0 * g.a * g.c;
        let l1 = -4.0 * g.a * p.z;
        let l2 = common + 2.0 * g.a * p.x + 2.0 * g.a * g.c;

        if l2 == 0.0 {
            return Err(unreachable("degenerate shoulder quadratic"));
        }
        let discriminant = l1 * l1 - 4.0 * l0 * l2;
        if discriminant < 0.0 {
            return Err(unreachable("shoulder quadratic has no real root"));
        }
        // Always the "minus" root: it is the elbow-out configuration the device is built in.
        let t = (-l1 - discriminant.sqrt()) / (2.0 * l2);
        let theta1 = 2.0 * t.atan();

        let cos2 = (-p.x + g.a * theta1.cos() - g.c) / (-g.d - g.e - g.b * sin3);
        if !(-1.0..=1.0).contains(&cos2) {
            return Err(unreachable("upper arm cannot reach the U coordinate"));
        }
        let theta2 = cos2.acos();

        Ok(LegAngles { theta1, theta2, theta3 })
    }

    fn residual(target: &Vector3<f64>, angles: &JointAngles) -> f64 {
        (target - angles.theta1).norm()
    }
}

impl Kinematics for StamperKinematics {
    fn inverse(&self, position: &Position) -> Result<JointAngles, KinematicsError> {
        if !is_finite(position) {
            return Err(KinematicsError::InvalidInput(format!("position {:?}", position)));
        }

        let mut angles = JointAngles {
            theta1: Vector3::zeros(),
            theta2: Vector3::zeros(),
            theta3: Vector3::zeros(),
        };
        for leg in 0..3 {
            let local = self.to_leg_frame(leg, position);
            let solved = self.solve_leg(leg, &local)?;
            angles.theta1[leg] = solved.theta1;
            angles.theta2[leg] = solved.theta2;
            angles.theta3[leg] = solved.theta3;
        }
        Ok(angles)
    }

    /// There is no closed-form forward solution, so the position is searched with
    /// Newton-Raphson steps through the inverted Jacobian. The step factor halves every
    /// time the residual grows.
    ///
    /// A guess that is itself unreachable is an error. A correction that would leave the
    /// workspace, or a singular Jacobian, only damps or stops the search; the solution then
    /// reports `converged == false` and carries the last reachable iterate.
    fn forward(&self, theta1: &Vector3<f64>, guess: &Position) -> Result<ForwardSolution, KinematicsError> {
        if !is_finite(theta1) {
            return Err(KinematicsError::InvalidInput(format!("joint angles {:?}", theta1)));
        }

        let mut position = *guess;
        let mut angles = self.inverse(&position)?;
        let mut error = Self::residual(theta1, &angles);
        let mut step = self.settings.initial_step;

        if error < self.settings.tolerance {
            return Ok(ForwardSolution { position, converged: true, iterations: 0, error });
        }

        for iteration in 1..=self.settings.max_iterations {
            let jacobian = match self.jacobian(&angles) {
                Ok(jacobian) => jacobian,
                Err(e) => {
                    // No usable correction direction, end with the last iterate instead of an undamped step
                    debug!("Forward kinematics stopped at iteration {}: {}", iteration, e);
                    return Ok(ForwardSolution { position, converged: false, iterations: iteration - 1, error });
                }
            };

            let delta = jacobian.cartesian_delta(&(theta1 - angles.theta1)) * step;
            let candidate = position + delta;

            let candidate_angles = match self.inverse(&candidate) {
                Ok(candidate_angles) => candidate_angles,
                Err(e) => {
                    debug!("Step {} left the workspace ({}), damping", iteration, e);
                    step /= 2.0;
                    continue;
                }
            };

            let previous_error = error;
            position = candidate;
            angles = candidate_angles;
            error = Self::residual(theta1, &angles);

            if error < self.settings.tolerance {
                return Ok(ForwardSolution { position, converged: true, iterations: iteration, error });
            }
            if error > previous_error {
                // Overshot, reduce the step size to avoid oscillation
                step /= 2.0;
            }
        }

        Ok(ForwardSolution { position, converged: false, iterations: self.settings.max_iterations, error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn robot() -> StamperKinematics {
        StamperKinematics::new(GeometryConstants::novint_falcon())
    }

    #[test]
    fn test_inverse_centre_is_symmetric() {
        let angles = robot().inverse(&Vector3::new(0.0, 0.0, 0.11)).unwrap();
        assert!(angles.is_valid());
        for leg in 1..3 {
            assert!((angles.theta1[leg] - angles.theta1[0]).abs() < 1e-12);
            assert!((angles.theta2[leg] - angles.theta2[0]).abs() < 1e-12);
            assert!((angles.theta3[leg] - angles.theta3[0]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_inverse_selects_positive_theta3() {
        let angles = robot().inverse(&Vector3::new(0.02, -0.01, 0.12)).unwrap();
        for leg in 0..3 {
            assert!(angles.theta3[leg] > 0.0);
            assert!(angles.theta3[leg] < std::f64::consts::PI);
        }
    }

    #[test]
    fn test_inverse_shoulder_rises_with_tool() {
        let low = robot().inverse(&Vector3::new(0.0, 0.0, 0.09)).unwrap();
        let high = robot().inverse(&Vector3::new(0.0, 0.0, 0.14)).unwrap();
        for leg in 0..3 {
            assert!(low.theta1[leg] < 0.0);
            assert!(high.theta1[leg] > 0.0);
        }
    }

    #[test]
    fn test_inverse_unreachable() {
        let result = robot().inverse(&Vector3::new(0.5, 0.0, 0.1));
        assert!(matches!(result, Err(KinematicsError::Unreachable { .. })), "{:?}", result);

        let result = robot().inverse(&Vector3::new(0.0, 0.0, 0.3));
        assert!(matches!(result, Err(KinematicsError::Unreachable { .. })), "{:?}", result);
    }

    #[test]
    fn test_inverse_rejects_nan() {
        let result = robot().inverse(&Vector3::new(f64::NAN, 0.0, 0.1));
        assert!(matches!(result, Err(KinematicsError::InvalidInput(_))));
    }

    #[test]
    fn test_forward_recovers_position() {
        let robot = robot();
        let target = Vector3::new(0.02, 0.01, 0.12);
        let angles = robot.inverse(&target).unwrap();

        let solution = robot.forward(&angles.theta1, &Vector3::new(0.0, 0.0, 0.11)).unwrap();
        assert!(solution.converged);
        assert!(solution.iterations <= 15);
        assert!(solution.error < 0.01);
        assert!((solution.position - target).norm() < 0.002, "{:?}", solution.position);
    }

    #[test]
    fn test_forward_at_guess_needs_no_steps() {
        let robot = robot();
        let guess = Vector3::new(-0.01, 0.015, 0.1);
        let angles = robot.inverse(&guess).unwrap();

        let solution = robot.forward(&angles.theta1, &guess).unwrap();
        assert!(solution.converged);
        assert_eq!(solution.iterations, 0);
        assert_eq!(solution.position, guess);
    }

    #[test]
    fn test_forward_unreachable_guess() {
        let result = robot().forward(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 0.5));
        assert!(matches!(result, Err(KinematicsError::Unreachable { .. })));
    }

    #[test]
    fn test_forward_rejects_nan_angles() {
        let result = robot().forward(&Vector3::new(0.0, f64::NAN, 0.0), &Vector3::new(0.0, 0.0, 0.11));
        assert!(matches!(result, Err(KinematicsError::InvalidInput(_))));
    }

    #[test]
    fn test_forward_iteration_limit() {
        let settings = SolverSettings { max_iterations: 1, ..SolverSettings::default() };
        let robot = StamperKinematics::new_with_settings(GeometryConstants::novint_falcon(), settings);
        let angles = robot.inverse(&Vector3::new(-0.03, 0.02, 0.1)).unwrap();

        let solution = robot.forward(&angles.theta1, &Vector3::new(0.0, 0.0, 0.11)).unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 1);
        assert!(crate::utils::is_finite(&solution.position));
    }

    #[test]
    fn test_forward_stops_on_singular_jacobian() {
        let settings = SolverSettings { min_determinant: f64::INFINITY, ..SolverSettings::default() };
        let robot = StamperKinematics::new_with_settings(GeometryConstants::novint_falcon(), settings);
        let angles = robot.inverse(&Vector3::new(-0.03, 0.02, 0.1)).unwrap();
        let guess = Vector3::new(0.0, 0.0, 0.11);

        let solution = robot.forward(&angles.theta1, &guess).unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 0);
        assert_eq!(solution.position, guess);
        assert!(solution.error.is_finite());
        assert!(solution.error >= settings.tolerance);
    }
}
