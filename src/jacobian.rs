extern crate nalgebra as na;
use na::{Matrix3, Vector3};
use tracing::debug;
use crate::kinematic_traits::{JointAngles, KinematicsError};
use crate::parameters::falcon_kinematics::GeometryConstants;
use crate::utils::is_finite;

/// Analytic velocity Jacobian of the three-leg linkage.
///
/// `matrix` maps a Cartesian tool velocity to shoulder angle rates, one row per leg:
/// `theta1_dot = matrix * velocity`. The inverse maps shoulder angle deltas back to
/// Cartesian deltas and is what the forward kinematics iteration needs. Only a
/// successfully inverted Jacobian can be constructed, so the inverse is stored too.
#[derive(Debug, Clone, Copy)]
pub struct VelocityJacobian {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl VelocityJacobian {
    /// Computes and inverts the Jacobian for the given joint angles.
    ///
    /// # Arguments
    ///
    /// * `geometry` - Linkage constants
    /// * `angles` - Joint angles, typically produced by inverse kinematics
    /// * `min_determinant` - Matrices with smaller absolute determinant are rejected
    ///
    /// # Returns
    ///
    /// `KinematicsError::SingularJacobian` near the workspace boundary, where the inverse would
    /// be unreliable or contain infinities.
    pub fn new(geometry: &GeometryConstants, angles: &JointAngles, min_determinant: f64)
               -> Result<Self, KinematicsError> {
        let matrix = compute_jacobian(geometry, angles);
        if !matrix.iter().all(|v| v.is_finite()) {
            debug!("Jacobian has non-finite entries at {:?}", angles.theta1);
            return Err(KinematicsError::SingularJacobian { determinant: f64::NAN });
        }

        let determinant = matrix.determinant();
        if !determinant.is_finite() || determinant.abs() < min_determinant {
            debug!("Jacobian determinant {:e} is below the limit", determinant);
            return Err(KinematicsError::SingularJacobian { determinant });
        }

        match matrix.try_inverse() {
            Some(inverse) if inverse.iter().all(|v| v.is_finite()) => Ok(Self { matrix, inverse }),
            _ => Err(KinematicsError::SingularJacobian { determinant }),
        }
    }

    /// The Jacobian itself, rows are legs and columns are Cartesian axes.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The inverted Jacobian, mapping shoulder angle deltas to Cartesian deltas.
    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// Cartesian displacement that would change the shoulder angles by `joint_delta`
    /// (to the first order).
    pub fn cartesian_delta(&self, joint_delta: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * joint_delta
    }

    /// Shoulder velocities that produce the given Cartesian tool velocity.
    pub fn joint_velocities(&self, velocity: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * velocity
    }

    /// Motor torques that produce the given force on the tool, `torque = J⁻ᵀ * force`
    /// where `J⁻¹` maps joint deltas to Cartesian deltas.
    ///
    /// Force output of the device controller does not go through this mapping, forces
    /// are passed to the transport directly after clamping.
    pub fn torques(&self, force: &Vector3<f64>) -> Result<Vector3<f64>, KinematicsError> {
        if !is_finite(force) {
            return Err(KinematicsError::InvalidInput(format!("force {:?}", force)));
        }
        Ok(self.inverse.transpose() * force)
    }
}

/// Fills the Jacobian matrix for the given angles. Row `i` holds the partial derivatives
/// of the shoulder angle of leg `i` with respect to x, y and z. Entries are infinite when
/// a leg is fully stretched or folded.
pub fn compute_jacobian(geometry: &GeometryConstants, angles: &JointAngles) -> Matrix3<f64> {
    let mut jacobian = Matrix3::zeros();

    for leg in 0..3 {
        let (sin_phy, cos_phy) = geometry.phy[leg].sin_cos();
        let theta1 = angles.theta1[leg];
        let (sin2, cos2) = angles.theta2[leg].sin_cos();
        let (sin3, cos3) = angles.theta3[leg].sin_cos();

        let den = -geometry.a * sin3 * (theta1 - angles.theta2[leg]).sin();

        jacobian[(leg, 0)] = (cos_phy * cos2 * sin3 - sin_phy * cos3) / den;
        jacobian[(leg, 1)] = (sin_phy * cos2 * sin3 + cos_phy * cos3) / den;
        jacobian[(leg, 2)] = sin2 * sin3 / den;
    }

    jacobian
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematic_traits::Kinematics;
    use crate::kinematics_impl::StamperKinematics;

    const MIN_DETERMINANT: f64 = 1e-9;

    fn geometry() -> GeometryConstants {
        GeometryConstants::novint_falcon()
    }

    #[test]
    fn test_matches_numeric_derivative() {
        let robot = StamperKinematics::new(geometry());
        let position = Vector3::new(0.01, -0.02, 0.12);
        let angles = robot.inverse(&position).unwrap();
        let jacobian = compute_jacobian(&geometry(), &angles);

        let h = 1e-7;
        for axis in 0..3 {
            let mut perturbed = position;
            perturbed[axis] += h;
            let shifted = robot.inverse(&perturbed).unwrap();
            for leg in 0..3 {
                let numeric = (shifted.theta1[leg] - angles.theta1[leg]) / h;
                assert!((numeric - jacobian[(leg, axis)]).abs() < 1e-3,
                        "leg {} axis {}: numeric {} analytic {}", leg, axis, numeric, jacobian[(leg, axis)]);
            }
        }
    }

    #[test]
    fn test_inverse_undoes_matrix() {
        let robot = StamperKinematics::new(geometry());
        let angles = robot.inverse(&Vector3::new(-0.015, 0.01, 0.105)).unwrap();
        let jacobian = VelocityJacobian::new(&geometry(), &angles, MIN_DETERMINANT).unwrap();

        let velocity = Vector3::new(0.1, -0.2, 0.05);
        let back = jacobian.cartesian_delta(&jacobian.joint_velocities(&velocity));
        assert!((back - velocity).norm() < 1e-9);
    }

    #[test]
    fn test_folded_leg_is_singular() {
        // theta1 == theta2 makes the denominator of the first row zero
        let angles = JointAngles {
            theta1: Vector3::new(0.5, 0.0, 0.0),
            theta2: Vector3::new(0.5, 2.0, 2.0),
            theta3: Vector3::new(1.5, 1.5, 1.5),
        };
        let result = VelocityJacobian::new(&geometry(), &angles, MIN_DETERMINANT);
        assert!(matches!(result, Err(KinematicsError::SingularJacobian { .. })));
    }

    #[test]
    fn test_torques_are_transpose_mapping() {
        let robot = StamperKinematics::new(geometry());
        let angles = robot.inverse(&Vector3::new(0.0, 0.0, 0.11)).unwrap();
        let jacobian = VelocityJacobian::new(&geometry(), &angles, MIN_DETERMINANT).unwrap();

        let force = Vector3::new(0.0, 0.0, 1.0);
        let torques = jacobian.torques(&force).unwrap();
        let expected = jacobian.inverse().transpose() * force;
        assert_eq!(torques, expected);

        // Power balance: force . displacement == torque . joint delta
        let joint_delta = Vector3::new(0.01, -0.02, 0.005);
        let work_cartesian = force.dot(&jacobian.cartesian_delta(&joint_delta));
        let work_joint = torques.dot(&joint_delta);
        assert!((work_cartesian - work_joint).abs() < 1e-12);

        assert!(jacobian.torques(&Vector3::new(f64::NAN, 0.0, 0.0)).is_err());
    }
}
