//! Defines the linkage geometry and solver/controller settings

pub mod falcon_kinematics {
    use crate::buttons::Button;
    use crate::utils::deg;
    use nalgebra::Vector3;

    /// Physical constants of the three-leg parallel linkage. All lengths are in meters.
    /// See [parameters_robots.rs](parameters_robots.rs) for the reference device values.
    ///
    /// Each leg is described in its own UVW frame, obtained by rotating the world XYZ frame
    /// about Z by the leg azimuth `phy` and shifting by `(-r, -s, 0)`.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GeometryConstants {
        /// Length of the upper arm (shoulder joint to elbow).
        pub a: f64,

        /// Length of the parallel lower arms.
        pub b: f64,

        /// Offset between the shoulder axis and the base plane along U.
        pub c: f64,

        /// Offset of the lower arm attachment at the elbow.
        pub d: f64,

        /// Offset of the lower arm attachment at the effector.
        pub e: f64,

        /// Vertical offset of the lower arm plane along V.
        pub f: f64,

        /// Lateral offset of the leg frame along U.
        pub r: f64,

        /// Lateral offset of the leg frame along V.
        pub s: f64,

        /// Azimuth of each leg around the base, radians.
        pub phy: [f64; 3],
    }

    impl GeometryConstants {
        /// Convert to string yaml representation (quick viewing, etc).
        pub fn to_yaml(&self) -> String {
            format!(
                "falcon_geometry:\n  \
              a: {}\n  \
              b: {}\n  \
              c: {}\n  \
              d: {}\n  \
              e: {}\n  \
              f: {}\n  \
              r: {}\n  \
              s: {}\n  \
              phy: [{}]\n",
                self.a,
                self.b,
                self.c,
                self.d,
                self.e,
                self.f,
                self.r,
                self.s,
                self.phy.iter().map(|x| deg(x))
                    .collect::<Vec<_>>().join(", "),
            )
        }
    }

    /// Newton-Raphson forward kinematics tuning.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SolverSettings {
        /// Iteration stops once the norm of the shoulder angle residuals falls below this, radians.
        pub tolerance: f64,

        /// Hard upper bound on the number of correction steps.
        pub max_iterations: usize,

        /// Starting step factor, halved every time the residual grows.
        pub initial_step: f64,

        /// Jacobians with an absolute determinant below this are treated as singular.
        pub min_determinant: f64,
    }

    impl Default for SolverSettings {
        fn default() -> Self {
            SolverSettings {
                tolerance: 0.01,
                max_iterations: 15,
                initial_step: 0.5,
                min_determinant: 1e-9,
            }
        }
    }

    /// Settings of the per-tick device controller.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ControllerConfig {
        pub solver: SolverSettings,

        /// Position guess for the very first forward kinematics solve, roughly
        /// the centre of the workspace.
        pub initial_guess: Vector3<f64>,

        /// Per-axis force limit, applied symmetrically.
        pub max_force: f64,

        /// Pressing this button completes calibration.
        pub calibration_button: Button,
    }

    impl Default for ControllerConfig {
        fn default() -> Self {
            ControllerConfig {
                solver: SolverSettings::default(),
                initial_guess: Vector3::new(0.0, 0.0, 0.11),
                max_force: 5.0,
                calibration_button: Button::Center,
            }
        }
    }

    /// Settings of the periodic tick driver.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct DriverConfig {
        /// Tick period in milliseconds.
        pub period_ms: u64,

        /// The driver gives up after this many transport failures in a row.
        pub max_consecutive_failures: u32,
    }

    impl Default for DriverConfig {
        fn default() -> Self {
            DriverConfig {
                period_ms: 10,
                max_consecutive_failures: 3,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::falcon_kinematics::GeometryConstants;

    #[test]
    fn test_to_yaml() {
        let yaml = GeometryConstants::novint_falcon().to_yaml();
        assert!(yaml.starts_with("falcon_geometry:\n"));
        assert!(yaml.contains("  b: 0.1025\n"));
        assert!(yaml.contains("phy: [0, deg(120.0000), deg(240.0000)]"));
    }
}
