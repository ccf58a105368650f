//! Hardcoded geometry for known devices

pub mod falcon_kinematics {
    use crate::parameters::falcon_kinematics::GeometryConstants;

    impl GeometryConstants {
        /// Novint Falcon, lengths as measured for the libnifalcon Stamper kinematics.
        pub fn novint_falcon() -> Self {
            GeometryConstants {
                a: 0.060,
                b: 0.1025,
                c: 0.0157,
                d: 0.0115,
                e: 0.0262,
                f: 0.0270,
                r: 0.0363,
                s: 0.0363,
                phy: [0.0, 120.0_f64.to_radians(), 240.0_f64.to_radians()],
            }
        }
    }

    impl Default for GeometryConstants {
        fn default() -> Self {
            Self::novint_falcon()
        }
    }
}
