#[cfg(test)]
mod tests {
    extern crate rand;

    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::kinematic_traits::Kinematics;
    use crate::tests::test_utils::{assert_close, robot};

    const TOLERANCE: f64 = 0.01;

    fn random_point(rng: &mut StdRng, xy: f64, z: (f64, f64)) -> Vector3<f64> {
        Vector3::new(rng.gen_range(-xy..xy), rng.gen_range(-xy..xy), rng.gen_range(z.0..z.1))
    }

    #[test]
    fn test_straight_down_configuration() {
        let robot = robot();
        let solution = robot.forward(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 0.11)).unwrap();

        assert!(solution.converged);
        assert!(solution.iterations <= 15);
        // All shoulders level: the tool sits on the axis of symmetry
        assert_close(&solution.position, &Vector3::new(0.0, 0.0, 0.1142), 0.01);
        assert!(solution.position.x.abs() < 1e-9);
        assert!(solution.position.y.abs() < 1e-9);

        let angles = robot.inverse(&solution.position).unwrap();
        assert!(angles.theta1.norm() < TOLERANCE);
    }

    #[test]
    fn test_round_trip_from_fixed_guess() {
        let robot = robot();
        let mut rng = StdRng::seed_from_u64(20240917);

        for _ in 0..500 {
            let target = random_point(&mut rng, 0.03, (0.09, 0.14));
            let angles = robot.inverse(&target).unwrap();

            let solution = robot.forward(&angles.theta1, &Vector3::new(0.0, 0.0, 0.11)).unwrap();
            assert!(solution.converged, "no convergence for {:?}", target);

            let recovered = robot.inverse(&solution.position).unwrap();
            assert!((recovered.theta1 - angles.theta1).norm() < TOLERANCE);
            assert_close(&solution.position, &target, 0.002);
        }
    }

    #[test]
    fn test_round_trip_from_random_guess() {
        let robot = robot();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let target = random_point(&mut rng, 0.03, (0.09, 0.14));
            let guess = random_point(&mut rng, 0.02, (0.10, 0.13));
            let angles = robot.inverse(&target).unwrap();

            let solution = robot.forward(&angles.theta1, &guess).unwrap();
            assert!(solution.converged, "no convergence for {:?} from {:?}", target, guess);
            assert!(solution.error < TOLERANCE);

            let recovered = robot.inverse(&solution.position).unwrap();
            assert!((recovered.theta1 - angles.theta1).norm() < TOLERANCE);
        }
    }

    #[test]
    fn test_never_returns_nan() {
        let robot = robot();
        let mut rng = StdRng::seed_from_u64(3);

        // Arbitrary shoulder angles, many of them outside the working envelope
        for _ in 0..200 {
            let theta1 = Vector3::new(rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5));
            if let Ok(solution) = robot.forward(&theta1, &Vector3::new(0.0, 0.0, 0.11)) {
                assert!(crate::utils::is_finite(&solution.position));
                assert!(solution.iterations <= 15);
                assert!(robot.inverse(&solution.position).is_ok());
            }
        }
    }
}
