use nalgebra::Vector3;

use crate::controller::DeviceController;
use crate::kinematic_traits::Position;
use crate::kinematics_impl::StamperKinematics;
use crate::mock::MockTransport;
use crate::parameters::falcon_kinematics::{ControllerConfig, GeometryConstants};

pub(crate) fn robot() -> StamperKinematics {
    StamperKinematics::new(GeometryConstants::novint_falcon())
}

pub(crate) fn centre() -> Position {
    Vector3::new(0.0, 0.0, 0.11)
}

/// Mock device resting at the centre of the workspace.
pub(crate) fn transport_at_centre() -> MockTransport {
    MockTransport::at_position(&robot(), &centre()).expect("centre must be reachable")
}

pub(crate) fn controller_with(transport: MockTransport, config: ControllerConfig) -> DeviceController<MockTransport> {
    DeviceController::new(transport, GeometryConstants::novint_falcon(), config)
        .expect("controller must start")
}

pub(crate) fn controller(transport: MockTransport) -> DeviceController<MockTransport> {
    controller_with(transport, ControllerConfig::default())
}

pub(crate) fn assert_close(actual: &Vector3<f64>, expected: &Vector3<f64>, tolerance: f64) {
    let distance = (actual - expected).norm();
    assert!(distance <= tolerance,
            "{:?} is {} away from {:?}, more than {}", actual, distance, expected, tolerance);
}
