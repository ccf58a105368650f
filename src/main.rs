use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use nalgebra::Vector3;
use rs_falcon_haptics::buttons::ButtonMask;
use rs_falcon_haptics::controller::DeviceController;
use rs_falcon_haptics::driver::TickDriver;
use rs_falcon_haptics::kinematic_traits::Kinematics;
use rs_falcon_haptics::kinematics_impl::StamperKinematics;
use rs_falcon_haptics::messaging::{topics, DeviceOutput};
use rs_falcon_haptics::mock::MockTransport;
use rs_falcon_haptics::parameters::falcon_kinematics::{ControllerConfig, DriverConfig, GeometryConstants};
use rs_falcon_haptics::utils::{dump_angles, dump_position};

/// Usage example.
fn main() -> anyhow::Result<()> {
    let geometry = GeometryConstants::novint_falcon();
    let robot = StamperKinematics::new(geometry);

    let position = Vector3::new(0.01, -0.02, 0.12);
    println!("Joint angles for the tool at:");
    dump_position(&position);
    let angles = robot.inverse(&position)?;
    dump_angles(&angles);

    let solution = robot.forward(&angles.theta1, &Vector3::new(0.0, 0.0, 0.11))?;
    println!("Forward kinematics converged: {} after {} iterations:", solution.converged, solution.iterations);
    dump_position(&solution.position);

    println!("Geometry:\n{}", geometry.to_yaml());

    // Simulated session: the grip moves around, then the center button completes calibration.
    let transport = MockTransport::at_position(&robot, &Vector3::new(0.0, 0.0, 0.11))?;
    let controller = Arc::new(DeviceController::new(transport, geometry, ControllerConfig::default())?);
    controller.with_transport(|t| -> anyhow::Result<()> {
        for (x, z) in [(-0.02, 0.10), (0.02, 0.13), (0.0, 0.115)] {
            t.push_position(&robot, &Vector3::new(x, 0.0, z), ButtonMask::empty())?;
        }
        t.push_buttons(ButtonMask::BUTTON_3);
        t.push_buttons(ButtonMask::empty());
        t.push_buttons(ButtonMask::BUTTON_1);
        t.push_buttons(ButtonMask::empty());
        Ok(())
    })?;
    controller.set_force(0.0, 0.0, 7.5)?;

    let sink = |output: &DeviceOutput| -> anyhow::Result<()> {
        let centered = output.centered();
        println!("{}: [{:.3} {:.3} {:.3}]", topics::POSITION, centered.x, centered.y, centered.z);
        for (topic, value) in topics::BUTTONS.iter().zip(output.buttons) {
            print!("{}: {} ", topic, value);
        }
        println!();
        Ok(())
    };
    let mut driver = TickDriver::new(controller.clone(), sink, DriverConfig::default());
    let ticks = driver.run(&AtomicBool::new(false), Some(8))?;

    println!("{} ticks, calibrated: {}, {:?}", ticks, controller.is_calibrated(), controller.diagnostics());
    controller.with_transport(|t| println!("Last force sent: {:?}", t.last_force()));
    Ok(())
}
