//! Per-tick device controller: encoders to position, auto-ranging, button toggles,
//! calibration and force output.
//!
//! One controller owns one device session. All state changes happen inside [`DeviceController::tick`],
//! which the external driver must never invoke concurrently with itself. Force and color commands
//! may arrive from any thread; the controller is `Sync` when its transport is `Send`.

use std::fmt;

use nalgebra::Vector3;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::buttons::{ButtonBank, LedColor};
use crate::kinematic_traits::{Kinematics, KinematicsError, Position};
use crate::kinematics_impl::StamperKinematics;
use crate::messaging::DeviceOutput;
use crate::parameters::falcon_kinematics::{ControllerConfig, GeometryConstants};
use crate::transport::HapticTransport;
use crate::utils::is_finite;

/// Controller-level state. Calibration completes once and is never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Calibrating,
    Running,
}

/// Running per-axis extremes of the observed raw positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    min: Vector3<f64>,
    max: Vector3<f64>,
}

impl AxisRange {
    /// Range containing only the given position.
    pub fn new(seed: &Position) -> Self {
        AxisRange { min: *seed, max: *seed }
    }

    /// Widens the range so that it contains the given position. Never shrinks.
    pub fn include(&mut self, position: &Position) {
        self.min = self.min.inf(position);
        self.max = self.max.sup(position);
    }

    /// Maps the position into [0, 1] per axis. An axis that has not moved yet maps to 0.5.
    pub fn normalize(&self, position: &Position) -> Vector3<f64> {
        Vector3::from_fn(|axis, _| {
            let span = self.max[axis] - self.min[axis];
            if span > 0.0 {
                ((position[axis] - self.min[axis]) / span).clamp(0.0, 1.0)
            } else {
                0.5
            }
        })
    }

    pub fn min(&self) -> &Vector3<f64> {
        &self.min
    }

    pub fn max(&self) -> &Vector3<f64> {
        &self.max
    }

    pub fn contains(&self, position: &Position) -> bool {
        (0..3).all(|axis| self.min[axis] <= position[axis] && position[axis] <= self.max[axis])
    }
}

/// Counters of the recoverable conditions met so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    /// Completed ticks.
    pub ticks: u64,
    /// Ticks where the position could not be solved and the previous one was kept.
    pub unreachable: u64,
    /// Ticks where forward kinematics ran out of iterations.
    pub not_converged: u64,
}

/// Everything the controller remembers between ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    pub phase: ControllerPhase,
    /// Last valid raw tool position, meters.
    pub position: Position,
    pub range: AxisRange,
    pub normalized: Vector3<f64>,
    pub buttons: ButtonBank,
    pub diagnostics: Diagnostics,
}

impl DeviceState {
    fn new(position: Position) -> Self {
        let range = AxisRange::new(&position);
        DeviceState {
            phase: ControllerPhase::Calibrating,
            position,
            range,
            normalized: range.normalize(&position),
            buttons: ButtonBank::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    fn output(&self) -> DeviceOutput {
        DeviceOutput {
            position: self.normalized,
            buttons: self.buttons.values(),
        }
    }
}

/// Failures reported by the device controller.
#[derive(Debug)]
pub enum DeviceError {
    /// Device I/O failed. Fatal to the tick, the driver decides what to do next.
    Transport(anyhow::Error),
    /// The device pose could not be solved at all (only possible at construction).
    Kinematics(KinematicsError),
    /// A command was rejected and had no effect.
    InvalidCommand(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DeviceError::Transport(ref err) =>
                write!(f, "Transport Error: {:#}", err),
            DeviceError::Kinematics(ref err) =>
                write!(f, "Kinematics Error: {}", err),
            DeviceError::InvalidCommand(ref msg) =>
                write!(f, "Invalid Command: {}", msg),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Transport(err) => {
                let source: &(dyn std::error::Error + 'static) = err.as_ref();
                Some(source)
            }
            DeviceError::Kinematics(err) => Some(err),
            DeviceError::InvalidCommand(_) => None,
        }
    }
}

impl From<anyhow::Error> for DeviceError {
    fn from(err: anyhow::Error) -> Self {
        DeviceError::Transport(err)
    }
}

impl From<KinematicsError> for DeviceError {
    fn from(err: KinematicsError) -> Self {
        DeviceError::Kinematics(err)
    }
}

pub struct DeviceController<T: HapticTransport> {
    kinematics: StamperKinematics,
    config: ControllerConfig,
    transport: Mutex<T>,
    state: Mutex<DeviceState>,
    pending_force: Mutex<Vector3<f64>>,
}

impl<T: HapticTransport> DeviceController<T> {
    /// Opens a session on the given transport. The initial state is seeded from one forward
    /// kinematics solve of the current device pose, starting at `config.initial_guess`.
    pub fn new(transport: T, geometry: GeometryConstants, config: ControllerConfig) -> Result<Self, DeviceError> {
        let kinematics = StamperKinematics::new_with_settings(geometry, config.solver);
        let mut transport = transport;

        let theta1 = read_shoulder_angles(&mut transport)?;
        let solution = kinematics.forward(&theta1, &config.initial_guess)?;
        if !solution.converged {
            warn!("Initial pose did not converge in {} iterations, residual {:.4}", solution.iterations, solution.error);
        }
        info!("Device session opened at x: {:.4}, y: {:.4}, z: {:.4}",
            solution.position.x, solution.position.y, solution.position.z);

        Ok(DeviceController {
            kinematics,
            config,
            transport: Mutex::new(transport),
            state: Mutex::new(DeviceState::new(solution.position)),
            pending_force: Mutex::new(Vector3::zeros()),
        })
    }

    /// Runs one control cycle: reads the device, updates position, range and buttons, then writes
    /// the pending force. A transport failure aborts the tick and leaves the state as it was.
    pub fn tick(&self) -> Result<DeviceOutput, DeviceError> {
        let mut transport = self.transport.lock();
        let mut state = self.state.lock();
        let mut next = *state;

        let theta1 = read_shoulder_angles(&mut *transport)?;

        // The device cannot move far within one tick, so the previous position is a good guess.
        match self.kinematics.forward(&theta1, &next.position) {
            Ok(solution) => {
                if !solution.converged {
                    warn!("Forward kinematics did not converge in {} iterations, residual {:.4}",
                        solution.iterations, solution.error);
                    next.diagnostics.not_converged += 1;
                }
                next.position = solution.position;
                next.range.include(&next.position);
            }
            Err(e) => {
                warn!("Keeping the previous position: {}", e);
                next.diagnostics.unreachable += 1;
            }
        }
        next.normalized = next.range.normalize(&next.position);

        let inputs = transport.read_digital_inputs()?;
        match next.phase {
            ControllerPhase::Calibrating => {
                let button = self.config.calibration_button;
                if inputs.contains(button.mask()) {
                    info!("Calibration completed with {:?} button", button);
                    next.phase = ControllerPhase::Running;
                    // A press still held must not toggle once running
                    next.buttons.reset_holding(inputs);
                }
            }
            ControllerPhase::Running => next.buttons.update(inputs),
        }

        let force = self.clamped_force();
        transport.write_force(&force)?;

        next.diagnostics.ticks += 1;
        *state = next;
        Ok(next.output())
    }

    /// Replaces the pending force command. It is applied, clamped, from the next tick on and
    /// stays in effect until replaced.
    pub fn set_force(&self, x: f64, y: f64, z: f64) -> Result<(), DeviceError> {
        let force = Vector3::new(x, y, z);
        if !is_finite(&force) {
            warn!("Rejected force command {:?}", force);
            return Err(DeviceError::InvalidCommand(format!("non-finite force {:?}", force)));
        }
        *self.pending_force.lock() = force;
        Ok(())
    }

    /// Switches the LED colors immediately.
    pub fn set_color(&self, red: bool, green: bool, blue: bool) -> Result<(), DeviceError> {
        self.set_led(LedColor::from_rgb(red, green, blue))
    }

    pub fn set_led(&self, color: LedColor) -> Result<(), DeviceError> {
        self.transport.lock().write_led(color)?;
        Ok(())
    }

    /// Output of the most recent tick (or of the seeding solve before the first tick).
    pub fn read_state(&self) -> DeviceOutput {
        self.state.lock().output()
    }

    /// Copy of the complete device state.
    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    pub fn phase(&self) -> ControllerPhase {
        self.state.lock().phase
    }

    pub fn is_calibrated(&self) -> bool {
        self.phase() == ControllerPhase::Running
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.state.lock().diagnostics
    }

    pub fn pending_force(&self) -> Vector3<f64> {
        *self.pending_force.lock()
    }

    pub fn kinematics(&self) -> &StamperKinematics {
        &self.kinematics
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Gives temporary exclusive access to the transport.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.transport.lock())
    }

    /// Ends the session and returns the transport.
    pub fn into_transport(self) -> T {
        self.transport.into_inner()
    }

    fn clamped_force(&self) -> Vector3<f64> {
        let requested = *self.pending_force.lock();
        let limit = self.config.max_force;
        let force = requested.map(|v| v.clamp(-limit, limit));
        if force != requested {
            debug!("Force {:?} clamped to {:?}", requested, force);
        }
        force
    }
}

fn read_shoulder_angles<T: HapticTransport + ?Sized>(transport: &mut T) -> Result<Vector3<f64>, DeviceError> {
    let counts = transport.read_encoders()?;
    Ok(Vector3::from_fn(|leg, _| transport.encoder_to_angle(leg, counts[leg])))
}
