//! Fixed-rate tick driver relaying controller output to the messaging layer

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tracing::{error, info, warn};

use crate::buttons::LedColor;
use crate::controller::{ControllerPhase, DeviceController, DeviceError};
use crate::messaging::OutputSink;
use crate::parameters::falcon_kinematics::DriverConfig;
use crate::transport::HapticTransport;

/// Invokes [`DeviceController::tick`] once per period and delivers every output to the sink.
///
/// While the controller is calibrating the LED is red, it turns green once calibration completes.
/// Commands from other threads go straight to the shared controller.
pub struct TickDriver<T: HapticTransport, S: OutputSink> {
    controller: Arc<DeviceController<T>>,
    sink: S,
    config: DriverConfig,
    phase: Option<ControllerPhase>,
}

impl<T: HapticTransport, S: OutputSink> TickDriver<T, S> {
    pub fn new(controller: Arc<DeviceController<T>>, sink: S, config: DriverConfig) -> Self {
        TickDriver { controller, sink, config, phase: None }
    }

    pub fn controller(&self) -> &Arc<DeviceController<T>> {
        &self.controller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Ticks until `stop` is raised, `max_ticks` successful ticks are done, or the transport
    /// fails `max_consecutive_failures` times in a row. Returns the number of successful ticks.
    pub fn run(&mut self, stop: &AtomicBool, max_ticks: Option<u64>) -> Result<u64> {
        let period = Duration::from_millis(self.config.period_ms);
        let mut deadline = Instant::now();
        let mut ticks = 0u64;
        let mut failures = 0u32;

        self.show_phase()?;

        while !stop.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| ticks < max) {
            match self.controller.tick() {
                Ok(output) => {
                    failures = 0;
                    ticks += 1;
                    self.sink.deliver(&output)?;
                    self.show_phase()?;
                }
                Err(DeviceError::Transport(e)) => {
                    failures += 1;
                    if failures >= self.config.max_consecutive_failures {
                        error!("Giving up after {} consecutive transport failures: {:#}", failures, e);
                        return Err(e.context(format!("{} consecutive transport failures", failures)));
                    }
                    warn!("Tick failed ({:#}), retrying on the next period", e);
                }
                Err(e) => return Err(anyhow!(e)),
            }

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                sleep(deadline - now);
            } else {
                // Overran, restart the schedule rather than bursting to catch up
                deadline = now;
            }
        }
        Ok(ticks)
    }

    /// Lights the LED according to the controller phase whenever the phase changes.
    fn show_phase(&mut self) -> Result<()> {
        let phase = self.controller.phase();
        if self.phase == Some(phase) {
            return Ok(());
        }
        let color = match phase {
            ControllerPhase::Calibrating => {
                info!("Move the grip around its workspace, then press the calibration button");
                LedColor::RED
            }
            ControllerPhase::Running => {
                info!("Calibrated, publishing position and buttons");
                LedColor::GREEN
            }
        };
        self.controller.set_led(color).map_err(|e| anyhow!(e))?;
        self.phase = Some(phase);
        Ok(())
    }
}
