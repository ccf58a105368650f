#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::bail;

    use crate::buttons::{ButtonMask, LedColor};
    use crate::driver::TickDriver;
    use crate::messaging::{DeviceOutput, RecordingSink};
    use crate::parameters::falcon_kinematics::DriverConfig;
    use crate::tests::test_utils::{controller, transport_at_centre};

    fn fast() -> DriverConfig {
        DriverConfig { period_ms: 0, ..DriverConfig::default() }
    }

    #[test]
    fn test_runs_requested_ticks() {
        let controller = Arc::new(controller(transport_at_centre()));
        let mut driver = TickDriver::new(controller.clone(), RecordingSink::default(), fast());

        let ticks = driver.run(&AtomicBool::new(false), Some(5)).unwrap();
        assert_eq!(ticks, 5);
        assert_eq!(driver.sink().outputs.len(), 5);
        assert_eq!(controller.diagnostics().ticks, 5);
        controller.with_transport(|t| assert_eq!(t.leds, vec![LedColor::RED]));
    }

    #[test]
    fn test_led_turns_green_after_calibration() {
        let controller = Arc::new(controller(transport_at_centre()));
        controller.with_transport(|t| {
            t.push_buttons(ButtonMask::empty());
            t.push_buttons(ButtonMask::BUTTON_3);
            t.push_buttons(ButtonMask::empty());
        });
        let mut driver = TickDriver::new(controller.clone(), RecordingSink::default(), fast());

        driver.run(&AtomicBool::new(false), Some(3)).unwrap();
        assert!(controller.is_calibrated());
        controller.with_transport(|t| assert_eq!(t.leds, vec![LedColor::RED, LedColor::GREEN]));
    }

    #[test]
    fn test_recovers_from_transient_failures() {
        let controller = Arc::new(controller(transport_at_centre()));
        controller.with_transport(|t| t.failing_reads = 2);
        let mut driver = TickDriver::new(controller.clone(), RecordingSink::default(), fast());

        let ticks = driver.run(&AtomicBool::new(false), Some(4)).unwrap();
        assert_eq!(ticks, 4);
        assert_eq!(driver.into_sink().outputs.len(), 4);
    }

    #[test]
    fn test_gives_up_after_consecutive_failures() {
        let controller = Arc::new(controller(transport_at_centre()));
        controller.with_transport(|t| t.failing_reads = 10);
        let mut driver = TickDriver::new(controller.clone(), RecordingSink::default(), fast());

        let result = driver.run(&AtomicBool::new(false), Some(4));
        assert!(result.is_err());
        assert!(driver.sink().outputs.is_empty());
        controller.with_transport(|t| assert_eq!(t.failing_reads, 7));
    }

    #[test]
    fn test_stop_flag() {
        let controller = Arc::new(controller(transport_at_centre()));
        let stop = AtomicBool::new(false);
        let mut delivered = 0;
        let sink = |_: &DeviceOutput| -> anyhow::Result<()> {
            delivered += 1;
            if delivered == 3 {
                stop.store(true, Ordering::Relaxed);
            }
            Ok(())
        };
        let mut driver = TickDriver::new(controller, sink, fast());

        let ticks = driver.run(&stop, None).unwrap();
        assert_eq!(ticks, 3);
    }

    #[test]
    fn test_sink_failure_stops_driver() {
        let controller = Arc::new(controller(transport_at_centre()));
        let sink = |_: &DeviceOutput| -> anyhow::Result<()> { bail!("bus closed") };
        let mut driver = TickDriver::new(controller.clone(), sink, fast());

        let result = driver.run(&AtomicBool::new(false), Some(10));
        assert_eq!(result.unwrap_err().to_string(), "bus closed");
        assert_eq!(controller.diagnostics().ticks, 1);
    }
}
