//! Top-level cadence: menu (or plain shutdown line), then telemetry, then sleep.

use crate::analog::RcSampler;
use crate::clock::Clock;
use crate::configs::settings::{Capabilities, Settings};
use crate::controls::{Collaborators, TelemetryFrame};
use crate::errors::HardwareError;
use crate::gpio::{Gpio, PinMode};
use crate::keypad::Keypad;
use crate::logger;
use crate::menu::{Menu, Tick};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Longest a stop request can go unnoticed while the supervisor sleeps.
const STOP_POLL: Duration = Duration::from_millis(100);

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// Shutdown was executed; the process is on its way out.
    ShutDown,
    /// Stop requested mid-cycle.
    Stopped,
}

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    ShutDown,
    /// Stop requested; pins were released and the OSD terminated.
    Stopped,
}

pub struct Supervisor {
    settings: Settings,
    gpio: Box<dyn Gpio>,
    keypad: Keypad,
    controls: Collaborators,
    clock: Box<dyn Clock>,
    menu: Menu,
    sampler: RcSampler,
}

impl Supervisor {
    pub fn new(
        settings: &Settings,
        gpio: Box<dyn Gpio>,
        keypad: Keypad,
        controls: Collaborators,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            menu: Menu::new(settings),
            sampler: RcSampler::new(settings.pins.voltage, settings.analog),
            settings: settings.clone(),
            gpio,
            keypad,
            controls,
            clock,
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.settings.capabilities
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    /// Put the shutdown line into input mode and clear stale RC timing.
    pub fn prepare(&mut self) -> Result<(), HardwareError> {
        self.gpio
            .configure(self.settings.pins.shutdown.into_inner(), PinMode::Input)?;
        if self.capabilities().has_telemetry {
            logger::subsection("Warm-up voltage sample");
            let sample = self.sampler.sample(self.gpio.as_mut(), self.clock.as_ref());
            logger::detail(format!("Discarded warm-up reading: {sample:?}"));
        }
        Ok(())
    }

    /// One supervisor cycle, without the trailing sleep.
    pub fn cycle(&mut self, stop: &AtomicBool) -> Outcome {
        let capabilities = self.capabilities();

        if capabilities.has_menu {
            let tick = self.menu.service(
                self.gpio.as_mut(),
                &mut self.keypad,
                &mut self.controls,
                self.clock.as_ref(),
                stop,
            );
            match tick {
                Tick::ShutdownRequested => return Outcome::ShutDown,
                Tick::Stopped => return Outcome::Stopped,
                Tick::Idle | Tick::Closed => {}
            }
        } else if capabilities.shutdown_enabled && self.shutdown_line_held() {
            logger::info("Shutdown line asserted");
            self.controls.shutdown.execute();
            return Outcome::ShutDown;
        }

        if capabilities.has_telemetry {
            self.publish_telemetry();
        }
        Outcome::Continue
    }

    fn shutdown_line_held(&mut self) -> bool {
        match self.gpio.read(self.settings.pins.shutdown.into_inner()) {
            Ok(level) => level.is_low(),
            Err(e) => {
                logger::warning(format!("Failed to read shutdown pin: {e}"));
                false
            }
        }
    }

    fn publish_telemetry(&mut self) {
        let voltage = self.sampler.sample(self.gpio.as_mut(), self.clock.as_ref());
        let temperature = match self.controls.thermal.read_temperature() {
            Ok(celsius) => celsius,
            Err(e) => {
                logger::warning(format!("Skipping telemetry, temperature read failed: {e}"));
                return;
            }
        };

        let telemetry = self.settings.telemetry;
        let frame = TelemetryFrame {
            voltage,
            temperature: Some(temperature),
            show_debug: telemetry.show_debug,
            show_wifi: telemetry.show_wifi,
            show_mute: telemetry.show_mute,
        };
        logger::debug(format!("Telemetry {frame:?}"));

        if let Some(sink) = self.controls.telemetry.as_mut() {
            if let Err(e) = sink.publish(&frame) {
                logger::warning(format!("Failed to publish telemetry: {e}"));
            }
        }
    }

    /// Sleep one cycle period in short slices. Returns true if stop was requested.
    fn rest(&self, stop: &AtomicBool) -> bool {
        let mut remaining = self.settings.timing.cycle_ms.as_duration();
        while !remaining.is_zero() {
            if stop.load(Ordering::Relaxed) {
                return true;
            }
            let slice = remaining.min(STOP_POLL);
            self.clock.sleep(slice);
            remaining -= slice;
        }
        stop.load(Ordering::Relaxed)
    }

    /// Run cycles until shutdown or a stop request.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<Exit, HardwareError> {
        self.prepare()?;

        while !stop.load(Ordering::Relaxed) {
            match self.cycle(stop) {
                Outcome::ShutDown => return Ok(Exit::ShutDown),
                Outcome::Stopped => break,
                Outcome::Continue => {}
            }
            if self.rest(stop) {
                break;
            }
        }

        self.release();
        Ok(Exit::Stopped)
    }

    /// Return pins to input and stop owned helper processes.
    pub fn release(&mut self) {
        logger::section("Releasing hardware");
        if let Err(e) = self.gpio.release_all() {
            logger::error(format!("Failed to release GPIO: {e}"));
        }
        // dropping the sink terminates the OSD process
        self.controls.telemetry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analog::VoltageSample;
    use crate::clock::ManualClock;
    use crate::controls::mock::{Call, Recorder};
    use crate::gpio::mock::MockGpio;
    use crate::gpio::Level::{High, Low};
    use crate::keypad::mock::MockKeySource;
    use crate::keypad::KeySource;
    use crate::errors::InputError;
    use std::sync::Arc;

    fn running() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn supervisor(overrides: &str) -> (Supervisor, MockGpio, Recorder, ManualClock) {
        let settings = Settings::from_overrides(overrides).unwrap();
        let gpio = MockGpio::new();
        let recorder = Recorder::default();
        let clock = ManualClock::new();
        let supervisor = Supervisor::new(
            &settings,
            Box::new(gpio.clone()),
            Keypad::new(Box::new(MockKeySource::new())),
            recorder.collaborators(settings.capabilities.has_telemetry),
            Box::new(clock.clone()),
        );
        (supervisor, gpio, recorder, clock)
    }

    #[test]
    fn telemetry_cycle_publishes_sample_and_temperature() {
        let (mut supervisor, gpio, recorder, _) = supervisor("");
        gpio.script_edge(Some(Duration::from_millis(31)));
        recorder.push_temperature(Some(52.5));

        assert_eq!(supervisor.cycle(&running()), Outcome::Continue);

        let published = recorder.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].voltage.centivolts(), Some(316));
        assert_eq!(published[0].temperature, Some(52.5));
    }

    #[test]
    fn missing_edge_publishes_unknown_voltage() {
        let (mut supervisor, _, recorder, _) = supervisor("");
        supervisor.cycle(&running());
        assert_eq!(recorder.published()[0].voltage, VoltageSample::NoEdge);
    }

    #[test]
    fn thermal_failure_skips_publish_only() {
        let (mut supervisor, _, recorder, _) = supervisor("");
        recorder.push_temperature(None);
        assert_eq!(supervisor.cycle(&running()), Outcome::Continue);
        assert!(recorder.published().is_empty());
        assert_eq!(supervisor.cycle(&running()), Outcome::Continue);
        assert_eq!(recorder.published().len(), 1);
    }

    #[test]
    fn plain_mode_shuts_down_on_held_line() {
        let (mut supervisor, gpio, recorder, _) = supervisor(
            "[capabilities]\nhas_menu = false\nhas_telemetry = false\nshutdown_enabled = true\n",
        );
        gpio.script_levels(4, &[High, Low]);

        assert_eq!(supervisor.cycle(&running()), Outcome::Continue);
        assert_eq!(supervisor.cycle(&running()), Outcome::ShutDown);
        assert_eq!(recorder.calls(), vec![Call::Shutdown]);
    }

    #[test]
    fn plain_mode_without_shutdown_ignores_line() {
        let (mut supervisor, gpio, recorder, _) =
            supervisor("[capabilities]\nhas_menu = false\nhas_telemetry = false\n");
        gpio.script_levels(4, &[Low]);

        assert_eq!(supervisor.cycle(&running()), Outcome::Continue);
        assert!(recorder.calls().is_empty());
        assert_eq!(gpio.read_count(4), 0);
    }

    #[test]
    fn rest_sleeps_in_slices() {
        let (supervisor, _, _, clock) = supervisor("[timing]\ncycle_ms = 350\n");
        let stop = AtomicBool::new(false);

        assert!(!supervisor.rest(&stop));
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_millis(50),
            ]
        );
    }

    #[test]
    fn stop_request_releases_pins() {
        let (mut supervisor, gpio, recorder, _) = supervisor("");
        let stop = AtomicBool::new(true);

        assert_eq!(supervisor.run(&stop).unwrap(), Exit::Stopped);
        assert!(gpio.released());
        assert_eq!(gpio.mode(23), Some(PinMode::Input));
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn prepare_configures_line_and_warms_up() {
        let (mut supervisor, gpio, recorder, clock) = supervisor("");
        supervisor.prepare().unwrap();

        assert_eq!(gpio.configures()[0], (4, PinMode::Input));
        assert_eq!(gpio.mode(23), Some(PinMode::Output));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(100)]);
        // warm-up reading is not published
        assert!(recorder.published().is_empty());
    }

    /// Key source standing in for a signal that arrives during the first read.
    struct SignalDuringRead(Arc<AtomicBool>);

    impl KeySource for SignalDuringRead {
        fn read_record(&mut self, timeout: Duration) -> Result<Vec<u8>, InputError> {
            self.0.store(true, Ordering::Relaxed);
            Err(InputError::Timeout(timeout))
        }
    }

    #[test]
    fn stop_while_menu_held_releases_pins() {
        let settings = Settings::from_overrides("").unwrap();
        let gpio = MockGpio::new();
        gpio.script_levels(4, &[Low]);
        let recorder = Recorder::default();
        let stop = Arc::new(AtomicBool::new(false));
        let mut supervisor = Supervisor::new(
            &settings,
            Box::new(gpio.clone()),
            Keypad::new(Box::new(SignalDuringRead(Arc::clone(&stop)))),
            recorder.collaborators(true),
            Box::new(ManualClock::new()),
        );

        assert_eq!(supervisor.run(&stop).unwrap(), Exit::Stopped);

        assert!(gpio.released());
        assert_eq!(gpio.mode(4), Some(PinMode::Input));
        assert_eq!(
            recorder.overlays(),
            vec![
                crate::controls::OverlayRequest::Named(crate::controls::OverlayId::MenuItems),
                crate::controls::OverlayRequest::None,
            ]
        );
        // no telemetry after the stop
        assert!(recorder.published().is_empty());
        assert!(supervisor.controls.telemetry.is_none());
    }
}
