pub mod analog;
pub mod clock;
pub mod configs;
pub mod controls;
pub mod errors;
pub mod gpio;
pub mod keypad;
pub mod logger;
pub mod menu;
pub mod supervisor;
pub mod timeout;

use crate::clock::SystemClock;
use crate::configs::settings::Settings;
use crate::controls::osd::OsdSink;
use crate::controls::{Collaborators, TelemetrySink};
use crate::errors::InitError;
use crate::gpio::rpi::RpiGpio;
use crate::keypad::device::EventDevice;
use crate::keypad::Keypad;
use crate::supervisor::{Exit, Supervisor};
use anyhow::Result;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Startup options taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// N in `/dev/input/eventN`.
    pub device_index: u32,
    pub config: Option<PathBuf>,
    pub debug: bool,
}

fn install_stop_flag() -> Result<Arc<AtomicBool>, InitError> {
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop)).map_err(InitError::Signal)?;
    }
    Ok(stop)
}

/// Load settings, bring up the hardware and supervise until stopped.
///
/// Only startup failures are returned; everything after that is handled inside
/// the cycle that hit it.
pub fn run(options: &Options) -> Result<()> {
    logger::app_start("AIO Companion", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(options.config.as_deref()).map_err(InitError::from)?;
    logger::set_debug(settings.debugging.enable_debug_logs || options.debug);
    settings.print_config();

    logger::section("Initialising hardware");
    let stop = install_stop_flag()?;
    let gpio = RpiGpio::open().map_err(InitError::from)?;
    logger::success("GPIO ready");

    let telemetry = if settings.capabilities.has_telemetry {
        logger::subsection("Starting OSD");
        let sink = OsdSink::start(
            &settings.paths,
            settings.timing.osd_startup_grace_ms.as_duration(),
            &SystemClock,
        )?;
        Some(Box::new(sink) as Box<dyn TelemetrySink>)
    } else {
        None
    };

    let device = EventDevice::for_index(options.device_index);
    logger::kvp("Keypad device", device.path().display());
    let keypad = Keypad::new(Box::new(device));
    let controls = Collaborators::system(&settings, telemetry);

    let mut supervisor = Supervisor::new(
        &settings,
        Box::new(gpio),
        keypad,
        controls,
        Box::new(SystemClock),
    );

    logger::section("Supervising");
    match supervisor.run(&stop).map_err(InitError::from)? {
        Exit::ShutDown => logger::info("Shutdown in progress"),
        Exit::Stopped => logger::success("Stopped cleanly"),
    }

    logger::app_end();
    Ok(())
}
