use super::validation::*;
use nutype::nutype;
use serde::Deserialize;
use std::{env, fmt, path::Path, path::PathBuf, time::Duration};

use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use config::builder::DefaultState;

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");
const LOCAL_CONFIG_PATH: &str = "./config/local";

/// BCM line number on the 40-pin header.
#[nutype(
    sanitize(),
    validate(less_or_equal = 27),
    derive(Debug, Deserialize, PartialEq, Clone, Copy, AsRef)
)]
pub struct BcmPin(u8);

impl fmt::Display for BcmPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BCM{}", self.into_inner())
    }
}

#[nutype(
    sanitize(),
    validate(with = is_positive_finite, error = ValidationError),
    derive(Debug, Deserialize, PartialEq, Clone, Copy, AsRef)
)]
pub struct Calibration(f64);

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

#[nutype(
    sanitize(),
    validate(with = is_non_zero_millis, error = ValidationError),
    derive(Debug, Deserialize, PartialEq, Clone, Copy, AsRef)
)]
pub struct Millis(u64);

impl Millis {
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ms", self.into_inner())
    }
}

#[nutype(
    sanitize(),
    validate(greater_or_equal = 1, less_or_equal = 100),
    derive(Debug, Deserialize, PartialEq, Clone, Copy, AsRef)
)]
pub struct VolumeStep(u8);

impl fmt::Display for VolumeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.into_inner())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Paths {
    pub resources_dir: PathBuf,
    pub overlay_binary: PathBuf,
    pub osd_binary: PathBuf,
    pub osd_data_file: PathBuf,
    pub osd_config_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub shutdown: BcmPin,
    pub voltage: BcmPin,
    pub vtx: BcmPin,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Analog {
    pub switching_voltage: Calibration,
    pub resistance_kohm: Calibration,
    pub capacitance_uf: Calibration,
    /// Highest reading treated as real. Anything above is reported as no edge.
    pub max_voltage: Calibration,
    pub settle_ms: Millis,
    pub edge_timeout_ms: Millis,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Timing {
    pub cycle_ms: Millis,
    pub key_timeout_ms: Millis,
    pub menu_pacing_ms: Millis,
    pub volume_hold_ms: Millis,
    pub toggle_hold_ms: Millis,
    pub osd_startup_grace_ms: Millis,
}

/// Which parts of the board are present. One binary serves every revision.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Capabilities {
    pub has_menu: bool,
    pub has_telemetry: bool,
    pub has_vtx: bool,
    pub shutdown_enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Controls {
    pub use_sudo: bool,
    pub mixer_control: String,
    pub volume_step_percent: VolumeStep,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Telemetry {
    pub show_debug: bool,
    pub show_wifi: bool,
    pub show_mute: bool,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Debugging {
    pub enable_debug_logs: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub paths: Paths,
    pub pins: Pins,
    pub analog: Analog,
    pub timing: Timing,
    pub capabilities: Capabilities,
    pub controls: Controls,
    pub telemetry: Telemetry,
    pub debugging: Debugging,
}

fn defaults() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    builder
        .build()?
        .try_deserialize()
        .map_err(|e| ConfigError::Message(format!("Configuration validation failed: {e}")))
}

/// Companion settings.
///
/// Sources, lowest precedence first: the built-in defaults, `./config/local.toml`,
/// `~/.config/aio-companion.toml`, the file passed with `--config`, then
/// `APP_` environment variables (`__` separates nested keys).
///
/// # Errors
///
/// Returns an error if an explicit file is missing or a value fails validation.
impl Settings {
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            defaults().add_source(File::with_name(LOCAL_CONFIG_PATH).required(false));

        if let Ok(home) = env::var("HOME") {
            let user_config_path = PathBuf::from(home)
                .join(".config")
                .join(env!("CARGO_PKG_NAME"));
            builder = builder.add_source(
                File::with_name(&user_config_path.to_string_lossy()).required(false),
            );
        }

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        let builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        finish(builder)
    }

    /// Built-in defaults with a TOML snippet layered on top. No files or
    /// environment variables are consulted.
    pub fn from_overrides(toml: &str) -> Result<Self, ConfigError> {
        finish(defaults().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    pub fn print_config(&self) {
        use crate::logger;

        logger::section("Configuration loaded");

        logger::config_group("Capabilities");
        logger::kvp("Menu", self.capabilities.has_menu);
        logger::kvp("Telemetry", self.capabilities.has_telemetry);
        logger::kvp("VTX control", self.capabilities.has_vtx);
        logger::kvp("Shutdown pin", self.capabilities.shutdown_enabled);

        logger::config_group("Pins");
        logger::kvp("Shutdown / menu", self.pins.shutdown);
        logger::kvp("Voltage (RC)", self.pins.voltage);
        logger::kvp("VTX enable", self.pins.vtx);

        logger::config_group("RC Calibration");
        logger::kvp("Switching voltage (V)", self.analog.switching_voltage);
        logger::kvp("Resistance (kΩ)", self.analog.resistance_kohm);
        logger::kvp("Capacitance (µF)", self.analog.capacitance_uf);
        logger::kvp("Max voltage (V)", self.analog.max_voltage);
        logger::kvp("Settle", self.analog.settle_ms);
        logger::kvp("Edge timeout", self.analog.edge_timeout_ms);

        logger::config_group("Timing");
        logger::kvp("Cycle", self.timing.cycle_ms);
        logger::kvp("Key timeout", self.timing.key_timeout_ms);
        logger::kvp("Menu pacing", self.timing.menu_pacing_ms);

        logger::config_group("File Paths");
        logger::kvp("Resources", self.paths.resources_dir.display());
        logger::kvp("Overlay binary", self.paths.overlay_binary.display());
        logger::kvp("OSD binary", self.paths.osd_binary.display());
        logger::kvp("OSD data", self.paths.osd_data_file.display());
        logger::kvp("OSD config", self.paths.osd_config_file.display());

        logger::config_group("Controls");
        logger::kvp("Use sudo", self.controls.use_sudo);
        logger::kvp("Mixer control", &self.controls.mixer_control);
        logger::kvp("Volume step", self.controls.volume_step_percent);

        logger::config_group("Debug Flags");
        logger::kvp("Enable Debug Logs", self.debugging.enable_debug_logs);
    }
}
