use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::gpio::PinMode;

/// GPIO configuration or access failure.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("GPIO backend error on pin {pin}: {source}")]
    Backend {
        pin: u8,
        #[source]
        source: rppal::gpio::Error,
    },
    #[error("Pin {pin} is not configured as {expected}")]
    WrongMode { pin: u8, expected: PinMode },
    #[error("GPIO controller unavailable: {0}")]
    Unavailable(#[source] rppal::gpio::Error),
    #[error("Pin {0} is disconnected")]
    Disconnected(u8),
}

/// Keypad event stream failure. Never fatal, the read is reported as a failed key.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("No complete event record within {0:?}")]
    Timeout(Duration),
    #[error("Malformed event record: expected {expected} bytes, got {got}")]
    Malformed { expected: usize, got: usize },
    #[error("Failed to open input device {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Input device read failed: {0}")]
    Io(#[from] io::Error),
}

/// An external utility could not be launched or reported failure.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to launch `{tool}`: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("`{tool}` exited with status {code:?}")]
    Status { tool: String, code: Option<i32> },
    #[error("Failed to write OSD data file: {0}")]
    DataFile(#[from] io::Error),
    #[error("Failed to signal OSD process: {0}")]
    Signal(#[from] nix::Error),
}

#[derive(Error, Debug)]
pub enum ThermalError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("Unrecognised temperature output: {0:?}")]
    Unparsable(String),
}

/// Startup failures. These are the only errors that terminate the process.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to open GPIO: {0}")]
    Gpio(#[from] HardwareError),
    #[error("Failed to create OSD data file {}: {source}", path.display())]
    DataFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to start OSD binary {}: {source}", path.display())]
    OsdSpawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("OSD exited during startup with status {0:?}")]
    OsdExited(Option<i32>),
    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn controller_error_keeps_its_source() {
        let err = HardwareError::Unavailable(rppal::gpio::Error::PinNotAvailable(40));
        assert!(err.source().is_some());

        let init = InitError::from(err);
        assert!(init.to_string().starts_with("Failed to open GPIO: GPIO controller unavailable"));
        assert!(init.source().and_then(|e| e.source()).is_some());
    }

    #[test]
    fn thermal_tool_failure_is_transparent() {
        let err = ThermalError::from(ToolError::Status {
            tool: "vcgencmd".to_string(),
            code: Some(1),
        });
        assert_eq!(err.to_string(), "`vcgencmd` exited with status Some(1)");
    }
}
