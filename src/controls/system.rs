use super::{
    Overlay, OverlayId, OverlayRequest, Power, Shutdown, Thermal, Volume, VolumeDirection, Vtx,
    Wifi,
};
use crate::configs::settings::{BcmPin, Controls};
use crate::errors::{HardwareError, ThermalError, ToolError};
use crate::gpio::{Gpio, Level, PinMode};
use crate::logger;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use strum::IntoEnumIterator;

static TEMPERATURE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"temp=(-?\d+(?:\.\d+)?)'C").expect("temperature pattern is valid"));

/// Build a command, optionally run through `sudo`.
fn privileged(program: &str, use_sudo: bool) -> Command {
    if use_sudo {
        let mut command = Command::new("sudo");
        command.arg(program);
        command
    } else {
        Command::new(program)
    }
}

/// Run to completion and map a non-zero exit to an error.
fn run_tool(tool: &str, command: &mut Command) -> Result<(), ToolError> {
    logger::debug(format!("Running {command:?}"));
    let status = command.status().map_err(|source| ToolError::Launch {
        tool: tool.to_string(),
        source,
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(ToolError::Status {
            tool: tool.to_string(),
            code: status.code(),
        })
    }
}

/// PNG overlays drawn by `pngview` on a dispmanx layer above the video.
pub struct PngOverlay {
    binary: PathBuf,
    resources_dir: PathBuf,
    current: Option<Child>,
}

impl PngOverlay {
    pub fn new(binary: &Path, resources_dir: &Path) -> Self {
        Self {
            binary: binary.to_path_buf(),
            resources_dir: resources_dir.to_path_buf(),
            current: None,
        }
    }

    pub fn image_path(&self, request: OverlayRequest) -> Option<PathBuf> {
        match request {
            OverlayRequest::None => None,
            OverlayRequest::Named(id) => {
                Some(self.resources_dir.join(format!("{}.png", id.as_ref())))
            }
        }
    }

    /// Overlays whose image is not in the resources directory.
    pub fn missing_images(&self) -> Vec<OverlayId> {
        OverlayId::iter()
            .filter(|id| {
                self.image_path(OverlayRequest::Named(*id))
                    .is_some_and(|path| !path.is_file())
            })
            .collect()
    }

    fn clear(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Err(e) = child.kill() {
                logger::debug(format!("Overlay process already gone: {e}"));
            }
            let _ = child.wait();
        }
    }
}

impl Overlay for PngOverlay {
    fn show(&mut self, request: OverlayRequest) {
        self.clear();
        let Some(image) = self.image_path(request) else {
            return;
        };

        let spawned = Command::new(&self.binary)
            .args(["-b", "0", "-l", "999999"])
            .arg(&image)
            .spawn();
        match spawned {
            Ok(child) => self.current = Some(child),
            Err(e) => logger::warning(format!(
                "Failed to show overlay {}: {e}",
                image.display()
            )),
        }
    }
}

impl Drop for PngOverlay {
    fn drop(&mut self) {
        self.clear();
    }
}

pub struct AmixerVolume {
    use_sudo: bool,
    control: String,
    step_percent: u8,
}

impl AmixerVolume {
    pub fn new(controls: &Controls) -> Self {
        Self {
            use_sudo: controls.use_sudo,
            control: controls.mixer_control.clone(),
            step_percent: controls.volume_step_percent.into_inner(),
        }
    }

    pub fn step_argument(&self, direction: VolumeDirection) -> String {
        let sign = match direction {
            VolumeDirection::Up => '+',
            VolumeDirection::Down => '-',
        };
        format!("{}%{sign}", self.step_percent)
    }
}

impl Volume for AmixerVolume {
    fn apply(&mut self, direction: VolumeDirection) -> Result<(), ToolError> {
        let mut command = privileged("amixer", self.use_sudo);
        command
            .args(["-M", "set", self.control.as_str()])
            .arg(self.step_argument(direction));
        run_tool("amixer", &mut command)
    }
}

/// Blocks or unblocks both radios, wifi and bluetooth share the chip.
pub struct RfkillWifi {
    use_sudo: bool,
}

impl RfkillWifi {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }
}

impl Wifi for RfkillWifi {
    fn apply(&mut self, power: Power) -> Result<(), ToolError> {
        let action = match power {
            Power::On => "unblock",
            Power::Off => "block",
        };
        let mut first_error = None;
        for radio in ["wifi", "bluetooth"] {
            let mut command = privileged("rfkill", self.use_sudo);
            command.args([action, radio]);
            if let Err(e) = run_tool("rfkill", &mut command) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// VTX enable line: driven low to power the transmitter, released to turn it off.
pub struct GpioVtx {
    pin: u8,
}

impl GpioVtx {
    pub fn new(pin: BcmPin) -> Self {
        Self {
            pin: pin.into_inner(),
        }
    }
}

impl Vtx for GpioVtx {
    fn apply(&mut self, gpio: &mut dyn Gpio, power: Power) -> Result<(), HardwareError> {
        gpio.configure(self.pin, PinMode::Output)?;
        match power {
            Power::On => gpio.write(self.pin, Level::Low),
            Power::Off => {
                gpio.write(self.pin, Level::High)?;
                gpio.configure(self.pin, PinMode::Input)
            }
        }
    }
}

pub struct SystemShutdown {
    use_sudo: bool,
}

impl SystemShutdown {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }
}

impl Shutdown for SystemShutdown {
    fn execute(&mut self) {
        logger::info("Shutting down");
        let mut command = privileged("shutdown", self.use_sudo);
        command.args(["-h", "now"]);
        if let Err(e) = run_tool("shutdown", &mut command) {
            logger::error(format!("Shutdown command failed: {e}"));
        }
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        std::process::exit(0);
    }
}

/// SoC temperature from the VideoCore firmware.
pub struct VcgencmdThermal;

pub fn parse_temperature(output: &str) -> Result<f64, ThermalError> {
    TEMPERATURE_PATTERN
        .captures(output)
        .and_then(|captures| captures[1].parse::<f64>().ok())
        .ok_or_else(|| ThermalError::Unparsable(output.trim().to_string()))
}

impl Thermal for VcgencmdThermal {
    fn read_temperature(&mut self) -> Result<f64, ThermalError> {
        let output = Command::new("vcgencmd")
            .arg("measure_temp")
            .output()
            .map_err(|source| ToolError::Launch {
                tool: "vcgencmd".to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(ToolError::Status {
                tool: "vcgencmd".to_string(),
                code: output.status.code(),
            }
            .into());
        }
        parse_temperature(&String::from_utf8_lossy(&output.stdout))
    }
}
