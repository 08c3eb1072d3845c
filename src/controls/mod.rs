//! Side effects the menu and supervisor trigger.
//!
//! Each collaborator is a trait so the state machine can be driven against
//! recorders in tests; [`system`] and [`osd`] hold the implementations used on
//! the board.

pub mod mock;
pub mod osd;
pub mod system;

use crate::analog::VoltageSample;
use crate::configs::settings::Settings;
use crate::errors::{HardwareError, ThermalError, ToolError};
use crate::gpio::Gpio;
use crate::logger;
use strum_macros::{AsRefStr, Display, EnumIter};

/// Images shipped in the resources directory, one PNG per id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum OverlayId {
    MenuItems,
    ShuttingDown,
    VolUp,
    VolDown,
    WifiEnable,
    WifiDisable,
    VtxEnable,
    VtxDisable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayRequest {
    /// Clear whatever overlay is showing.
    None,
    Named(OverlayId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum VolumeDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Power {
    On,
    Off,
}

/// Values pushed to the OSD once per cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub voltage: VoltageSample,
    pub temperature: Option<f64>,
    pub show_debug: bool,
    pub show_wifi: bool,
    pub show_mute: bool,
}

impl TelemetryFrame {
    /// What the OSD shows before the first reading.
    pub fn placeholder() -> Self {
        Self {
            voltage: VoltageSample::NoEdge,
            temperature: None,
            show_debug: true,
            show_wifi: false,
            show_mute: false,
        }
    }
}

pub trait Overlay {
    /// Replace the current overlay. Failures are logged by the implementation.
    fn show(&mut self, request: OverlayRequest);
}

pub trait Volume {
    fn apply(&mut self, direction: VolumeDirection) -> Result<(), ToolError>;
}

pub trait Wifi {
    fn apply(&mut self, power: Power) -> Result<(), ToolError>;
}

pub trait Vtx {
    fn apply(&mut self, gpio: &mut dyn Gpio, power: Power) -> Result<(), HardwareError>;
}

pub trait Shutdown {
    /// Power the board off. On hardware this does not return.
    fn execute(&mut self);
}

pub trait Thermal {
    fn read_temperature(&mut self) -> Result<f64, ThermalError>;
}

pub trait TelemetrySink {
    fn publish(&mut self, frame: &TelemetryFrame) -> Result<(), ToolError>;
}

pub struct Collaborators {
    pub overlay: Box<dyn Overlay>,
    pub volume: Box<dyn Volume>,
    pub wifi: Box<dyn Wifi>,
    pub vtx: Box<dyn Vtx>,
    pub shutdown: Box<dyn Shutdown>,
    pub thermal: Box<dyn Thermal>,
    /// Present only on boards with telemetry.
    pub telemetry: Option<Box<dyn TelemetrySink>>,
}

impl Collaborators {
    /// The real utilities, as configured in `settings`.
    pub fn system(settings: &Settings, telemetry: Option<Box<dyn TelemetrySink>>) -> Self {
        let use_sudo = settings.controls.use_sudo;
        let overlay =
            system::PngOverlay::new(&settings.paths.overlay_binary, &settings.paths.resources_dir);
        for id in overlay.missing_images() {
            logger::warning(format!("Overlay image missing for {id}"));
        }
        Self {
            overlay: Box::new(overlay),
            volume: Box::new(system::AmixerVolume::new(&settings.controls)),
            wifi: Box::new(system::RfkillWifi::new(use_sudo)),
            vtx: Box::new(system::GpioVtx::new(settings.pins.vtx)),
            shutdown: Box::new(system::SystemShutdown::new(use_sudo)),
            thermal: Box::new(system::VcgencmdThermal),
            telemetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_ids_match_resource_names() {
        assert_eq!(OverlayId::MenuItems.as_ref(), "menu_items");
        assert_eq!(OverlayId::ShuttingDown.as_ref(), "shutting_down");
        assert_eq!(OverlayId::VolUp.to_string(), "vol_up");
        assert_eq!(OverlayId::VtxDisable.to_string(), "vtx_disable");
    }

    #[test]
    fn placeholder_has_no_readings() {
        let frame = TelemetryFrame::placeholder();
        assert_eq!(frame.voltage, VoltageSample::NoEdge);
        assert_eq!(frame.temperature, None);
        assert!(frame.show_debug);
    }
}
