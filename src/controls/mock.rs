use super::{
    Collaborators, Overlay, OverlayRequest, Power, Shutdown, TelemetryFrame, TelemetrySink,
    Thermal, Volume, VolumeDirection, Vtx, Wifi,
};
use crate::errors::{HardwareError, ThermalError, ToolError};
use crate::gpio::Gpio;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Overlay(OverlayRequest),
    Volume(VolumeDirection),
    Wifi(Power),
    Vtx(Power),
    Shutdown,
    Publish(TelemetryFrame),
}

/// Shared journal of every collaborator call, in order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    temperatures: Arc<Mutex<VecDeque<Option<f64>>>>,
}

impl Recorder {
    fn calls_mut(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: Call) {
        self.calls_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls_mut().clone()
    }

    pub fn overlays(&self) -> Vec<OverlayRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Overlay(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn published(&self) -> Vec<TelemetryFrame> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    /// Queue a temperature reading; `None` makes that read fail.
    pub fn push_temperature(&self, reading: Option<f64>) {
        self.temperatures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reading);
    }

    /// Collaborators that only write to this journal.
    pub fn collaborators(&self, with_telemetry: bool) -> Collaborators {
        Collaborators {
            overlay: Box::new(self.clone()),
            volume: Box::new(self.clone()),
            wifi: Box::new(self.clone()),
            vtx: Box::new(self.clone()),
            shutdown: Box::new(self.clone()),
            thermal: Box::new(self.clone()),
            telemetry: with_telemetry.then(|| Box::new(self.clone()) as Box<dyn TelemetrySink>),
        }
    }
}

impl Overlay for Recorder {
    fn show(&mut self, request: OverlayRequest) {
        self.record(Call::Overlay(request));
    }
}

impl Volume for Recorder {
    fn apply(&mut self, direction: VolumeDirection) -> Result<(), ToolError> {
        self.record(Call::Volume(direction));
        Ok(())
    }
}

impl Wifi for Recorder {
    fn apply(&mut self, power: Power) -> Result<(), ToolError> {
        self.record(Call::Wifi(power));
        Ok(())
    }
}

impl Vtx for Recorder {
    fn apply(&mut self, _gpio: &mut dyn Gpio, power: Power) -> Result<(), HardwareError> {
        self.record(Call::Vtx(power));
        Ok(())
    }
}

impl Shutdown for Recorder {
    fn execute(&mut self) {
        self.record(Call::Shutdown);
    }
}

impl Thermal for Recorder {
    fn read_temperature(&mut self) -> Result<f64, ThermalError> {
        let next = self
            .temperatures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Some(celsius)) => Ok(celsius),
            Some(None) => Err(ThermalError::Unparsable("scripted failure".to_string())),
            None => Ok(45.0),
        }
    }
}

impl TelemetrySink for Recorder {
    fn publish(&mut self, frame: &TelemetryFrame) -> Result<(), ToolError> {
        self.record(Call::Publish(*frame));
        Ok(())
    }
}
