//! Battery voltage from a single digital pin.
//!
//! The pin sits on an RC network fed by the battery through the resistor. After
//! the capacitor is discharged the pin is released and the time until the
//! capacitor crosses the input switching threshold is measured. Inverting the
//! single-pole charge curve `Vth = V (1 - e^(-t/RC))` gives the source voltage.

use crate::clock::Clock;
use crate::configs::settings::{Analog, BcmPin};
use crate::errors::HardwareError;
use crate::gpio::{Gpio, Level, PinMode};
use crate::logger;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoltageSample {
    Volts(f64),
    /// The pin never crossed the threshold inside the timeout, or the reading
    /// was not physical. Treat as unknown or disconnected.
    NoEdge,
}

impl VoltageSample {
    pub fn volts(self) -> Option<f64> {
        match self {
            VoltageSample::Volts(v) => Some(v),
            VoltageSample::NoEdge => None,
        }
    }

    /// Hundredths of a volt, rounded, as the OSD expects them.
    pub fn centivolts(self) -> Option<i64> {
        self.volts().map(|v| (v * 100.0).round() as i64)
    }
}

/// Invert the RC charge curve for a measured charge time.
///
/// Only voltages in `(0, analog.max_voltage]` are accepted. A zero charge time
/// divides by zero, and charge times far below one time constant blow up
/// towards thousands of volts; both come back as `NoEdge`.
pub fn voltage_from_charge_time(charge_time: Duration, analog: &Analog) -> VoltageSample {
    let switching_voltage = analog.switching_voltage.into_inner();
    // kΩ · µF = ms
    let tau_ms = analog.resistance_kohm.into_inner() * analog.capacitance_uf.into_inner();
    let t_ms = charge_time.as_secs_f64() * 1000.0;

    let voltage = -switching_voltage / ((-t_ms / tau_ms).exp() - 1.0);
    if voltage.is_finite() && voltage > 0.0 && voltage <= analog.max_voltage.into_inner() {
        VoltageSample::Volts(voltage)
    } else {
        VoltageSample::NoEdge
    }
}

pub struct RcSampler {
    pin: u8,
    analog: Analog,
}

impl RcSampler {
    pub fn new(pin: BcmPin, analog: Analog) -> Self {
        Self {
            pin: pin.into_inner(),
            analog,
        }
    }

    /// Take one reading. Hardware failures are logged and reported as `NoEdge`.
    ///
    /// The pin is left driven low whatever happens, so the next reading starts
    /// from a discharged capacitor.
    pub fn sample(&self, gpio: &mut dyn Gpio, clock: &dyn Clock) -> VoltageSample {
        let measured = self.measure(gpio, clock);

        if let Err(e) = self.discharge(gpio) {
            logger::warning(format!("Failed to discharge RC pin {}: {e}", self.pin));
        }

        match measured {
            Ok(Some(charge_time)) => {
                let sample = voltage_from_charge_time(charge_time, &self.analog);
                logger::debug(format!("RC charge time {charge_time:?} -> {sample:?}"));
                sample
            }
            Ok(None) => {
                logger::debug(format!("No rising edge on pin {} within timeout", self.pin));
                VoltageSample::NoEdge
            }
            Err(e) => {
                logger::warning(format!("Voltage sample failed: {e}"));
                VoltageSample::NoEdge
            }
        }
    }

    fn discharge(&self, gpio: &mut dyn Gpio) -> Result<(), HardwareError> {
        gpio.configure(self.pin, PinMode::Output)?;
        gpio.write(self.pin, Level::Low)
    }

    fn measure(
        &self,
        gpio: &mut dyn Gpio,
        clock: &dyn Clock,
    ) -> Result<Option<Duration>, HardwareError> {
        self.discharge(gpio)?;
        clock.sleep(self.analog.settle_ms.as_duration());

        gpio.configure(self.pin, PinMode::Input)?;
        gpio.wait_for_rising_edge(self.pin, self.analog.edge_timeout_ms.as_duration())
    }
}
