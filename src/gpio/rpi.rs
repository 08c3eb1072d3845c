use super::{Gpio, Level, PinMode};
use crate::errors::HardwareError;
use crate::logger;
use rppal::gpio::{self, InputPin, OutputPin, Trigger};
use std::collections::HashMap;
use std::time::{Duration, Instant};

enum Line {
    Input(InputPin),
    Output(OutputPin),
}

impl Line {
    fn mode(&self) -> PinMode {
        match self {
            Line::Input(_) => PinMode::Input,
            Line::Output(_) => PinMode::Output,
        }
    }
}

/// Raspberry Pi GPIO through `rppal`.
///
/// Pins are claimed the first time they are used. Switching direction drops the
/// old handle and claims the pin again, with reset-on-drop disabled so the pin
/// keeps its state between the two handles.
pub struct RpiGpio {
    controller: gpio::Gpio,
    lines: HashMap<u8, Line>,
}

impl RpiGpio {
    pub fn open() -> Result<Self, HardwareError> {
        let controller = gpio::Gpio::new().map_err(HardwareError::Unavailable)?;
        Ok(Self {
            controller,
            lines: HashMap::new(),
        })
    }

    fn claim(&mut self, pin: u8, mode: PinMode) -> Result<Line, HardwareError> {
        let raw = self
            .controller
            .get(pin)
            .map_err(|source| HardwareError::Backend { pin, source })?;
        let line = match mode {
            PinMode::Input => {
                let mut input = raw.into_input();
                input.set_reset_on_drop(false);
                Line::Input(input)
            }
            PinMode::Output => {
                let mut output = raw.into_output_low();
                output.set_reset_on_drop(false);
                Line::Output(output)
            }
        };
        Ok(line)
    }
}

impl Gpio for RpiGpio {
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), HardwareError> {
        if self.lines.get(&pin).map(Line::mode) == Some(mode) {
            return Ok(());
        }
        // the old handle must be gone before the pin can be claimed again
        self.lines.remove(&pin);
        let line = self.claim(pin, mode)?;
        self.lines.insert(pin, line);
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, HardwareError> {
        if !self.lines.contains_key(&pin) {
            self.configure(pin, PinMode::Input)?;
        }
        let level = match self.lines.get(&pin) {
            Some(Line::Input(input)) => input.is_high(),
            Some(Line::Output(output)) => output.is_set_high(),
            None => {
                return Err(HardwareError::WrongMode {
                    pin,
                    expected: PinMode::Input,
                })
            }
        };
        Ok(Level::from(level))
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareError> {
        match self.lines.get_mut(&pin) {
            Some(Line::Output(output)) => {
                match level {
                    Level::High => output.set_high(),
                    Level::Low => output.set_low(),
                }
                Ok(())
            }
            _ => Err(HardwareError::WrongMode {
                pin,
                expected: PinMode::Output,
            }),
        }
    }

    fn wait_for_rising_edge(
        &mut self,
        pin: u8,
        timeout: Duration,
    ) -> Result<Option<Duration>, HardwareError> {
        let Some(Line::Input(input)) = self.lines.get_mut(&pin) else {
            return Err(HardwareError::WrongMode {
                pin,
                expected: PinMode::Input,
            });
        };

        let started = Instant::now();
        input
            .set_interrupt(Trigger::RisingEdge, None)
            .map_err(|source| HardwareError::Backend { pin, source })?;
        let event = input.poll_interrupt(true, Some(timeout));
        let elapsed = started.elapsed();
        if let Err(e) = input.clear_interrupt() {
            logger::debug(format!("Failed to clear interrupt on pin {pin}: {e}"));
        }

        let event = event.map_err(|source| HardwareError::Backend { pin, source })?;
        Ok(event.map(|_| elapsed))
    }

    fn release_all(&mut self) -> Result<(), HardwareError> {
        let pins: Vec<u8> = self.lines.keys().copied().collect();
        let mut first_error = None;
        for pin in pins {
            if let Err(e) = self.configure(pin, PinMode::Input) {
                logger::warning(format!("Failed to release pin {pin}: {e}"));
                first_error.get_or_insert(e);
            }
        }
        self.lines.clear();
        first_error.map_or(Ok(()), Err)
    }
}
