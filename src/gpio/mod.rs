//! Digital pin access by BCM number.
//!
//! Everything above this module refers to pins by number only; the backend owns
//! the underlying handles. [`rpi::RpiGpio`] drives real hardware through the
//! kernel GPIO character device, [`mock::MockGpio`] replays scripted levels.

pub mod mock;
pub mod rpi;

use crate::errors::HardwareError;
use std::time::Duration;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PinMode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

pub trait Gpio {
    /// Set the pin direction. Configuring a pin to the mode it already has is a no-op.
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), HardwareError>;

    /// Current logic level. Output pins report the level they are driving.
    fn read(&mut self, pin: u8) -> Result<Level, HardwareError>;

    /// Drive an output pin.
    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareError>;

    /// Block until the input pin sees a rising edge or `timeout` passes.
    ///
    /// Returns the time waited, or `None` on timeout. Never blocks much past
    /// `timeout`.
    fn wait_for_rising_edge(
        &mut self,
        pin: u8,
        timeout: Duration,
    ) -> Result<Option<Duration>, HardwareError>;

    /// Return every pin touched so far to input.
    fn release_all(&mut self) -> Result<(), HardwareError>;
}
