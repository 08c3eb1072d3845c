//! Keypad menu driven by the shutdown/menu line.
//!
//! Holding the line low opens the menu: the item overlay goes up and keys are
//! polled until the line is released, which clears the overlay again. The line
//! is active low, a failed read counts as released.

use crate::clock::Clock;
use crate::configs::settings::{Capabilities, Settings, Timing};
use crate::controls::{Collaborators, OverlayId, OverlayRequest, Power, VolumeDirection};
use crate::gpio::Gpio;
use crate::keypad::{Command, KeyKind, Keypad};
use crate::logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    /// Open, showing the given overlay.
    Open(OverlayId),
}

/// What a servicing call ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Line not held; nothing happened.
    Idle,
    /// The menu was open and has been closed again.
    Closed,
    /// The shutdown key was pressed. Nothing should run after this.
    ShutdownRequested,
    /// A stop was requested while the menu was being serviced. The overlay is cleared.
    Stopped,
}

pub struct Menu {
    state: MenuState,
    pin: u8,
    capabilities: Capabilities,
    timing: Timing,
}

impl Menu {
    pub fn new(settings: &Settings) -> Self {
        Self {
            state: MenuState::Closed,
            pin: settings.pins.shutdown.into_inner(),
            capabilities: settings.capabilities,
            timing: settings.timing,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    fn line_held(&self, gpio: &mut dyn Gpio) -> bool {
        match gpio.read(self.pin) {
            Ok(level) => level.is_low(),
            Err(e) => {
                logger::warning(format!("Failed to read menu pin: {e}"));
                false
            }
        }
    }

    fn show(&mut self, controls: &mut Collaborators, overlay: OverlayId) {
        controls.overlay.show(OverlayRequest::Named(overlay));
        self.state = MenuState::Open(overlay);
    }

    fn close(&mut self, controls: &mut Collaborators) {
        if self.state != MenuState::Closed {
            controls.overlay.show(OverlayRequest::None);
            self.state = MenuState::Closed;
        }
    }

    fn stop(&mut self, controls: &mut Collaborators) -> Tick {
        self.close(controls);
        logger::info("Stop requested, leaving menu");
        Tick::Stopped
    }

    /// One servicing call. Returns immediately when the line is not held,
    /// otherwise runs the menu until the line is released, shutdown is chosen
    /// or `stop` is raised. The flag is checked before every key read and
    /// after every sleep.
    pub fn service(
        &mut self,
        gpio: &mut dyn Gpio,
        keypad: &mut Keypad,
        controls: &mut Collaborators,
        clock: &dyn Clock,
        stop: &AtomicBool,
    ) -> Tick {
        if !self.line_held(gpio) {
            self.close(controls);
            return Tick::Idle;
        }

        if self.state == MenuState::Closed {
            logger::info("Menu opened");
            self.show(controls, OverlayId::MenuItems);
        }

        loop {
            if stop.load(Ordering::Relaxed) {
                return self.stop(controls);
            }

            let key = keypad.read_key(self.timing.key_timeout_ms.as_duration());
            match key.command(&self.capabilities) {
                Some(command) => {
                    if self.dispatch(command, gpio, controls, clock) {
                        return Tick::ShutdownRequested;
                    }
                }
                None if key.kind == KeyKind::Key => {
                    logger::info(format!("Unknown key {}", key.code));
                }
                None => {}
            }

            if stop.load(Ordering::Relaxed) {
                return self.stop(controls);
            }
            if !self.line_held(gpio) {
                self.close(controls);
                logger::info("Menu closed");
                return Tick::Closed;
            }
            clock.sleep(self.timing.menu_pacing_ms.as_duration());
        }
    }

    /// Returns true once shutdown has been executed.
    fn dispatch(
        &mut self,
        command: Command,
        gpio: &mut dyn Gpio,
        controls: &mut Collaborators,
        clock: &dyn Clock,
    ) -> bool {
        logger::info(format!("{command} key"));
        let volume_hold = self.timing.volume_hold_ms.as_duration();
        let toggle_hold = self.timing.toggle_hold_ms.as_duration();

        match command {
            Command::Shutdown => {
                self.show(controls, OverlayId::ShuttingDown);
                controls.shutdown.execute();
                return true;
            }
            Command::VolumeUp => self.pulse(controls, clock, OverlayId::VolUp, volume_hold, |c| {
                Ok(c.volume.apply(VolumeDirection::Up)?)
            }),
            Command::VolumeDown => {
                self.pulse(controls, clock, OverlayId::VolDown, volume_hold, |c| {
                    Ok(c.volume.apply(VolumeDirection::Down)?)
                })
            }
            Command::WifiEnable => {
                self.pulse(controls, clock, OverlayId::WifiEnable, toggle_hold, |c| {
                    Ok(c.wifi.apply(Power::On)?)
                })
            }
            Command::WifiDisable => {
                self.pulse(controls, clock, OverlayId::WifiDisable, toggle_hold, |c| {
                    Ok(c.wifi.apply(Power::Off)?)
                })
            }
            Command::VtxEnable => {
                self.pulse(controls, clock, OverlayId::VtxEnable, toggle_hold, |c| {
                    Ok(c.vtx.apply(gpio, Power::On)?)
                })
            }
            Command::VtxDisable => {
                self.pulse(controls, clock, OverlayId::VtxDisable, toggle_hold, |c| {
                    Ok(c.vtx.apply(gpio, Power::Off)?)
                })
            }
        }
        false
    }

    /// Show the action's overlay, run it, hold, then put the item list back.
    fn pulse<F>(
        &mut self,
        controls: &mut Collaborators,
        clock: &dyn Clock,
        overlay: OverlayId,
        hold: Duration,
        action: F,
    ) where
        F: FnOnce(&mut Collaborators) -> anyhow::Result<()>,
    {
        self.show(controls, overlay);
        if let Err(e) = action(controls) {
            logger::warning(format!("{overlay} failed: {e}"));
        }
        clock.sleep(hold);
        self.show(controls, OverlayId::MenuItems);
    }
}
