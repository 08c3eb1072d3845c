use super::{Gpio, Level, PinMode};
use crate::errors::HardwareError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    modes: HashMap<u8, PinMode>,
    scripted: HashMap<u8, VecDeque<Level>>,
    current: HashMap<u8, Level>,
    edges: VecDeque<Option<Duration>>,
    configures: Vec<(u8, PinMode)>,
    writes: Vec<(u8, Level)>,
    reads: HashMap<u8, usize>,
    failing: HashSet<u8>,
    released: bool,
}

/// Scripted GPIO for tests.
///
/// Each read of a pin pops the next scripted level; once the script runs out the
/// last level repeats (pins start high, matching the pulled-up shutdown line).
/// Edge waits pop scripted charge times and report `None` when the charge time
/// exceeds the timeout.
#[derive(Debug, Clone, Default)]
pub struct MockGpio {
    state: Arc<Mutex<MockState>>,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // a poisoned lock only means another test thread panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn script_levels(&self, pin: u8, levels: &[Level]) {
        self.state()
            .scripted
            .entry(pin)
            .or_default()
            .extend(levels.iter().copied());
    }

    /// Queue the RC charge time of the next edge wait; `None` means no edge at all.
    pub fn script_edge(&self, charge_time: Option<Duration>) {
        self.state().edges.push_back(charge_time);
    }

    pub fn fail_pin(&self, pin: u8) {
        self.state().failing.insert(pin);
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.state().modes.get(&pin).copied()
    }

    pub fn configures(&self) -> Vec<(u8, PinMode)> {
        self.state().configures.clone()
    }

    pub fn writes(&self) -> Vec<(u8, Level)> {
        self.state().writes.clone()
    }

    pub fn read_count(&self, pin: u8) -> usize {
        self.state().reads.get(&pin).copied().unwrap_or(0)
    }

    pub fn released(&self) -> bool {
        self.state().released
    }

    fn check(state: &MockState, pin: u8) -> Result<(), HardwareError> {
        if state.failing.contains(&pin) {
            return Err(HardwareError::Disconnected(pin));
        }
        Ok(())
    }
}

impl Gpio for MockGpio {
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), HardwareError> {
        let mut state = self.state();
        Self::check(&state, pin)?;
        state.configures.push((pin, mode));
        state.modes.insert(pin, mode);
        state.released = false;
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, HardwareError> {
        let mut state = self.state();
        Self::check(&state, pin)?;
        *state.reads.entry(pin).or_default() += 1;
        let next = state.scripted.get_mut(&pin).and_then(VecDeque::pop_front);
        let level = match next {
            Some(level) => {
                state.current.insert(pin, level);
                level
            }
            None => state.current.get(&pin).copied().unwrap_or(Level::High),
        };
        Ok(level)
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareError> {
        let mut state = self.state();
        Self::check(&state, pin)?;
        if state.modes.get(&pin) != Some(&PinMode::Output) {
            return Err(HardwareError::WrongMode {
                pin,
                expected: PinMode::Output,
            });
        }
        state.writes.push((pin, level));
        state.current.insert(pin, level);
        Ok(())
    }

    fn wait_for_rising_edge(
        &mut self,
        pin: u8,
        timeout: Duration,
    ) -> Result<Option<Duration>, HardwareError> {
        let mut state = self.state();
        Self::check(&state, pin)?;
        if state.modes.get(&pin) != Some(&PinMode::Input) {
            return Err(HardwareError::WrongMode {
                pin,
                expected: PinMode::Input,
            });
        }
        let charge_time = state.edges.pop_front().flatten();
        Ok(charge_time.filter(|t| *t <= timeout))
    }

    fn release_all(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state();
        for mode in state.modes.values_mut() {
            *mode = PinMode::Input;
        }
        state.released = true;
        Ok(())
    }
}
