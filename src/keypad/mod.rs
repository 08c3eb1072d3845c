//! Keypad decoding from raw Linux input-event records.
//!
//! One read attempt consumes exactly one record:
//!
//! | bytes  | field         | type |
//! |--------|---------------|------|
//! | 0..8   | seconds       | i64  |
//! | 8..16  | microseconds  | i64  |
//! | 16..18 | event type    | u16  |
//! | 18..20 | code          | u16  |
//! | 20..24 | value         | u32  |
//!
//! all in native byte order.

pub mod device;
pub mod mock;

use crate::configs::settings::Capabilities;
use crate::errors::InputError;
use crate::logger;
use std::time::Duration;
use strum_macros::Display;

pub const RECORD_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawEvent {
    pub seconds: i64,
    pub micros: i64,
    pub event_type: u16,
    pub code: u16,
    pub value: u32,
}

impl RawEvent {
    /// A key press as the kernel reports it (`EV_KEY`, value 1).
    pub fn key_press(code: u16) -> Self {
        Self {
            event_type: 1,
            code,
            value: 1,
            ..Self::default()
        }
    }

    pub fn separator() -> Self {
        Self::default()
    }

    /// All-zero type, code and value marks a sync boundary, whatever the timestamp.
    pub fn is_separator(&self) -> bool {
        self.event_type == 0 && self.code == 0 && self.value == 0
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut record = [0u8; RECORD_SIZE];
        record[0..8].copy_from_slice(&self.seconds.to_ne_bytes());
        record[8..16].copy_from_slice(&self.micros.to_ne_bytes());
        record[16..18].copy_from_slice(&self.event_type.to_ne_bytes());
        record[18..20].copy_from_slice(&self.code.to_ne_bytes());
        record[20..24].copy_from_slice(&self.value.to_ne_bytes());
        record
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, InputError> {
        let record: &[u8; RECORD_SIZE] =
            bytes.try_into().map_err(|_| InputError::Malformed {
                expected: RECORD_SIZE,
                got: bytes.len(),
            })?;

        let mut seconds = [0u8; 8];
        let mut micros = [0u8; 8];
        let mut event_type = [0u8; 2];
        let mut code = [0u8; 2];
        let mut value = [0u8; 4];
        seconds.copy_from_slice(&record[0..8]);
        micros.copy_from_slice(&record[8..16]);
        event_type.copy_from_slice(&record[16..18]);
        code.copy_from_slice(&record[18..20]);
        value.copy_from_slice(&record[20..24]);

        Ok(Self {
            seconds: i64::from_ne_bytes(seconds),
            micros: i64::from_ne_bytes(micros),
            event_type: u16::from_ne_bytes(event_type),
            code: u16::from_ne_bytes(code),
            value: u32::from_ne_bytes(value),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Key,
    /// Separator record, no key involved.
    Idle,
    /// Timeout, open failure, short or malformed record.
    ReadFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub kind: KeyKind,
}

impl KeyEvent {
    pub fn key(code: u16) -> Self {
        Self {
            code,
            kind: KeyKind::Key,
        }
    }

    pub fn idle() -> Self {
        Self {
            code: 0,
            kind: KeyKind::Idle,
        }
    }

    pub fn read_failure() -> Self {
        Self {
            code: 0,
            kind: KeyKind::ReadFailure,
        }
    }

    /// The menu command for this event, if any.
    pub fn command(&self, capabilities: &Capabilities) -> Option<Command> {
        match self.kind {
            KeyKind::Key => Command::from_code(self.code, capabilities),
            KeyKind::Idle | KeyKind::ReadFailure => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Command {
    #[strum(serialize = "volume up")]
    VolumeUp,
    #[strum(serialize = "volume down")]
    VolumeDown,
    #[strum(serialize = "shutdown")]
    Shutdown,
    #[strum(serialize = "wifi enable")]
    WifiEnable,
    #[strum(serialize = "wifi disable")]
    WifiDisable,
    #[strum(serialize = "vtx enable")]
    VtxEnable,
    #[strum(serialize = "vtx disable")]
    VtxDisable,
}

impl Command {
    pub const KEY_VOLUME_UP: u16 = 103;
    pub const KEY_VOLUME_DOWN: u16 = 108;
    pub const KEY_SHUTDOWN: u16 = 29;
    pub const KEY_WIFI_ENABLE: u16 = 45;
    pub const KEY_WIFI_DISABLE: u16 = 44;
    pub const KEY_VTX_ENABLE: u16 = 106;
    pub const KEY_VTX_DISABLE: u16 = 105;

    /// Fixed key table. VTX keys only exist on boards with VTX control.
    pub fn from_code(code: u16, capabilities: &Capabilities) -> Option<Self> {
        let command = match code {
            Self::KEY_VOLUME_UP => Command::VolumeUp,
            Self::KEY_VOLUME_DOWN => Command::VolumeDown,
            Self::KEY_SHUTDOWN => Command::Shutdown,
            Self::KEY_WIFI_ENABLE => Command::WifiEnable,
            Self::KEY_WIFI_DISABLE => Command::WifiDisable,
            Self::KEY_VTX_ENABLE if capabilities.has_vtx => Command::VtxEnable,
            Self::KEY_VTX_DISABLE if capabilities.has_vtx => Command::VtxDisable,
            _ => return None,
        };
        Some(command)
    }
}

/// Somewhere event records come from.
pub trait KeySource {
    /// Read at most one record, giving up once `timeout` has passed.
    fn read_record(&mut self, timeout: Duration) -> Result<Vec<u8>, InputError>;
}

pub struct Keypad {
    source: Box<dyn KeySource>,
}

impl Keypad {
    pub fn new(source: Box<dyn KeySource>) -> Self {
        Self { source }
    }

    /// Read and classify one record. Failures are logged, never returned.
    pub fn read_key(&mut self, timeout: Duration) -> KeyEvent {
        let event = self
            .source
            .read_record(timeout)
            .and_then(|bytes| RawEvent::decode(&bytes));

        match event {
            Ok(event) if event.is_separator() => {
                logger::debug("Separator event");
                KeyEvent::idle()
            }
            Ok(event) => {
                logger::debug(format!(
                    "Event type {}, code {}, value {} at {}.{:06}",
                    event.event_type, event.code, event.value, event.seconds, event.micros
                ));
                KeyEvent::key(event.code)
            }
            Err(InputError::Timeout(limit)) => {
                logger::debug(format!("No key within {limit:?}"));
                KeyEvent::read_failure()
            }
            Err(e) => {
                logger::warning(format!("Failed to read keypresses: {e}"));
                KeyEvent::read_failure()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockKeySource;
    use super::*;

    fn all_capabilities() -> Capabilities {
        Capabilities {
            has_menu: true,
            has_telemetry: true,
            has_vtx: true,
            shutdown_enabled: false,
        }
    }

    #[test]
    fn shutdown_code_survives_encoding() {
        let bytes = RawEvent::key_press(29).encode();
        let event = RawEvent::decode(&bytes).unwrap();
        assert_eq!(event.code, 29);
        assert_eq!(
            KeyEvent::key(event.code).command(&all_capabilities()),
            Some(Command::Shutdown)
        );
    }

    #[test]
    fn separator_ignores_timestamp() {
        let event = RawEvent {
            seconds: 1_700_000_000,
            micros: 123_456,
            ..RawEvent::separator()
        };
        let decoded = RawEvent::decode(&event.encode()).unwrap();
        assert!(decoded.is_separator());

        let source = MockKeySource::new();
        source.push_event(event);
        let mut keypad = Keypad::new(Box::new(source));
        let key = keypad.read_key(Duration::from_secs(1));
        assert_eq!(key.kind, KeyKind::Idle);
        assert_eq!(key.command(&all_capabilities()), None);
    }

    #[test]
    fn non_zero_value_alone_is_not_a_separator() {
        let event = RawEvent {
            value: 1,
            ..RawEvent::separator()
        };
        assert!(!event.is_separator());
    }

    #[test]
    fn short_record_is_malformed() {
        assert!(matches!(
            RawEvent::decode(&[0u8; 16]),
            Err(InputError::Malformed {
                expected: RECORD_SIZE,
                got: 16
            })
        ));
    }

    #[test]
    fn key_table() {
        let caps = all_capabilities();
        let table = [
            (103, Command::VolumeUp),
            (108, Command::VolumeDown),
            (29, Command::Shutdown),
            (45, Command::WifiEnable),
            (44, Command::WifiDisable),
            (106, Command::VtxEnable),
            (105, Command::VtxDisable),
        ];
        for (code, command) in table {
            assert_eq!(Command::from_code(code, &caps), Some(command), "code {code}");
        }
        assert_eq!(Command::from_code(30, &caps), None);
    }

    #[test]
    fn vtx_keys_need_vtx_capability() {
        let caps = Capabilities {
            has_vtx: false,
            ..all_capabilities()
        };
        assert_eq!(Command::from_code(106, &caps), None);
        assert_eq!(Command::from_code(105, &caps), None);
        assert_eq!(Command::from_code(103, &caps), Some(Command::VolumeUp));
    }

    #[test]
    fn failures_classify_as_read_failure() {
        let source = MockKeySource::new();
        source.push_bytes(vec![1, 2, 3]);
        source.push_timeout();
        let mut keypad = Keypad::new(Box::new(source.clone()));

        assert_eq!(keypad.read_key(Duration::from_secs(1)).kind, KeyKind::ReadFailure);
        assert_eq!(keypad.read_key(Duration::from_secs(1)).kind, KeyKind::ReadFailure);
        // queue exhausted behaves like nobody pressing anything
        assert_eq!(keypad.read_key(Duration::from_secs(1)).kind, KeyKind::ReadFailure);
        assert_eq!(source.reads(), 3);
    }

    #[test]
    fn key_press_returns_raw_code() {
        let source = MockKeySource::new();
        source.push_event(RawEvent::key_press(30));
        let mut keypad = Keypad::new(Box::new(source));
        assert_eq!(keypad.read_key(Duration::from_secs(1)), KeyEvent::key(30));
    }

    #[test]
    fn command_names() {
        assert_eq!(Command::VolumeUp.to_string(), "volume up");
        assert_eq!(Command::VtxDisable.to_string(), "vtx disable");
    }
}
