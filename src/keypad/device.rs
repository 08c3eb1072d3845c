use super::{KeySource, RECORD_SIZE};
use crate::errors::InputError;
use crate::timeout::Deadline;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A `/dev/input/event*` node.
///
/// The node is opened fresh for every read, so only presses made while the menu
/// is waiting are seen; anything buffered in between is dropped with the handle.
#[derive(Debug, Clone)]
pub struct EventDevice {
    path: PathBuf,
}

impl EventDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_index(index: u32) -> Self {
        Self::new(format!("/dev/input/event{index}"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeySource for EventDevice {
    fn read_record(&mut self, timeout: Duration) -> Result<Vec<u8>, InputError> {
        let deadline = Deadline::after(timeout);
        let mut file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
            .map_err(|source| InputError::Open {
                path: self.path.clone(),
                source,
            })?;

        let mut record = vec![0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match file.read(&mut record[filled..]) {
                Ok(0) => {
                    return Err(InputError::Malformed {
                        expected: RECORD_SIZE,
                        got: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if deadline.expired() {
                        return Err(if filled == 0 {
                            InputError::Timeout(deadline.limit())
                        } else {
                            InputError::Malformed {
                                expected: RECORD_SIZE,
                                got: filled,
                            }
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL.min(deadline.remaining()));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypad::RawEvent;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;
    use std::fs::File;
    use std::io::Write;
    use std::time::Instant;

    /// A FIFO with a writer attached, so reads block instead of hitting EOF.
    fn quiet_fifo(dir: &Path) -> (PathBuf, File) {
        let path = dir.join("event0");
        mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        let writer = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        (path, writer)
    }

    #[test]
    fn reads_one_record_from_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&RawEvent::key_press(103).encode()).unwrap();
        file.write_all(&RawEvent::separator().encode()).unwrap();

        let mut device = EventDevice::new(file.path());
        let bytes = device.read_record(Duration::from_secs(1)).unwrap();
        assert_eq!(RawEvent::decode(&bytes).unwrap().code, 103);
    }

    #[test]
    fn truncated_stream_is_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&RawEvent::key_press(103).encode()[..10]).unwrap();

        let mut device = EventDevice::new(file.path());
        assert!(matches!(
            device.read_record(Duration::from_secs(1)),
            Err(InputError::Malformed { got: 10, .. })
        ));
    }

    #[test]
    fn silent_device_times_out_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _writer) = quiet_fifo(dir.path());
        let limit = Duration::from_millis(300);

        let mut device = EventDevice::new(path);
        let started = Instant::now();
        let result = device.read_record(limit);
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(InputError::Timeout(l)) if l == limit));
        assert!(elapsed >= limit, "returned early after {elapsed:?}");
        assert!(elapsed < limit + Duration::from_millis(500), "took {elapsed:?}");
    }

    #[test]
    fn partial_record_at_deadline_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut writer) = quiet_fifo(dir.path());
        writer.write_all(&RawEvent::key_press(103).encode()[..10]).unwrap();

        let mut device = EventDevice::new(path);
        assert!(matches!(
            device.read_record(Duration::from_millis(100)),
            Err(InputError::Malformed { got: 10, .. })
        ));
    }

    #[test]
    fn record_written_during_wait_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut writer) = quiet_fifo(dir.path());
        let mut device = EventDevice::new(path);

        let feeder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            writer.write_all(&RawEvent::key_press(29).encode()).unwrap();
            writer
        });
        let bytes = device.read_record(Duration::from_secs(2)).unwrap();
        let _writer = feeder.join().unwrap();

        assert_eq!(RawEvent::decode(&bytes).unwrap().code, 29);
    }

    #[test]
    fn missing_device_is_open_error() {
        let mut device = EventDevice::new("/nonexistent/event9");
        assert!(matches!(
            device.read_record(Duration::from_millis(50)),
            Err(InputError::Open { .. })
        ));
    }

    #[test]
    fn index_selects_event_node() {
        assert_eq!(
            EventDevice::for_index(2).path(),
            Path::new("/dev/input/event2")
        );
    }
}
