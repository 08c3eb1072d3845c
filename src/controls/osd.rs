//! Telemetry hand-off to the `saio-osd` renderer.
//!
//! The OSD reads an INI data file and re-reads it whenever it gets `SIGUSR1`.
//! Files are replaced by rename, so the OSD only ever sees a complete file.

use super::{TelemetryFrame, TelemetrySink};
use crate::clock::Clock;
use crate::configs::settings::Paths;
use crate::errors::{InitError, ToolError};
use crate::logger;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;

const PROTOCOL_VERSION: u32 = 1;
const UNKNOWN_VOLTAGE: &str = "-.--";
const UNKNOWN_TEMPERATURE: &str = "--.-";

pub fn render_data_file(frame: &TelemetryFrame) -> String {
    let voltage = frame
        .voltage
        .centivolts()
        .map_or_else(|| UNKNOWN_VOLTAGE.to_string(), |cv| cv.to_string());
    let temperature = frame
        .temperature
        .map_or_else(|| UNKNOWN_TEMPERATURE.to_string(), |t| t.to_string());

    let mut out = String::new();
    let _ = writeln!(out, "[protocol]");
    let _ = writeln!(out, "version = {PROTOCOL_VERSION}");
    let _ = writeln!(out);
    let _ = writeln!(out, "[data]");
    let _ = writeln!(out, "voltage = {voltage}");
    let _ = writeln!(out, "temperature = {temperature}");
    let _ = writeln!(out, "showdebug = {}", u8::from(frame.show_debug));
    let _ = writeln!(out, "showwifi = {}", u8::from(frame.show_wifi));
    let _ = writeln!(out, "showmute = {}", u8::from(frame.show_mute));
    out
}

/// Write through a sibling temp file and rename over the target.
pub fn write_data_file(path: &Path, frame: &TelemetryFrame) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(render_data_file(frame).as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub struct OsdSink {
    data_file: PathBuf,
    process: Child,
}

impl OsdSink {
    /// Seed the data file, launch the OSD and make sure it survived startup.
    pub fn start(paths: &Paths, grace: Duration, clock: &dyn Clock) -> Result<Self, InitError> {
        let data_file = paths.osd_data_file.clone();
        write_data_file(&data_file, &TelemetryFrame::placeholder()).map_err(|source| {
            InitError::DataFile {
                path: data_file.clone(),
                source,
            }
        })?;

        let mut process = Command::new(&paths.osd_binary)
            .arg("-d")
            .arg(&data_file)
            .arg("-c")
            .arg(&paths.osd_config_file)
            .spawn()
            .map_err(|source| InitError::OsdSpawn {
                path: paths.osd_binary.clone(),
                source,
            })?;

        clock.sleep(grace);
        match process.try_wait() {
            Ok(None) => {
                logger::success(format!("OSD started (pid {})", process.id()));
                Ok(Self { data_file, process })
            }
            Ok(Some(status)) => Err(InitError::OsdExited(status.code())),
            Err(source) => Err(InitError::OsdSpawn {
                path: paths.osd_binary.clone(),
                source,
            }),
        }
    }

    fn pid(&self) -> Pid {
        Pid::from_raw(self.process.id() as i32)
    }
}

impl TelemetrySink for OsdSink {
    fn publish(&mut self, frame: &TelemetryFrame) -> Result<(), ToolError> {
        write_data_file(&self.data_file, frame)?;
        kill(self.pid(), Signal::SIGUSR1)?;
        Ok(())
    }
}

impl Drop for OsdSink {
    fn drop(&mut self) {
        if let Err(e) = kill(self.pid(), Signal::SIGTERM) {
            logger::debug(format!("OSD already stopped: {e}"));
        }
        let _ = self.process.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analog::VoltageSample;
    use crate::clock::ManualClock;
    use crate::configs::settings::Settings;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn frame(voltage: VoltageSample, temperature: Option<f64>) -> TelemetryFrame {
        TelemetryFrame {
            voltage,
            temperature,
            show_debug: false,
            show_wifi: true,
            show_mute: false,
        }
    }

    fn paths_in(dir: &Path, osd_binary: &Path) -> Paths {
        let mut paths = Settings::from_overrides("").unwrap().paths;
        paths.osd_binary = osd_binary.to_path_buf();
        paths.osd_data_file = dir.join("data.ini");
        paths.osd_config_file = dir.join("config.ini");
        paths
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-osd");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn renders_reading() {
        let rendered = render_data_file(&frame(VoltageSample::Volts(12.346), Some(48.3)));
        insta::assert_snapshot!(rendered, @r"
        [protocol]
        version = 1

        [data]
        voltage = 1235
        temperature = 48.3
        showdebug = 0
        showwifi = 1
        showmute = 0
        ");
    }

    #[test]
    fn renders_placeholders() {
        let rendered = render_data_file(&TelemetryFrame::placeholder());
        assert!(rendered.contains("voltage = -.--\n"));
        assert!(rendered.contains("temperature = --.-\n"));
        assert!(rendered.contains("showdebug = 1\n"));
    }

    #[test]
    fn write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.ini");
        fs::write(&path, "stale contents that are much longer than the new file").unwrap();

        write_data_file(&path, &frame(VoltageSample::NoEdge, None)).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_data_file(&frame(VoltageSample::NoEdge, None)));
    }

    #[test]
    fn start_fails_when_binary_missing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path(), Path::new("/nonexistent/saio-osd"));
        let result = OsdSink::start(&paths, Duration::from_millis(1), &ManualClock::new());
        assert!(matches!(result, Err(InitError::OsdSpawn { .. })));
        // placeholder is written before the launch
        assert!(dir.path().join("data.ini").exists());
    }

    #[test]
    fn start_fails_when_osd_exits_early() {
        let dir = tempfile::tempdir().unwrap();
        let binary = script(dir.path(), "exit 3");
        let paths = paths_in(dir.path(), &binary);
        let result = OsdSink::start(&paths, Duration::from_millis(500), &crate::clock::SystemClock);
        assert!(matches!(result, Err(InitError::OsdExited(Some(3)))));
    }

    #[test]
    fn start_fails_when_data_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = paths_in(dir.path(), Path::new("/bin/true"));
        paths.osd_data_file = dir.path().join("missing").join("data.ini");
        let result = OsdSink::start(&paths, Duration::from_millis(1), &ManualClock::new());
        assert!(matches!(result, Err(InitError::DataFile { .. })));
    }

    #[test]
    fn publish_rewrites_data_file() {
        let dir = tempfile::tempdir().unwrap();
        // ignore the reload signal so the process outlives the publish
        let binary = script(dir.path(), "trap '' USR1\nsleep 5");
        let paths = paths_in(dir.path(), &binary);

        let mut sink = OsdSink::start(&paths, Duration::ZERO, &ManualClock::new()).unwrap();
        let reading = frame(VoltageSample::Volts(7.4), Some(51.0));
        sink.publish(&reading).unwrap();

        let written = fs::read_to_string(dir.path().join("data.ini")).unwrap();
        assert!(written.contains("voltage = 740\n"));
        assert!(written.contains("temperature = 51\n"));
    }
}
