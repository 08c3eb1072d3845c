//! Colourised line logging for the companion supervisor
//!
//! Every contained per-cycle failure ends up here, so the output doubles as the
//! board's event journal when run under systemd. Warnings and errors go to
//! stderr, everything else to stdout.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[90m";
const RULE_WIDTH: usize = 60;

#[derive(Clone, Copy)]
enum Level {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl Level {
    /// ANSI colour, marker and label.
    fn style(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Level::Info => ("\x1b[36m", "ℹ", "INFO"),
            Level::Success => ("\x1b[32m", "✓", "OK"),
            Level::Warning => ("\x1b[33m", "⚠", "WARN"),
            Level::Error => ("\x1b[31m", "✗", "ERROR"),
            Level::Debug => (DIM, "•", "DEBUG"),
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Level::Warning | Level::Error)
    }
}

fn emit(level: Level, message: impl Display) {
    let (colour, marker, label) = level.style();
    let line = format!("{colour}{marker} {label}{RESET} {message}");
    if level.to_stderr() {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

/// Turn debug output on or off. Called once after settings are loaded.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Major step header.
pub fn section(title: impl Display) {
    println!("\n\x1b[34m\x1b[1m▶ {title}{RESET}");
}

pub fn subsection(title: impl Display) {
    println!("  \x1b[36m→{RESET} {title}");
}

pub fn info(message: impl Display) {
    emit(Level::Info, message);
}

pub fn success(message: impl Display) {
    emit(Level::Success, message);
}

pub fn warning(message: impl Display) {
    emit(Level::Warning, message);
}

pub fn error(message: impl Display) {
    emit(Level::Error, message);
}

/// Dropped unless debug output was enabled by config or `--debug`.
pub fn debug(message: impl Display) {
    if debug_enabled() {
        emit(Level::Debug, message);
    }
}

pub fn config_group(title: impl Display) {
    println!("  \x1b[1m[{title}]{RESET}");
}

pub fn kvp(key: impl Display, value: impl Display) {
    println!("  {DIM}•{RESET} {key}: {value}");
}

/// Indented dim line, used for raw readings.
pub fn detail(message: impl Display) {
    println!("    {DIM}{message}{RESET}");
}

pub fn app_start(app_name: &str, version: &str) {
    println!("\n\x1b[1m{app_name} v{version}{RESET}");
    println!("{DIM}{}{RESET}", "=".repeat(RULE_WIDTH));
}

pub fn app_end() {
    println!("\n{DIM}{}{RESET}", "=".repeat(RULE_WIDTH));
}
