//! Console and file logging for plugix
//!
//! Library crates emit structured events through `tracing`; this crate owns the
//! user-facing side: colored console messages gated by verbosity, a per-run
//! log file, indexer output capture and a spinner shown while the index is
//! rebuilt.

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Mutex;
use std::time::Duration;

const LOG_FILE_NAME: &str = "plugix.log";
const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
static VERBOSITY: Mutex<u8> = Mutex::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Debug,
    Warn,
    Error,
    Success,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Success => "SUCCESS",
        }
    }

    /// Minimum verbosity at which the message reaches the console
    fn console_threshold(self) -> u8 {
        match self {
            Level::Info | Level::Debug => 1,
            Level::Warn | Level::Error | Level::Success => 0,
        }
    }

    fn prefix(self) -> Option<ColoredString> {
        match self {
            Level::Info => None,
            Level::Debug => Some("DEBUG:".blue().bold()),
            Level::Warn => Some("warning:".yellow().bold()),
            Level::Error => Some("Error:".red().bold()),
            Level::Success => Some("✔".green().bold()),
        }
    }
}

pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map_or(0, |v| *v)
}

/// Default `tracing` filter directive for the current verbosity
/// 0 = warn only, 1 = debug (-v), 2 = trace (-vv)
pub fn verbosity_to_filter() -> String {
    match get_verbosity() {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
    .to_string()
}

/// Initialize the logger with the log file in the plugix config directory
pub fn init_with_verbosity(verbosity: u8) -> Result<(), String> {
    let dir = default_log_dir().ok_or("Could not determine the plugix config directory")?;
    init_in_dir(verbosity, &dir)
}

/// Initialize the logger with the log file placed in `dir`
///
/// The file is truncated so it only holds the current run.
pub fn init_in_dir(verbosity: u8, dir: &Path) -> Result<(), String> {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = verbosity;
    }
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create log directory: {}", e))?;

    let path = dir.join(LOG_FILE_NAME);
    if path.exists() {
        let _ = fs::remove_file(&path);
    }
    let mut guard = LOG_FILE
        .lock()
        .map_err(|_| "Log file lock poisoned".to_string())?;
    *guard = Some(path);
    Ok(())
}

fn default_log_dir() -> Option<PathBuf> {
    #[cfg(not(target_os = "windows"))]
    let base = dirs::home_dir().map(|home| home.join(".config"));
    #[cfg(target_os = "windows")]
    let base = dirs::config_dir();
    base.map(|dir| dir.join("plugix"))
}

/// Path of the current run's log file, once initialized
pub fn log_path() -> Option<PathBuf> {
    LOG_FILE.lock().ok().and_then(|guard| guard.clone())
}

fn append(source: &str, line: &str) {
    let Some(path) = log_path() else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(file, "[{}] [{}] {}", timestamp, source, line);
    }
}

fn emit(level: Level, message: &str) {
    append("PLUGIX", &format!("{} {}", level.tag(), message));
    if get_verbosity() < level.console_threshold() {
        return;
    }
    match level.prefix() {
        Some(prefix) => eprintln!("{} {}", prefix, message),
        None => eprintln!("{}", message),
    }
}

/// Shown with `-v`, always written to the log file
pub fn info(message: &str) {
    emit(Level::Info, message);
}

pub fn debug(message: &str) {
    emit(Level::Debug, message);
}

pub fn warn(message: &str) {
    emit(Level::Warn, message);
}

pub fn error(message: &str) {
    emit(Level::Error, message);
}

pub fn success(message: &str) {
    emit(Level::Success, message);
}

/// Record an indexer run: exit status plus whatever it printed
pub fn capture_output(command: &str, output: &Output) {
    append(
        "INDEXER",
        &format!("COMMAND: {} (exit code: {:?})", command, output.status.code()),
    );
    for (stream, bytes) in [("STDOUT", &output.stdout), ("STDERR", &output.stderr)] {
        if !bytes.is_empty() {
            append(
                "INDEXER",
                &format!("  {}:\n{}", stream, String::from_utf8_lossy(bytes)),
            );
        }
    }
}

/// Console spinner for a long-running step
///
/// Hidden when verbose output is on. Dropping the guard clears the line.
#[derive(Debug)]
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        if get_verbosity() > 0 {
            return Spinner { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(TICKS)
            .template("{spinner:.cyan} {msg}")
        {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.set_message(message.to_string());
        Spinner { bar: Some(bar) }
    }

    pub fn success(mut self, message: &str) {
        self.clear();
        append("PLUGIX", &format!("SUCCESS {}", message));
        eprintln!("{} {}", "✔".green().bold(), message);
    }

    pub fn fail(mut self, message: &str) {
        self.clear();
        append("PLUGIX", &format!("ERROR {}", message));
        eprintln!("  {} {}", "✗".red().bold(), message);
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_receives_messages() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };

        assert!(init_in_dir(0, temp_dir.path()).is_ok());
        assert_eq!(log_path(), Some(temp_dir.path().join(LOG_FILE_NAME)));
        debug("resolving readers/foo");
        if let Ok(output) = std::process::Command::new("true").output() {
            capture_output("fake-indexer", &output);
        }
        Spinner::start("Rebuilding plugin registry...").fail("Indexer failed");

        let content = fs::read_to_string(temp_dir.path().join(LOG_FILE_NAME)).unwrap_or_default();
        assert!(content.contains("DEBUG resolving readers/foo"));
        assert!(content.contains("[INDEXER] COMMAND: fake-indexer"));
        assert!(content.contains("ERROR Indexer failed"));
        assert_eq!(verbosity_to_filter(), "warn");
    }

    #[test]
    fn test_console_thresholds() {
        assert_eq!(Level::Debug.console_threshold(), 1);
        assert_eq!(Level::Warn.console_threshold(), 0);
        assert!(Level::Info.prefix().is_none());
    }
}
