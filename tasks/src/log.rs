//! Logging facade.
//!
//! Hosts log through [`log_error`] .. [`log_verbose`] and adjust output at
//! runtime: logging can be switched off, the minimum level changed, and the
//! destination file swapped or exported. Everything is built on `tracing`;
//! [`init`] installs the global subscriber.

use crate::error::{Result, TasksError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::{
    filter::LevelFilter, fmt::MakeWriter, prelude::*, reload, EnvFilter, Registry,
};

/// Target of every event emitted through this facade.
pub const LOG_TARGET: &str = "quickstart_tasks";

/// Severity of a log message. `Verbose` maps to `TRACE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum LogLevel {
    Error = 1,
    Warning = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Verbose = 5,
}

impl LogLevel {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(LogLevel::Error),
            2 => Some(LogLevel::Warning),
            3 => Some(LogLevel::Info),
            4 => Some(LogLevel::Debug),
            5 => Some(LogLevel::Verbose),
            _ => None,
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Verbose => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = TasksError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "verbose" | "trace" => Ok(LogLevel::Verbose),
            other => Err(TasksError::InvalidArgument(format!(
                "unknown log level {:?}",
                other
            ))),
        }
    }
}

pub fn log_error(message: impl AsRef<str>) {
    tracing::error!(target: LOG_TARGET, "{}", message.as_ref());
}

pub fn log_warning(message: impl AsRef<str>) {
    tracing::warn!(target: LOG_TARGET, "{}", message.as_ref());
}

pub fn log_info(message: impl AsRef<str>) {
    tracing::info!(target: LOG_TARGET, "{}", message.as_ref());
}

pub fn log_debug(message: impl AsRef<str>) {
    tracing::debug!(target: LOG_TARGET, "{}", message.as_ref());
}

pub fn log_verbose(message: impl AsRef<str>) {
    tracing::trace!(target: LOG_TARGET, "{}", message.as_ref());
}

/// Log a message at a runtime-chosen level.
pub fn log(level: LogLevel, message: impl AsRef<str>) {
    match level {
        LogLevel::Error => log_error(message),
        LogLevel::Warning => log_warning(message),
        LogLevel::Info => log_info(message),
        LogLevel::Debug => log_debug(message),
        LogLevel::Verbose => log_verbose(message),
    }
}

/// Options for [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub enabled: bool,
    /// Append log lines to this file.
    pub file: Option<PathBuf>,
    /// Write to stderr while no file is set. When false, output without a
    /// file is discarded.
    pub stderr: bool,
    /// Also honour `RUST_LOG` directives.
    pub env_filter: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            enabled: true,
            file: None,
            stderr: true,
            env_filter: false,
        }
    }
}

enum Sink {
    File { path: PathBuf, file: File },
    Stderr,
    Discard,
}

impl Sink {
    fn fallback(stderr: bool) -> Self {
        if stderr {
            Sink::Stderr
        } else {
            Sink::Discard
        }
    }

    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                TasksError::Log(format!("cannot open log file {}: {}", path.display(), e))
            })?;
        Ok(Sink::File {
            path: path.to_path_buf(),
            file,
        })
    }
}

/// Writer handed to the fmt layer; every event goes to whatever sink is
/// current when it is written.
#[derive(Clone)]
struct LogWriter {
    sink: Arc<Mutex<Sink>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.sink.lock() {
            Sink::File { file, .. } => file.write(buf),
            Sink::Stderr => io::stderr().write(buf),
            Sink::Discard => Ok(buf.len()),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match &mut *self.sink.lock() {
            Sink::File { file, .. } => file.write_all(buf),
            Sink::Stderr => io::stderr().write_all(buf),
            Sink::Discard => Ok(()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.sink.lock() {
            Sink::File { file, .. } => file.flush(),
            Sink::Stderr => io::stderr().flush(),
            Sink::Discard => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct LogState {
    filter: reload::Handle<LevelFilter, Registry>,
    sink: Arc<Mutex<Sink>>,
    stderr: bool,
    enabled: AtomicBool,
    level: Mutex<LogLevel>,
}

impl LogState {
    fn refresh_filter(&self) {
        let filter = if self.enabled.load(Ordering::SeqCst) {
            self.level.lock().level_filter()
        } else {
            LevelFilter::OFF
        };
        // Only fails once the subscriber is gone, and then there is nothing
        // left to filter.
        let _ = self.filter.reload(filter);
    }
}

static STATE: OnceLock<LogState> = OnceLock::new();
static INIT: Mutex<()> = parking_lot::const_mutex(());

/// Install the global subscriber. Calling it again reapplies the level,
/// enabled flag and file of `config` to the existing subscriber.
pub fn init(config: LogConfig) -> Result<()> {
    let _guard = INIT.lock();

    if let Some(state) = STATE.get() {
        *state.level.lock() = config.level;
        state.enabled.store(config.enabled, Ordering::SeqCst);
        state.refresh_filter();
        *state.sink.lock() = match &config.file {
            Some(path) => Sink::open(path)?,
            None => Sink::fallback(state.stderr),
        };
        return Ok(());
    }

    let sink = match &config.file {
        Some(path) => Sink::open(path)?,
        None => Sink::fallback(config.stderr),
    };
    let sink = Arc::new(Mutex::new(sink));

    let initial = if config.enabled {
        config.level.level_filter()
    } else {
        LevelFilter::OFF
    };
    let (level_layer, filter) = reload::Layer::new(initial);
    let env_filter = config.env_filter.then(|| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"))
    });

    tracing_subscriber::registry()
        .with(level_layer)
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(LogWriter { sink: sink.clone() }),
        )
        .try_init()
        .map_err(|e| TasksError::Log(e.to_string()))?;

    let _ = STATE.set(LogState {
        filter,
        sink,
        stderr: config.stderr,
        enabled: AtomicBool::new(config.enabled),
        level: Mutex::new(config.level),
    });
    Ok(())
}

pub fn is_initialized() -> bool {
    STATE.get().is_some()
}

pub fn get_logging_enabled() -> bool {
    STATE
        .get()
        .map(|state| state.enabled.load(Ordering::SeqCst))
        .unwrap_or_else(|| LogConfig::default().enabled)
}

pub fn set_logging_enabled(enabled: bool) {
    if let Some(state) = STATE.get() {
        state.enabled.store(enabled, Ordering::SeqCst);
        state.refresh_filter();
    }
}

pub fn get_minimum_log_level() -> LogLevel {
    STATE
        .get()
        .map(|state| *state.level.lock())
        .unwrap_or_default()
}

pub fn set_minimum_log_level(level: LogLevel) {
    if let Some(state) = STATE.get() {
        *state.level.lock() = level;
        state.refresh_filter();
    }
}

/// Send log output to `path`, appending to it if it exists.
pub fn set_log_file(path: impl AsRef<Path>) -> Result<()> {
    match STATE.get() {
        Some(state) => {
            let sink = Sink::open(path.as_ref())?;
            *state.sink.lock() = sink;
            Ok(())
        }
        None => Ok(()),
    }
}

/// Stop writing to the log file.
pub fn disable_log_file() {
    if let Some(state) = STATE.get() {
        *state.sink.lock() = Sink::fallback(state.stderr);
    }
}

/// The file log output currently goes to.
pub fn log_file() -> Option<PathBuf> {
    let state = STATE.get()?;
    let sink = state.sink.lock();
    match &*sink {
        Sink::File { path, .. } => Some(path.clone()),
        _ => None,
    }
}

/// Copy the active log file to `destination`. Returns the bytes copied.
pub fn export_log(destination: impl AsRef<Path>) -> Result<u64> {
    let state = STATE
        .get()
        .ok_or_else(|| TasksError::Log("logging has not been initialized".into()))?;

    let source = {
        let mut sink = state.sink.lock();
        match &mut *sink {
            Sink::File { path, file } => {
                file.flush()
                    .map_err(|e| TasksError::Log(format!("cannot flush log file: {}", e)))?;
                path.clone()
            }
            _ => return Err(TasksError::Log("no log file is active".into())),
        }
    };

    let destination = destination.as_ref();
    fs::copy(&source, destination).map_err(|e| {
        TasksError::Log(format!(
            "cannot export log to {}: {}",
            destination.display(),
            e
        ))
    })
}
