//! # Logging Utilities
//!
//! Logging infrastructure for dwarfscope using `tracing`.
//!
//! Console output goes to **stderr**: stdout carries the JSON and listings the
//! CLI prints, and log lines must never end up mixed into them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dwarfscope_utils::init_logging;
//!
//! // Reads RUST_LOG, DWARFSCOPE_LOG_FORMAT and DWARFSCOPE_LOG_FILE
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! The returned [`LogGuard`] flushes the file writer when dropped; keep it
//! alive until the program exits.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=dwarfscope_core=trace`)
//! - `DWARFSCOPE_LOG_LEVEL`: Fixed level, taking precedence over `RUST_LOG`
//! - `DWARFSCOPE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `DWARFSCOPE_LOG_FILE`: Also write logs to this file; a directory gets a
//!   dated file name

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "DWARFSCOPE_LOG_FORMAT";
/// Environment variable naming an additional log file.
pub const LOG_FILE_ENV: &str = "DWARFSCOPE_LOG_FILE";
/// Environment variable forcing a level, overriding `RUST_LOG`.
pub const LOG_LEVEL_ENV: &str = "DWARFSCOPE_LOG_LEVEL";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    /// Most verbose; includes one event per debug entry
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Keeps the background file writer alive; dropping it flushes pending lines.
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard
{
    _file: Option<WorkerGuard>,
}

/// Resolved logging settings
///
/// Filter priority: an explicit `level`, then `RUST_LOG`, then `WARN`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig
{
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Settings from the `DWARFSCOPE_LOG_*` variables.
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::InvalidFormat`] or [`LoggingError::InvalidLevel`]
    /// for unknown names.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        let format = match env::var(LOG_FORMAT_ENV) {
            Ok(value) => LogFormat::from_str(&value).map_err(LoggingError::InvalidFormat)?,
            Err(_) => LogFormat::default(),
        };
        let level = match env::var(LOG_LEVEL_ENV) {
            Ok(value) => Some(LogLevel::from_str(&value).map_err(LoggingError::InvalidLevel)?),
            Err(_) => None,
        };
        let file = env::var_os(LOG_FILE_ENV).map(PathBuf::from);
        Ok(Self {
            level,
            format,
            file,
        })
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self
    {
        if level.is_some() {
            self.level = level;
        }
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: Option<PathBuf>) -> Self
    {
        if file.is_some() {
            self.file = file;
        }
        self
    }

    fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            EnvFilter::new(Level::from(level).to_string())
        } else if let Ok(rust_log) = env::var("RUST_LOG") {
            EnvFilter::try_new(&rust_log).unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
        } else {
            EnvFilter::new(Level::WARN.to_string())
        }
    }

    /// Install the global subscriber.
    ///
    /// ## Errors
    ///
    /// Fails if a subscriber is already installed or the log file directory
    /// cannot be created.
    pub fn init(&self) -> Result<LogGuard, LoggingError>
    {
        let mut layers: Vec<BoxedLayer> = vec![self.console_layer()];
        let mut guard = LogGuard::default();

        if let Some(path) = &self.file {
            let path = resolve_log_file(path);
            let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggingError::InitializationFailed(format!("{} is not a file path", path.display())))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard._file = Some(file_guard);

            let layer: BoxedLayer = match self.format {
                LogFormat::Pretty => fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_filter(self.filter())
                    .boxed(),
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(self.filter())
                    .boxed(),
            };
            layers.push(layer);
        }

        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
        Ok(guard)
    }

    fn console_layer(&self) -> BoxedLayer
    {
        match self.format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_writer(io::stderr)
                .with_filter(self.filter())
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(io::stderr)
                .with_filter(self.filter())
                .boxed(),
        }
    }
}

/// A directory gets a dated file name inside it; anything else is used as is.
fn resolve_log_file(path: &Path) -> PathBuf
{
    if path.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        path.join(format!("{today}-dwarfscope.log"))
    } else {
        path.to_path_buf()
    }
}

/// Initialize logging from the environment
///
/// ## Errors
///
/// Returns an error if logging is already initialized, the format variable
/// is invalid, or the log file cannot be created.
pub fn init_logging() -> Result<LogGuard, LoggingError>
{
    LogConfig::from_env()?.init()
}

/// Initialize logging with an explicit level and format; `DWARFSCOPE_LOG_FILE`
/// is still honoured.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LogGuard, LoggingError>
{
    LogConfig {
        level: Some(level),
        format,
        file: env::var_os(LOG_FILE_ENV).map(PathBuf::from),
    }
    .init()
}

/// Initialize logging to stderr and to `path`
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_to_file(path: impl Into<PathBuf>, level: Option<LogLevel>) -> Result<LogGuard, LoggingError>
{
    LogConfig::from_env()?
        .with_level(level)
        .with_file(Some(path.into()))
        .init()
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
