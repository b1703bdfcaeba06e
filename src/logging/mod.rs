//! Logging configuration and initialization
//!
//! The debug runtime reports through the `tracing` ecosystem. Benchmark
//! reports are emitted at INFO level, so a subscriber must be installed
//! (and must let INFO through) for `run_individual` output to be visible.
//! Console output goes to stderr; stdout is left to the caller.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., "info", "graph_runtime_debug=debug")
//! - `GRAPH_DEBUG_LOG_LEVEL`: Simple log level (error, warn, info, debug, trace)
//! - `GRAPH_DEBUG_LOG_FORMAT`: Output format ("human" or "json")
//! - `GRAPH_DEBUG_LOG_FILE`: Optional file path for log output (always JSON)

use once_cell::sync::OnceCell;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Global flag to track if tracing has been initialized
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

const LOG_LEVEL_ENV: &str = "GRAPH_DEBUG_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "GRAPH_DEBUG_LOG_FORMAT";
const LOG_FILE_ENV: &str = "GRAPH_DEBUG_LOG_FILE";

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Invalid filter directive
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// Failed to create log file directory
    #[error("failed to create log directory: {0}")]
    DirectoryCreationFailed(String),

    /// Failed to open log file
    #[error("failed to open log file: {0}")]
    FileOpenFailed(String),

    /// A global subscriber was already installed by someone else
    #[error("global subscriber already set: {0}")]
    AlreadySet(String),
}

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    /// Default: benchmark reports are INFO
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON structured output
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" | "console" => Some(LogFormat::Human),
            "json" | "structured" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include file/line in console output
    pub with_file_info: bool,
    /// Emit span close events (with busy/idle timings)
    pub with_span_events: bool,
    /// Additional JSON log file
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the `GRAPH_DEBUG_LOG_*` variables
    pub fn from_env() -> Self {
        let mut config = LoggingConfig::new();
        if let Some(level) = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|s| LogLevel::parse(&s))
        {
            config.level = level;
        }
        if let Some(format) = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| LogFormat::parse(&s))
        {
            config.format = format;
        }
        config.log_file = std::env::var(LOG_FILE_ENV).ok().map(PathBuf::from);
        config
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    pub fn with_span_events(mut self, with_span_events: bool) -> Self {
        self.with_span_events = with_span_events;
        self
    }

    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }
}

/// Initialize logging from the environment, ignoring failures.
///
/// Idempotent: only the first call installs a subscriber.
pub fn init_logging_default() {
    init_with_config(&LoggingConfig::from_env());
}

/// Initialize logging with a custom configuration.
///
/// Idempotent: only the first call installs a subscriber. Errors are
/// reported on stderr since no subscriber exists yet to log them.
pub fn init_with_config(config: &LoggingConfig) {
    TRACING_INITIALIZED.get_or_init(|| {
        if let Err(e) = try_init(config) {
            eprintln!("graph-runtime-debug: logging disabled: {e}");
        }
    });
}

fn try_init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_env_filter(config.level)?;
    let spans = if config.with_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::with_capacity(2);
    layers.push(match config.format {
        LogFormat::Human => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_span_events(spans.clone())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_span_events(spans.clone())
            .boxed(),
    });

    if let Some(path) = &config.log_file {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::sync::Mutex::new(open_log_file(path)?))
                .with_target(false)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_span_events(spans)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadySet(e.to_string()))
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| LoggingError::DirectoryCreationFailed(e.to_string()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggingError::FileOpenFailed(e.to_string()))
}

/// `RUST_LOG` wins over the configured level.
fn build_env_filter(default_level: LogLevel) -> Result<EnvFilter, LoggingError> {
    match std::env::var("RUST_LOG") {
        Ok(directives) => {
            EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
        }
        Err(_) => Ok(EnvFilter::new(default_level.as_filter_str())),
    }
}

/// Check if tracing has been initialized through this module
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}
