//! # Logger
//!
//! Tracing subscriber bootstrap shared by the tickbus binaries.
//!
//! The bus itself only emits `tracing` events; this crate decides where they go: a compact
//! console layer, an optional rolling log file written through a non-blocking worker, and an
//! environment filter (`RUST_LOG` or a programmatic default).
//!
//! ## Example
//!
//! ```rust
//! # use tickbus_logger::{Logger, LevelFilter};
//!
//! let _logger = Logger::builder()
//!     .name("ticker")
//!     .level(LevelFilter::DEBUG)
//!     .env_filter("tickbus_events=trace")
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::LoggerError;
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 7;
const LOG_FILE_SUFFIX: &str = "log";

#[derive(Debug)]
struct LoggerConfig {
    console: bool,
    path: Option<PathBuf>,
    level: LevelFilter,
    rotation: Rotation,
    max_files: usize,
    json: bool,
    env_filter: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: true,
            path: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            env_filter: None,
        }
    }
}

/// Builder state before a name is given.
#[derive(Debug)]
pub struct Unnamed;
/// Builder state once [`LoggerBuilder::name`] was called.
#[derive(Debug)]
pub struct Named(String);

mod private {
    pub trait Sealed {}
}
impl private::Sealed for Unnamed {}
impl private::Sealed for Named {}

/// Configures and installs the global tracing subscriber.
///
/// A name is mandatory: it tags the file output, so [`LoggerBuilder::init`] only exists once
/// [`LoggerBuilder::name`] has been called.
#[derive(Debug)]
#[must_use = "the logger is not installed until you call .init()"]
pub struct LoggerBuilder<N: private::Sealed = Unnamed> {
    config: LoggerConfig,
    name: N,
    _state: PhantomData<N>,
}

impl LoggerBuilder<Unnamed> {
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<Named> {
        LoggerBuilder { config: self.config, name: Named(name.into()), _state: PhantomData }
    }
}

impl LoggerBuilder<Named> {
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Programmatic filter directives such as `tickbus_events=trace`.
    ///
    /// Overrides `RUST_LOG`. An unparsable filter makes [`LoggerBuilder::init`] fail.
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.env_filter = Some(filter.into());
        self
    }

    pub const fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Writes rolling log files into `dir`, named `<name>.<date>.log`.
    pub fn file(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.path = Some(dir.into());
        self
    }

    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.config.rotation = rotation;
        self
    }

    pub const fn max_files(mut self, max: usize) -> Self {
        self.config.max_files = max;
        self
    }

    /// Emits file output as JSON lines. The console layer stays human readable.
    pub const fn json(mut self, enabled: bool) -> Self {
        self.config.json = enabled;
        self
    }

    /// Installs the subscriber.
    ///
    /// The returned [`Logger`] owns the file writer's worker guard and must outlive all
    /// logging, or buffered lines are lost.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, zero `max_files`, an
    ///   unparsable filter, or no enabled output.
    /// * [`LoggerError::Appender`] if the log directory cannot be used.
    /// * [`LoggerError::Subscriber`] if a global subscriber is already installed.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let Named(name) = self.name;
        validate(&self.config, &name)?;
        let filter = build_env_filter(&self.config)?;

        let mut layers = Vec::new();
        if self.config.console {
            layers.push(layer().compact().with_target(true).boxed());
        }

        let guard = match &self.config.path {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| LoggerError::InvalidConfiguration {
                    message: e.to_string().into(),
                    context: Some(format!("creating {}", dir.display()).into()),
                })?;

                let appender = RollingFileAppender::builder()
                    .rotation(self.config.rotation.clone())
                    .filename_prefix(&name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(self.config.max_files)
                    .build(dir)
                    .map_err(|source| LoggerError::Appender { source, context: None })?;

                let (writer, guard) = tracing_appender::non_blocking(appender);
                let file_layer = layer().with_writer(writer).with_ansi(false);
                layers.push(if self.config.json {
                    file_layer.json().boxed()
                } else {
                    file_layer.boxed()
                });
                Some(guard)
            },
            None => None,
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "console and file output are both disabled".into(),
                context: None,
            });
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|source| LoggerError::Subscriber { source, context: None })?;

        tracing::debug!(logger = %name, "Logging initialised");
        Ok(Logger { name, guard })
    }
}

/// Handle to the installed logging pipeline.
#[must_use = "dropping the logger stops the background file writer"]
#[derive(Debug)]
pub struct Logger {
    name: String,
    guard: Option<WorkerGuard>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { config: LoggerConfig::default(), name: Unnamed, _state: PhantomData }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a file writer is attached.
    #[must_use]
    pub const fn has_file_output(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!(logger = %self.name, "Flushing log files");
        }
    }
}

fn validate(config: &LoggerConfig, name: &str) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration {
            message: "logger name cannot be empty".into(),
            context: None,
        });
    }
    if config.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: None,
        });
    }
    Ok(())
}

fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    match &config.env_filter {
        None => Ok(builder.from_env_lossy()),
        Some(directives) => {
            builder.parse(directives).map_err(|e| LoggerError::InvalidConfiguration {
                message: format!("invalid filter '{directives}': {e}").into(),
                context: None,
            })
        },
    }
}
