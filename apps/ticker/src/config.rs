use config::{Config, Environment, File};
use serde::Deserialize;
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;
use tickbus_events::BusConfig;
use tracing::info;

/// Prefix of environment overrides, e.g. `TICKBUS__BUS__DRAIN_BUDGET_MS=8`.
pub const ENV_PREFIX: &str = "TICKBUS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config {
        #[source]
        source: config::ConfigError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Invalid ticker configuration{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

/// Settings of the driving loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub bus: BusConfig,
    /// Delay between two ticks, in milliseconds.
    pub tick_interval_ms: u64,
    /// Number of ticks to run. `0` runs until interrupted.
    pub ticks: u64,
    /// Background threads publishing events concurrently with the loop.
    pub publishers: usize,
    pub events_per_publisher: usize,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            tick_interval_ms: 16,
            ticks: 0,
            publishers: 2,
            events_per_publisher: 500,
        }
    }
}

impl TickerConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero tick interval or a rejected bus section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "tick_interval_ms must be greater than zero".into(),
                context: None,
            });
        }
        self.bus.validate().map_err(|e| ConfigError::Invalid {
            message: e.to_string().into(),
            context: Some("bus".into()),
        })
    }
}

/// Loads the ticker configuration.
///
/// Sources, lowest precedence first:
/// 1. Built-in defaults.
/// 2. The file at `path`, if given. Its format follows the extension (`.toml`, `.json`, ...).
/// 3. Environment variables prefixed with `TICKBUS__`, nested with `__`.
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file is missing or malformed, and
/// [`ConfigError::Invalid`] if the merged values fail validation.
pub fn load_config(path: Option<&Path>) -> Result<TickerConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        info!("Loading config from {}", path.display());
        builder = builder.add_source(File::from(path).required(true));
    }

    let cfg = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()
        .and_then(|c| c.try_deserialize::<TickerConfig>())
        .map_err(|source| ConfigError::Config { source, context: None })?;

    cfg.validate()?;
    Ok(cfg)
}
