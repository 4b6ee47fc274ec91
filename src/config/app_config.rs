use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{deserialize_duration_from_seconds, HttpRetryConfig};

/// Provides the default value for refresh_interval_secs.
fn default_refresh_interval() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for window_ceiling.
fn default_window_ceiling() -> usize {
    100_000
}

/// Provides the default value for event_channel_capacity.
fn default_event_channel_capacity() -> u32 {
    1024
}

/// Provides the default value for trigger_channel_capacity.
fn default_trigger_channel_capacity() -> u32 {
    256
}

/// Provides the default value for shutdown_timeout_secs.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Application configuration for Palisade.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite rule store.
    pub database_url: String,

    /// The interval at which the rule registry refreshes from storage.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_refresh_interval",
        rename = "refresh_interval_secs"
    )]
    pub refresh_interval: Duration,

    /// Per-rule window length ceiling; oldest entries are dropped beyond it.
    #[serde(default = "default_window_ceiling")]
    pub window_ceiling: usize,

    /// The capacity of the channel carrying ingested events.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: u32,

    /// The capacity of the channel carrying firing decisions to the emitter.
    #[serde(default = "default_trigger_channel_capacity")]
    pub trigger_channel_capacity: u32,

    /// The maximum time to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_timeout",
        rename = "shutdown_timeout_secs"
    )]
    pub shutdown_timeout: Duration,

    /// Retry policy for the webhook notification client.
    #[serde(default)]
    pub http_retry: HttpRetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://palisade.db".to_string(),
            refresh_interval: default_refresh_interval(),
            window_ceiling: default_window_ceiling(),
            event_channel_capacity: default_event_channel_capacity(),
            trigger_channel_capacity: default_trigger_channel_capacity(),
            shutdown_timeout: default_shutdown_timeout(),
            http_retry: HttpRetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the configuration
    /// directory, with `PALISADE__`-prefixed environment variable overrides.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{config_dir_str}/app.yaml")))
            .add_source(Environment::with_prefix("PALISADE").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
