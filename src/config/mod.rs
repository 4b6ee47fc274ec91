//! Configuration module for Palisade.

mod app_config;
mod helpers;
mod http_retry;

pub use app_config::AppConfig;
pub use helpers::deserialize_duration_from_seconds;
pub use http_retry::{HttpRetryConfig, JitterSetting};
