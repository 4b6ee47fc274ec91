#![warn(missing_docs)]
//! Palisade is an alert rule evaluation engine for firewall log streams. It
//! matches incoming firewall events against persistent alert rules, counts
//! matches over sliding time windows, and fires at most one alert per rule per
//! cooldown period.

pub mod config;
pub mod engine;
pub mod http_client;
pub mod matcher;
pub mod models;
pub mod notification;
pub mod registry;
pub mod storage;
pub mod supervisor;
pub mod test_helpers;
