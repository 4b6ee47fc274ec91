//! This module contains the error types for the notification layer.

use thiserror::Error;

/// Errors that can occur while handing an alert to a transport.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The transport rejected or failed to deliver the notification.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),
}
