//! Layered error definitions
//!
//! Categorized by source: config / admission / io

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for configuration and IO failures
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Why an admission was turned away.
///
/// Rejections are never fatal: nothing inside the synchronizer changes and the
/// caller decides whether to log, drop or retry the item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Window size is zero (never configured, or configured degenerate)
    #[error("synchronizer is not configured (window size is zero)")]
    NotConfigured,

    /// Timestamp lies below the lateness floor
    #[error("timestamp {timestamp} is below the lateness floor {lateness}")]
    BeforeLateness { timestamp: u64, lateness: u64 },

    /// Stream identifier was never registered
    #[error("stream '{stream}' is not registered")]
    UnknownStream { stream: String },

    /// Per-stream capacity policy refused the item
    #[error("buffer for stream '{stream}' is full ({capacity} items)")]
    BufferFull { stream: String, capacity: usize },
}

impl RejectReason {
    /// Short static label (used for metrics)
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::BeforeLateness { .. } => "before_lateness",
            Self::UnknownStream { .. } => "unknown_stream",
            Self::BufferFull { .. } => "buffer_full",
        }
    }
}

/// A rejected admission.
///
/// Hands the item back to the caller together with the reason, so a rejected
/// payload is never lost inside the synchronizer.
#[derive(Error)]
#[error("admission rejected: {reason}")]
pub struct Rejected<T> {
    /// The item that was not admitted
    pub item: T,
    /// Why it was rejected
    #[source]
    pub reason: RejectReason,
}

impl<T> Rejected<T> {
    pub fn new(item: T, reason: RejectReason) -> Self {
        Self { item, reason }
    }

    /// Drop the payload, keep the reason
    pub fn into_reason(self) -> RejectReason {
        self.reason
    }

    /// Take the payload back
    pub fn into_item(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}
