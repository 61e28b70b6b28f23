//! Error types for the monitoring core.
//!
//! Store failures, admin policy rejections and empty lookups each get their
//! own variant so the command layer can phrase a reply without string
//! matching.

use crate::db::DbError;
use std::fmt;
use thiserror::Error;

/// Why an admin transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    /// The channel is not eligible and runtime addition is switched off.
    RuntimeAddDisabled,
    /// The channel is not eligible, so it cannot be switched on or off.
    NotEligible,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuntimeAddDisabled => f.write_str("runtime channel addition is disabled"),
            Self::NotEligible => f.write_str("channel is not eligible for monitoring"),
        }
    }
}

/// Errors surfaced by the monitoring core.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] DbError),

    /// Carries the sorted eligible set so the caller can list alternatives.
    #[error("{channel}: {reason}")]
    PolicyRejected {
        channel: String,
        reason: PolicyViolation,
        eligible: Vec<String>,
    },

    #[error("no stats for {user} in {channel}")]
    NotFound { channel: String, user: String },

    #[error("invalid channel name: {0}")]
    InvalidChannel(String),
}

impl MonitorError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::PolicyRejected { .. } => "policy_rejected",
            Self::NotFound { .. } => "not_found",
            Self::InvalidChannel(_) => "invalid_channel",
        }
    }

    /// Whether this is an expected outcome rather than a fault.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        MonitorError::StoreUnavailable(DbError::from(err))
    }
}

/// Result type for monitoring operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
