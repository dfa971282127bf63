//! # Client Error Types
//!
//! Unified error handling for submission and result-retrieval operations.

use relayq_broker::BrokerError;
use relayq_core::CodecError;
use thiserror::Error;

/// Client operation result type.
pub type ClientResult<T> = Result<T, ClientError>;

/// Comprehensive error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("backend error: {0}")]
    Backend(BrokerError),

    #[error("timed out waiting for result")]
    Timeout,

    #[error("task failed with status {status}")]
    ResultFailure { status: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ClientError {
    /// Wraps a [`BrokerError`] raised from a backend operation, as opposed
    /// to a broker operation (both variants carry the same underlying
    /// type, so the call site disambiguates).
    #[must_use]
    pub fn backend(error: BrokerError) -> Self {
        Self::Backend(error)
    }

    #[must_use]
    pub fn result_failure(status: impl Into<String>) -> Self {
        Self::ResultFailure {
            status: status.into(),
        }
    }

    /// True if the error is worth retrying.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Broker(err) | ClientError::Backend(err) => err.is_recoverable(),
            ClientError::Timeout => true,
            ClientError::ResultFailure { .. } | ClientError::Codec(_) => false,
        }
    }
}
