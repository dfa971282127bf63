//! Errors produced by broker/backend transports.

use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors at the broker/backend transport boundary.
///
/// Transport-specific errors (`redis::RedisError`, `lapin::Error`) are
/// folded into [`BrokerError::ConnectionLost`] or [`BrokerError::Protocol`]
/// at the transport, never leaked through the port trait signature.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("broker is blocked")]
    Blocked,

    #[error("consumer is empty")]
    ConsumerEmpty,

    #[error("operation timed out")]
    Timeout,

    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl BrokerError {
    #[must_use]
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost(message.into())
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// True for errors a caller may reasonably retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BrokerError::ConnectionLost(_) | BrokerError::Blocked | BrokerError::Timeout
        )
    }
}

impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        if err.kind() == redis::ErrorKind::IoError {
            BrokerError::connection_lost(err.to_string())
        } else {
            BrokerError::protocol(err.to_string())
        }
    }
}

impl From<lapin::Error> for BrokerError {
    fn from(err: lapin::Error) -> Self {
        // lapin folds IO/protocol failures into its top-level `Error`; we
        // can't downcast to a specific transport-vs-protocol split without
        // matching its internal variants, so treat every channel/connection
        // failure as recoverable and let the caller's retry policy decide.
        BrokerError::connection_lost(err.to_string())
    }
}

impl From<relayq_core::CodecError> for BrokerError {
    fn from(err: relayq_core::CodecError) -> Self {
        BrokerError::protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_recoverable_for_connection_and_timeout() {
        assert!(BrokerError::connection_lost("closed").is_recoverable());
        assert!(BrokerError::Timeout.is_recoverable());
        assert!(BrokerError::Blocked.is_recoverable());
    }

    #[test]
    fn protocol_errors_are_not_recoverable() {
        assert!(!BrokerError::protocol("bad frame").is_recoverable());
        assert!(!BrokerError::ConsumerEmpty.is_recoverable());
    }

    #[test]
    fn display_strings() {
        assert_eq!(
            BrokerError::connection_lost("reset").to_string(),
            "connection lost: reset"
        );
        assert_eq!(BrokerError::Blocked.to_string(), "broker is blocked");
        assert_eq!(BrokerError::Timeout.to_string(), "operation timed out");
    }
}
