//! Codec-boundary error types.

use thiserror::Error;

/// Errors produced while encoding or decoding the wire envelope.
///
/// Each legacy-protocol violation gets its own variant so callers can
/// distinguish "wrong content type" from "wrong body encoding" without
/// string matching, matching the error-kind surface in the embedding
/// contract.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("unsupported content encoding: {0}")]
    UnsupportedContentEncoding(String),

    #[error("unsupported body encoding: {0}")]
    UnsupportedBodyEncoding(String),

    #[error("malformed task body: {0}")]
    MalformedBody(String),

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("json (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// True if this is a happy-path protocol violation that the worker
    /// loop should log-and-ack rather than crash on.
    #[must_use]
    pub fn is_protocol_invalid(&self) -> bool {
        matches!(
            self,
            CodecError::UnsupportedContentType(_)
                | CodecError::UnsupportedContentEncoding(_)
                | CodecError::UnsupportedBodyEncoding(_)
                | CodecError::MalformedBody(_)
        )
    }
}

/// Errors produced while layering and deserializing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Layering(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported_content_type() {
        let err = CodecError::UnsupportedContentType("text/plain".to_string());
        assert_eq!(
            err.to_string(),
            "unsupported content type: text/plain"
        );
    }

    #[test]
    fn display_malformed_body() {
        let err = CodecError::MalformedBody("args missing".to_string());
        assert_eq!(err.to_string(), "malformed task body: args missing");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json}").unwrap_err();
        let err: CodecError = json_err.into();
        assert!(matches!(err, CodecError::Json(_)));
    }
}
