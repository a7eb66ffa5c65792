//! Error types for the pipeline tools.
//!
//! Library crates use [`OperatorCertError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics and a non-zero
//! exit status.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum OperatorCertError {
    /// Missing credential or invalid combination of inputs. Raised before
    /// any network call is attempted.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A dependency answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    /// The mirror service answered with a Twirp error envelope.
    #[error("rpc error ({code}): {message}")]
    Rpc { code: String, message: String },

    /// The index image build reached the `failed` state.
    #[error("IIB build {build_id} failed: {}", reason.as_deref().unwrap_or("no reason given"))]
    BuildFailed {
        build_id: u64,
        reason: Option<String>,
    },

    /// The index image build did not reach a terminal state in time.
    #[error("timed out after {}s waiting for IIB build {build_id}", waited.as_secs())]
    BuildTimedOut { build_id: u64, waited: Duration },

    /// Response or input document could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (malformed URL, bad flag value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OperatorCertError>;

impl OperatorCertError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = OperatorCertError::config("IBM_WEBHOOK_TOKEN is not set");
        assert_eq!(err.to_string(), "config error: IBM_WEBHOOK_TOKEN is not set");

        let err = OperatorCertError::Http {
            url: "https://iib.example.com/api/v1/builds/add".into(),
            status: 503,
            body: "unavailable".into(),
        };
        assert!(err.to_string().starts_with("HTTP 503 from"));
    }

    #[test]
    fn build_errors_are_distinct() {
        let failed = OperatorCertError::BuildFailed {
            build_id: 7,
            reason: Some("bundle not found".into()),
        };
        assert_eq!(failed.to_string(), "IIB build 7 failed: bundle not found");

        let failed = OperatorCertError::BuildFailed {
            build_id: 7,
            reason: None,
        };
        assert!(failed.to_string().contains("no reason given"));

        let timed_out = OperatorCertError::BuildTimedOut {
            build_id: 7,
            waited: Duration::from_secs(1800),
        };
        assert_eq!(
            timed_out.to_string(),
            "timed out after 1800s waiting for IIB build 7"
        );
    }
}
