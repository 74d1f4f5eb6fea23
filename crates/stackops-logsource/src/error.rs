//! Normalized errors for log source operations.
//!
//! Provider details (curl exit codes, journalctl stderr) are folded into a
//! small set of categories the viewer can act on.

use thiserror::Error;

/// Error returned by a [`LogSource`](crate::source::LogSource) fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogSourceError {
    /// The container or unit does not exist.
    #[error("log target {target:?} not found")]
    NotFound { target: String },

    /// The provider did not answer within the fetch timeout.
    #[error("fetching logs for {target:?} timed out after {after_ms}ms")]
    Timeout { target: String, after_ms: u64 },

    /// The provider could not be reached or exited with an error.
    #[error("log provider unavailable: {message}")]
    Unavailable { message: String },

    /// A pagination token could not be translated into a provider query.
    #[error("invalid pagination token {token:?}")]
    InvalidToken { token: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl LogSourceError {
    /// Whether retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::LogSourceError;

    #[test]
    fn transient_classification() {
        assert!(LogSourceError::Timeout {
            target: "web".into(),
            after_ms: 10
        }
        .is_transient());
        assert!(LogSourceError::Unavailable {
            message: "refused".into()
        }
        .is_transient());
        assert!(!LogSourceError::NotFound {
            target: "web".into()
        }
        .is_transient());
    }

    #[test]
    fn display_names_the_target() {
        let err = LogSourceError::Timeout {
            target: "container:web".into(),
            after_ms: 10_000,
        };
        assert_eq!(
            err.to_string(),
            "fetching logs for \"container:web\" timed out after 10000ms"
        );
    }
}
