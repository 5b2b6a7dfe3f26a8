//! Error types for the proctoring core.
//!
//! `SinkError` lives here rather than in `examguard-sinks` so the submission
//! pipeline can downcast and classify sink failures for retry decisions
//! without string matching.

use thiserror::Error;

/// Errors that can occur when delivering a result to a submission sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink rejected the payload (HTTP 4xx on a non-opaque channel).
    #[error("submission rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The sink answered with a server-side failure.
    #[error("sink error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    /// The request timed out.
    #[error("submission timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The sink is misconfigured (e.g. an invalid URL).
    #[error("sink misconfigured: {0}")]
    Misconfigured(String),
}

impl SinkError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SinkError::Rejected { .. } | SinkError::Misconfigured(_))
    }
}

/// Errors raised when activating a violation monitor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// A threshold of zero would end the exam before the first signal.
    #[error("violation threshold must be at least 1")]
    InvalidThreshold,
}

/// Errors raised by the session controller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The exam does not say how long it lasts.
    #[error("exam '{0}' has no duration configured")]
    MissingDuration(String),

    /// Sessions need an identifiable student.
    #[error("student name must not be empty")]
    MissingStudentName,

    /// A session is already running on this controller.
    #[error("a session is already active")]
    AlreadyActive,

    /// The operation needs an active session.
    #[error("no active session")]
    NoSession,

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("failed to persist session snapshot: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Reasons a persisted snapshot is discarded as corrupted.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("snapshot has no exam id")]
    MissingExamId,

    #[error("snapshot has no student name")]
    MissingStudentName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_sink_errors() {
        assert!(SinkError::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_permanent());
        assert!(SinkError::Misconfigured("no url".into()).is_permanent());
        assert!(!SinkError::Timeout(30).is_permanent());
        assert!(!SinkError::Network("reset".into()).is_permanent());
        assert!(!SinkError::Http {
            status: 503,
            message: String::new()
        }
        .is_permanent());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            SessionError::MissingDuration("math-101".into()).to_string(),
            "exam 'math-101' has no duration configured"
        );
        assert_eq!(
            MonitorError::InvalidThreshold.to_string(),
            "violation threshold must be at least 1"
        );
    }
}
