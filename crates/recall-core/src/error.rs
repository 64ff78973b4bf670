//! Error kinds shared by every store, archive, and pipeline operation.

use thiserror::Error;

/// Convenience alias used throughout the core and the application crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by Recall operations.
///
/// `InvalidInput` and `NotFound` are caller mistakes and are never retried
/// internally. `Storage` covers I/O and transactional failures of the
/// controlling operation. `Provider` is any embedding failure.
/// `PartialFailure` wraps the error that stopped a multi-fragment ingestion
/// together with the ids already committed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage fault: {0}")]
    Storage(String),

    #[error("embedding provider fault: {0}")]
    Provider(String),

    #[error("ingestion stopped after {} of {total} fragments: {source}", committed.len())]
    PartialFailure {
        /// Document ids written before the failure, in fragment order.
        committed: Vec<String>,
        /// Number of fragments the ingestion intended to write.
        total: usize,
        #[source]
        source: Box<Error>,
    },
}

/// Fieldless discriminant of [`Error`] for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Storage,
    Provider,
    PartialFailure,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Provider(_) => ErrorKind::Provider,
            Error::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }

    /// Wrap any displayable failure as a [`Error::Storage`] with context.
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Storage(format!("{}: {}", context, err))
    }

    /// Ids committed before a partial ingestion failure; empty for other kinds.
    pub fn committed_ids(&self) -> &[String] {
        match self {
            Error::PartialFailure { committed, .. } => committed,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(format!("serialization: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_reports_progress() {
        let err = Error::PartialFailure {
            committed: vec!["a".into(), "b".into()],
            total: 5,
            source: Box::new(Error::Provider("timeout".into())),
        };
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
        assert_eq!(err.committed_ids(), ["a", "b"]);
        let msg = err.to_string();
        assert!(msg.contains("2 of 5"), "unexpected message: {}", msg);
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_committed_ids_empty_for_other_kinds() {
        assert!(Error::NotFound("x".into()).committed_ids().is_empty());
    }
}
