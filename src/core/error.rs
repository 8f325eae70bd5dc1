//! Error taxonomy for repository operations.
//!
//! Every store, cascade and explorer operation yields either a result or
//! exactly one of these four kinds.

use thiserror::Error;

use crate::domain::EntityKind;

/// Result alias for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Repository errors
#[derive(Debug, Clone, Error)]
pub enum RepoError {
    /// Missing or invalid required input
    #[error("{0}")]
    Validation(String),

    /// No entity matches the identifier
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Identifier fits neither the native nor the legacy form
    #[error("malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    /// Underlying persistence call failed
    #[error("storage failure: {0}")]
    Storage(String),
}

impl RepoError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        RepoError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RepoError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound { .. })
    }

    /// HTTP status the calling transport should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            RepoError::Validation(_) | RepoError::MalformedIdentifier(_) => 400,
            RepoError::NotFound { .. } => 404,
            RepoError::Storage(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(e: rusqlite::Error) -> Self {
        RepoError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RepoError::validation("title is required").status_code(), 400);
        assert_eq!(RepoError::MalformedIdentifier("x y".into()).status_code(), 400);
        assert_eq!(RepoError::not_found(EntityKind::Lesson, "abc").status_code(), 404);
        assert_eq!(RepoError::Storage("disk I/O error".into()).status_code(), 500);
    }

    #[test]
    fn test_not_found_message() {
        let err = RepoError::not_found(EntityKind::Course, "old-1");
        assert_eq!(err.to_string(), "course not found: old-1");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_rusqlite_is_storage() {
        let err: RepoError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepoError::Storage(_)));
    }
}
