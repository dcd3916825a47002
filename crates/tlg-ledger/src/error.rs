use std::fmt;

use serde::Serialize;
use tlg_store::{Precondition, StoreError};
use tlg_types::TypeError;

/// Stable, machine-readable error category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AllocationExhausted,
    NotFound,
    InvalidTransition,
    ValidationError,
    IntegrityViolation,
    Conflict,
    Storage,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationExhausted => "ALLOCATION_EXHAUSTED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::IntegrityViolation => "INTEGRITY_VIOLATION",
            Self::Conflict => "CONFLICT",
            Self::Storage => "STORAGE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why the state machine refused an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionCode {
    AlreadyFinalized,
    AlreadyVoided,
    RecordVoided,
    RecordNotFinalized,
    CurrentRevisionOpen,
    RevisionNotCurrent,
    RevisionNotFinalized,
    NotAnAmendment,
    BaseImmutable,
}

impl TransitionCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyFinalized => "ALREADY_FINALIZED",
            Self::AlreadyVoided => "ALREADY_VOIDED",
            Self::RecordVoided => "RECORD_VOIDED",
            Self::RecordNotFinalized => "RECORD_NOT_FINALIZED",
            Self::CurrentRevisionOpen => "CURRENT_REVISION_OPEN",
            Self::RevisionNotCurrent => "REVISION_NOT_CURRENT",
            Self::RevisionNotFinalized => "REVISION_NOT_FINALIZED",
            Self::NotAnAmendment => "NOT_AN_AMENDMENT",
            Self::BaseImmutable => "BASE_IMMUTABLE",
        }
    }
}

impl fmt::Display for TransitionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors returned by ledger operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Group or sub-number space is used up. The caller must open a new
    /// thread (or base); retrying will not help.
    #[error("{what} exhausted (limit {limit})")]
    AllocationExhausted { what: &'static str, limit: u32 },

    /// Unresolved id, including soft-deleted threads.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid transition ({code}): {message}")]
    InvalidTransition {
        code: TransitionCode,
        message: String,
    },

    /// Input failed validation. Nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A recomputed hash or chain link disagrees with what is stored.
    #[error("integrity violation on record {record_id}: {detail}")]
    IntegrityViolation { record_id: String, detail: String },

    /// Lost an optimistic race, or ran out of allocation retries.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AllocationExhausted { .. } => ErrorKind::AllocationExhausted,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The most specific code: the transition code for refused transitions,
    /// the kind code otherwise.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { code, .. } => code.code(),
            other => other.kind().code(),
        }
    }

    /// Only races and storage hiccups are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Storage)
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn transition(code: TransitionCode, message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            StoreError::UniqueConflict { constraint } => {
                Self::Conflict(format!("uniqueness conflict on {constraint}"))
            }
            StoreError::PreconditionFailed(condition) => from_precondition(condition),
            StoreError::Exhausted { what, limit } => Self::AllocationExhausted { what, limit },
            StoreError::BaseAlreadyRegistered { portfolio, existing } => Self::transition(
                TransitionCode::BaseImmutable,
                format!("portfolio {portfolio} already uses base {existing}"),
            ),
            e @ (StoreError::Serialization(_) | StoreError::Io(_) | StoreError::LockPoisoned) => {
                Self::Storage(e.to_string())
            }
        }
    }
}

fn from_precondition(condition: Precondition) -> LedgerError {
    let message = condition.to_string();
    match condition {
        Precondition::AlreadyFinalized => {
            LedgerError::transition(TransitionCode::AlreadyFinalized, message)
        }
        Precondition::RecordVoided => {
            LedgerError::transition(TransitionCode::RecordVoided, message)
        }
        Precondition::RecordNotFinalized => {
            LedgerError::transition(TransitionCode::RecordNotFinalized, message)
        }
        Precondition::RevisionNotCurrent => {
            LedgerError::transition(TransitionCode::RevisionNotCurrent, message)
        }
        Precondition::CurrentRevisionOpen => {
            LedgerError::transition(TransitionCode::CurrentRevisionOpen, message)
        }
        Precondition::RevisionNotFinalized => {
            LedgerError::transition(TransitionCode::RevisionNotFinalized, message)
        }
        Precondition::DraftChanged | Precondition::RecordMoved => LedgerError::Conflict(message),
        Precondition::ThreadDeleted => LedgerError::NotFound {
            kind: "thread",
            id: "(soft-deleted)".to_string(),
        },
    }
}

impl From<TypeError> for LedgerError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_and_storage_retry() {
        assert!(LedgerError::Conflict("x".into()).is_retryable());
        assert!(LedgerError::Storage("x".into()).is_retryable());
        assert!(!LedgerError::Validation("x".into()).is_retryable());
        assert!(!LedgerError::transition(TransitionCode::AlreadyFinalized, "x").is_retryable());
        assert!(!LedgerError::AllocationExhausted { what: "groups", limit: 99 }.is_retryable());
        assert!(!LedgerError::not_found("record", "r1").is_retryable());
    }

    #[test]
    fn store_errors_map_to_kinds() {
        let lost: LedgerError =
            StoreError::PreconditionFailed(Precondition::AlreadyFinalized).into();
        assert_eq!(lost.code(), "ALREADY_FINALIZED");
        assert_eq!(lost.kind(), ErrorKind::InvalidTransition);

        let raced: LedgerError = StoreError::PreconditionFailed(Precondition::DraftChanged).into();
        assert_eq!(raced.kind(), ErrorKind::Conflict);

        let taken: LedgerError = StoreError::UniqueConflict { constraint: "thread sub" }.into();
        assert_eq!(taken.kind(), ErrorKind::Conflict);

        let full: LedgerError = StoreError::Exhausted { what: "sub-numbers", limit: 999 }.into();
        assert_eq!(full.code(), "ALLOCATION_EXHAUSTED");

        let gone: LedgerError = StoreError::PreconditionFailed(Precondition::ThreadDeleted).into();
        assert_eq!(gone.kind(), ErrorKind::NotFound);

        assert_eq!(
            LedgerError::from(StoreError::LockPoisoned).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn kinds_serialize_as_codes() {
        assert_eq!(
            serde_json::to_value(ErrorKind::AllocationExhausted).unwrap(),
            serde_json::json!("ALLOCATION_EXHAUSTED")
        );
        assert_eq!(
            serde_json::to_value(TransitionCode::AlreadyFinalized).unwrap(),
            serde_json::json!(TransitionCode::AlreadyFinalized.code())
        );
    }
}
