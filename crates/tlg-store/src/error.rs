use std::fmt;

/// A conditional update whose condition did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The revision already carries `finalized_at`.
    AlreadyFinalized,
    /// The draft was updated after the caller read it.
    DraftChanged,
    /// The record is voided.
    RecordVoided,
    /// The record is not in the finalized state.
    RecordNotFinalized,
    /// The revision is not the record's current revision.
    RevisionNotCurrent,
    /// The record's current revision has not been finalized.
    CurrentRevisionOpen,
    /// The revision has not been finalized.
    RevisionNotFinalized,
    /// The record is no longer on the thread the caller expected.
    RecordMoved,
    /// The thread has been soft-deleted.
    ThreadDeleted,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AlreadyFinalized => "revision already finalized",
            Self::DraftChanged => "draft changed concurrently",
            Self::RecordVoided => "record is voided",
            Self::RecordNotFinalized => "record is not finalized",
            Self::RevisionNotCurrent => "revision is not the current revision",
            Self::CurrentRevisionOpen => "current revision is not finalized",
            Self::RevisionNotFinalized => "revision is not finalized",
            Self::RecordMoved => "record moved to another thread",
            Self::ThreadDeleted => "thread is deleted",
        };
        f.write_str(text)
    }
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested row does not exist (or is soft-deleted, for threads).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An insert or move collided with a uniqueness constraint.
    #[error("uniqueness conflict on {constraint}")]
    UniqueConflict { constraint: &'static str },

    /// A conditional update's condition did not hold; nothing was written.
    #[error("precondition failed: {0}")]
    PreconditionFailed(Precondition),

    /// A counter reached its ceiling; nothing was written.
    #[error("{what} exhausted at {limit}")]
    Exhausted { what: &'static str, limit: u32 },

    /// The portfolio already has a different base registered.
    #[error("portfolio {portfolio} already uses base {existing}")]
    BaseAlreadyRegistered { portfolio: String, existing: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
