use std::fmt;

use serde::{Deserialize, Serialize};

use crate::display::DisplayId;
use crate::ids::{IntegrityEntryId, PortfolioId, RecordId, ThreadId, UserId};
use crate::Timestamp;

/// Thread maintenance operation that moved records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOperation {
    Merge,
    Split,
    Reassign,
}

impl fmt::Display for MoveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Split => write!(f, "split"),
            Self::Reassign => write!(f, "reassign"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayIdChange {
    pub record_id: RecordId,
    pub before: DisplayId,
    pub after: DisplayId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveFailure {
    pub record_id: RecordId,
    pub code: String,
    pub message: String,
}

/// One summary row per merge, split, or reassign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityLogEntry {
    pub id: IntegrityEntryId,
    pub operation: MoveOperation,
    pub portfolio_id: PortfolioId,
    pub actor_id: UserId,
    pub acting_as_user_id: Option<UserId>,
    pub reason: String,
    pub target_thread_id: ThreadId,
    pub source_thread_ids: Vec<ThreadId>,
    pub moves: Vec<DisplayIdChange>,
    pub failures: Vec<MoveFailure>,
    pub at: Timestamp,
}
