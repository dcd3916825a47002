use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::ids::{RecordId, RevisionId, UserId};
use crate::payload::Payload;
use crate::Timestamp;

/// Why a revision exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Initial,
    Amendment,
    Correction,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "INITIAL"),
            Self::Amendment => write!(f, "AMENDMENT"),
            Self::Correction => write!(f, "CORRECTION"),
        }
    }
}

/// Finalization state of a single revision object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionState {
    Unfinalized,
    Finalized,
}

/// One versioned snapshot of a record's payload.
///
/// `content_hash` and `finalized_at` are set together, exactly once. After
/// that the payload never changes. `parent_hash` is the previous version's
/// `content_hash` and is `None` for version 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceRevision {
    pub id: RevisionId,
    pub record_id: RecordId,
    pub version: u32,
    pub parent_revision_id: Option<RevisionId>,
    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub payload: Payload,
    pub content_hash: Option<ContentHash>,
    pub parent_hash: Option<ContentHash>,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub finalized_at: Option<Timestamp>,
    pub finalized_by: Option<UserId>,
    pub effective_at: Option<Timestamp>,
    /// Bumped on every draft update; finalize is conditional on it.
    #[serde(default)]
    pub draft_seq: u64,
}

impl GovernanceRevision {
    pub fn state(&self) -> RevisionState {
        if self.finalized_at.is_some() {
            RevisionState::Finalized
        } else {
            RevisionState::Unfinalized
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state() == RevisionState::Finalized
    }
}
