use std::fmt;

use serde::{Deserialize, Serialize};

use crate::display::DisplayId;
use crate::ids::{PortfolioId, RecordId, RevisionId, ThreadId, TrustId, UserId};
use crate::integrity::MoveOperation;
use crate::payload::ModuleType;
use crate::Timestamp;

/// Lifecycle status of a governance record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Draft,
    Finalized,
    /// Terminal. Nothing leaves this state.
    Voided,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Finalized => write!(f, "finalized"),
            Self::Voided => write!(f, "voided"),
        }
    }
}

/// Breadcrumb left on a record each time maintenance moves it between threads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMove {
    pub operation: MoveOperation,
    pub from_thread_id: ThreadId,
    pub from_display_id: DisplayId,
    pub to_thread_id: ThreadId,
    pub to_display_id: DisplayId,
    pub reason: String,
    pub moved_by: UserId,
    pub at: Timestamp,
}

/// A governance record filed under a ledger thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceRecord {
    pub id: RecordId,
    pub portfolio_id: PortfolioId,
    pub trust_id: TrustId,
    pub module_type: ModuleType,
    pub title: String,
    pub display_id: DisplayId,
    pub thread_id: ThreadId,
    pub sub: u32,
    pub status: RecordStatus,
    /// Latest revision, finalized or still open as a draft.
    pub current_revision_id: RevisionId,
    pub finalized_at: Option<Timestamp>,
    pub finalized_by: Option<UserId>,
    pub voided_at: Option<Timestamp>,
    pub voided_by: Option<UserId>,
    pub void_reason: Option<String>,
    pub created_by: UserId,
    pub created_at: Timestamp,
    #[serde(default)]
    pub merge_history: Vec<ThreadMove>,
}

impl GovernanceRecord {
    pub fn is_voided(&self) -> bool {
        self.status == RecordStatus::Voided
    }

    /// Whether `display_id` was ever assigned to this record.
    pub fn answers_to(&self, display_id: &DisplayId) -> bool {
        self.display_id == *display_id
            || self
                .merge_history
                .iter()
                .any(|m| m.from_display_id == *display_id)
    }
}
