use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EventId, PortfolioId, RecordId, RevisionId, TrustId, UserId};
use crate::Timestamp;

/// Kind of action recorded in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Created,
    DraftUpdated,
    Finalized,
    Amended,
    AmendmentFinalized,
    Voided,
    Attested,
    Moved,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::DraftUpdated => "DRAFT_UPDATED",
            Self::Finalized => "FINALIZED",
            Self::Amended => "AMENDED",
            Self::AmendmentFinalized => "AMENDMENT_FINALIZED",
            Self::Voided => "VOIDED",
            Self::Attested => "ATTESTED",
            Self::Moved => "MOVED",
        };
        f.write_str(name)
    }
}

/// Append-only audit row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceEvent {
    pub id: EventId,
    pub record_id: RecordId,
    pub revision_id: Option<RevisionId>,
    pub event_type: EventType,
    /// The authenticated human who performed the action.
    pub actor_id: UserId,
    /// Identity being impersonated, if the action was supervised.
    pub acting_as_user_id: Option<UserId>,
    pub portfolio_id: PortfolioId,
    pub trust_id: TrustId,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
    pub at: Timestamp,
}
