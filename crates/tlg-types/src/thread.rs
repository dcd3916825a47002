use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::display::{Base, DisplayId, ThreadPrefix};
use crate::error::TypeError;
use crate::ids::{PortfolioId, ThreadId, TrustId};
use crate::Timestamp;

/// Kind of administrative matter a thread tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadCategory {
    General,
    Meeting,
    Distribution,
    Dispute,
    Insurance,
    Compensation,
    Tax,
    Property,
}

impl ThreadCategory {
    pub const ALL: [ThreadCategory; 8] = [
        Self::General,
        Self::Meeting,
        Self::Distribution,
        Self::Dispute,
        Self::Insurance,
        Self::Compensation,
        Self::Tax,
        Self::Property,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Meeting => "MEETING",
            Self::Distribution => "DISTRIBUTION",
            Self::Dispute => "DISPUTE",
            Self::Insurance => "INSURANCE",
            Self::Compensation => "COMPENSATION",
            Self::Tax => "TAX",
            Self::Property => "PROPERTY",
        }
    }
}

impl fmt::Display for ThreadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadCategory {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TypeError::UnknownVariant {
                kind: "thread category",
                value: s.to_string(),
            })
    }
}

/// A named administrative matter owning a permanent group slot.
///
/// `next_sub` is the next sub-number to hand out. It starts at 1, only ever
/// increases, and is never reset, not even by soft-deletion or merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerThread {
    pub id: ThreadId,
    pub portfolio_id: PortfolioId,
    pub trust_id: TrustId,
    pub base: Base,
    pub group: u32,
    pub title: String,
    pub category: ThreadCategory,
    pub primary_party: Option<String>,
    pub external_ref: Option<String>,
    pub next_sub: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl LedgerThread {
    pub fn prefix(&self) -> ThreadPrefix {
        ThreadPrefix {
            base: self.base.clone(),
            group: self.group,
        }
    }

    pub fn display_id(&self, sub: u32) -> Result<DisplayId, TypeError> {
        DisplayId::new(self.base.clone(), self.group, sub)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Number of sub-numbers consumed so far (including wasted ones).
    pub fn issued(&self) -> u32 {
        self.next_sub.saturating_sub(1)
    }
}
