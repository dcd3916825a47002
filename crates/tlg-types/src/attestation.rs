use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{AttestationId, RecordId, RevisionId, UserId};
use crate::Timestamp;

/// How the signer expressed assent. Self-asserted; nothing here is a
/// third-party cryptographic signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureType {
    TypedName,
    Drawn,
    ClickThrough,
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypedName => write!(f, "typed_name"),
            Self::Drawn => write!(f, "drawn"),
            Self::ClickThrough => write!(f, "click_through"),
        }
    }
}

impl FromStr for SignatureType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "typed_name" | "typed" => Ok(Self::TypedName),
            "drawn" => Ok(Self::Drawn),
            "click_through" | "click" => Ok(Self::ClickThrough),
            _ => Err(TypeError::UnknownVariant {
                kind: "signature type",
                value: s.to_string(),
            }),
        }
    }
}

/// A signer's statement attached to a finalized revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceAttestation {
    pub id: AttestationId,
    pub record_id: RecordId,
    pub revision_id: RevisionId,
    pub signer_id: UserId,
    pub signer_name: String,
    pub role: String,
    pub signature_type: SignatureType,
    pub text: String,
    pub ip_address: Option<String>,
    pub signed_at: Timestamp,
}
