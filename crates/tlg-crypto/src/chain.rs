//! Revision content hashes and parent-hash chain verification.
//!
//! The content hash of a revision covers
//! `{createdAt, createdBy, parentHash, payload, version}` in canonical form.
//! Because `parentHash` is the previous version's content hash, any change to
//! a finalized revision, or any reordering of versions, breaks every later
//! link. A verifier can walk backward from the latest finalized revision to
//! version 1 without a third-party timestamp authority.

use chrono::SecondsFormat;
use serde_json::json;
use tlg_types::{ContentHash, GovernanceRevision, Payload, Timestamp, UserId};

use crate::canonical::canonical_json;
use crate::hasher::ContentHasher;

/// Everything that goes into a revision's content hash.
#[derive(Clone, Copy, Debug)]
pub struct RevisionHashInput<'a> {
    pub payload: &'a Payload,
    pub created_at: Timestamp,
    pub created_by: &'a UserId,
    pub version: u32,
    pub parent_hash: Option<&'a ContentHash>,
}

impl RevisionHashInput<'_> {
    /// The canonical text that is digested.
    pub fn canonical_text(&self) -> String {
        let document = json!({
            "createdAt": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "createdBy": self.created_by.as_str(),
            "parentHash": ContentHash::hex_or_empty(self.parent_hash),
            "payload": self.payload.to_value(),
            "version": self.version,
        });
        canonical_json(&document)
    }
}

/// Compute the content hash of a revision.
pub fn compute_content_hash(input: &RevisionHashInput<'_>) -> ContentHash {
    ContentHasher::REVISION.hash(input.canonical_text().as_bytes())
}

/// A revision-like object that participates in a hash chain.
pub trait ChainLink {
    fn version(&self) -> u32;
    fn is_finalized(&self) -> bool;
    fn content_hash(&self) -> Option<&ContentHash>;
    fn parent_hash(&self) -> Option<&ContentHash>;
    fn hash_input(&self) -> RevisionHashInput<'_>;
}

impl ChainLink for GovernanceRevision {
    fn version(&self) -> u32 {
        self.version
    }

    fn is_finalized(&self) -> bool {
        GovernanceRevision::is_finalized(self)
    }

    fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    fn parent_hash(&self) -> Option<&ContentHash> {
        self.parent_hash.as_ref()
    }

    fn hash_input(&self) -> RevisionHashInput<'_> {
        RevisionHashInput {
            payload: &self.payload,
            created_at: self.created_at,
            created_by: &self.created_by,
            version: self.version,
            parent_hash: self.parent_hash.as_ref(),
        }
    }
}

/// Hash chain integrity verifier.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Recompute a single revision's hash and compare it to the stored one.
    ///
    /// Unfinalized revisions have no stored hash and never verify.
    pub fn verify_revision(link: &impl ChainLink) -> bool {
        match link.content_hash() {
            Some(stored) if link.is_finalized() => {
                compute_content_hash(&link.hash_input()) == *stored
            }
            _ => false,
        }
    }

    /// Verify a record's revisions, ordered by version, stopping at the first
    /// violation.
    pub fn verify_chain(links: &[impl ChainLink]) -> Result<(), ChainError> {
        match Self::violations(links).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every violation in a record's revisions, ordered by version.
    ///
    /// Checks:
    /// 1. Versions run 1, 2, 3, ... without gaps
    /// 2. Version 1 has no parent hash
    /// 3. Only the last revision may be unfinalized
    /// 4. Each later revision's parent hash equals its predecessor's content hash
    /// 5. A content hash is present exactly when the revision is finalized
    /// 6. Each finalized revision's hash recomputes to the stored value
    pub fn violations(links: &[impl ChainLink]) -> Vec<ChainError> {
        let mut violations = Vec::new();

        for (index, link) in links.iter().enumerate() {
            let version = link.version();
            let expected_version = (index + 1) as u32;
            if version != expected_version {
                violations.push(ChainError::VersionGap {
                    expected: expected_version,
                    found: version,
                });
            }

            if index == 0 {
                if link.parent_hash().is_some() {
                    violations.push(ChainError::GenesisHasParentHash);
                }
            } else {
                let previous = &links[index - 1];
                if !previous.is_finalized() {
                    violations.push(ChainError::UnfinalizedPredecessor {
                        version: previous.version(),
                    });
                }
                match (link.parent_hash(), previous.content_hash()) {
                    (Some(parent), Some(prev)) if parent == prev => {}
                    (None, _) => violations.push(ChainError::MissingParentHash { version }),
                    _ => violations.push(ChainError::BrokenLink { version }),
                }
            }

            match (link.is_finalized(), link.content_hash()) {
                (true, Some(stored)) => {
                    if compute_content_hash(&link.hash_input()) != *stored {
                        violations.push(ChainError::HashMismatch { version });
                    }
                }
                (true, None) => violations.push(ChainError::MissingContentHash { version }),
                (false, Some(_)) => violations.push(ChainError::UnexpectedContentHash { version }),
                (false, None) => {}
            }
        }

        violations
    }
}

/// Errors from chain verification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("version sequence broken: expected {expected}, found {found}")]
    VersionGap { expected: u32, found: u32 },

    #[error("version 1 has a parent hash (should be empty)")]
    GenesisHasParentHash,

    #[error("version {version} is not finalized but has a successor")]
    UnfinalizedPredecessor { version: u32 },

    #[error("missing parent hash at version {version}")]
    MissingParentHash { version: u32 },

    #[error("broken link at version {version}: parent hash does not match predecessor")]
    BrokenLink { version: u32 },

    #[error("finalized version {version} has no content hash")]
    MissingContentHash { version: u32 },

    #[error("unfinalized version {version} carries a content hash")]
    UnexpectedContentHash { version: u32 },

    #[error("hash mismatch at version {version}: recomputed hash differs from stored")]
    HashMismatch { version: u32 },
}

impl ChainError {
    /// The version the violation was detected at, when there is one.
    pub fn version(&self) -> Option<u32> {
        match self {
            Self::VersionGap { found, .. } => Some(*found),
            Self::GenesisHasParentHash => Some(1),
            Self::UnfinalizedPredecessor { version }
            | Self::MissingParentHash { version }
            | Self::BrokenLink { version }
            | Self::MissingContentHash { version }
            | Self::UnexpectedContentHash { version }
            | Self::HashMismatch { version } => Some(*version),
        }
    }
}
