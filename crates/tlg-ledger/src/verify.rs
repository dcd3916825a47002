//! Hash and chain verification reports.
//!
//! Verification only reports. A mismatch is never repaired.

use serde::Serialize;
use tlg_crypto::{compute_content_hash, ChainLink, HashChainVerifier};
use tlg_types::{ContentHash, DisplayId, RecordId, RevisionId};
use tracing::warn;

use crate::error::{LedgerError, LedgerResult};
use crate::service::Ledger;

/// Outcome of re-hashing one revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionCheck {
    pub revision_id: RevisionId,
    pub record_id: RecordId,
    pub version: u32,
    pub finalized: bool,
    pub stored_hash: Option<ContentHash>,
    pub recomputed_hash: ContentHash,
    /// True only for a finalized revision whose hash recomputes exactly.
    pub intact: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainViolation {
    pub version: Option<u32>,
    pub message: String,
}

/// Outcome of walking a record's whole revision chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub record_id: RecordId,
    pub display_id: DisplayId,
    pub versions: u32,
    pub finalized: u32,
    pub violations: Vec<ChainViolation>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn a failed report into an `IntegrityViolation` error.
    pub fn ensure_intact(&self) -> LedgerResult<()> {
        if self.is_intact() {
            return Ok(());
        }
        let detail = self
            .violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Err(LedgerError::IntegrityViolation {
            record_id: self.record_id.to_string(),
            detail,
        })
    }
}

impl Ledger {
    pub fn verify_revision(&self, revision_id: &RevisionId) -> LedgerResult<RevisionCheck> {
        let revision = self.revision(revision_id)?;
        let recomputed_hash = compute_content_hash(&revision.hash_input());
        let intact = HashChainVerifier::verify_revision(&revision);
        if revision.is_finalized() && !intact {
            warn!(
                record_id = %revision.record_id,
                version = revision.version,
                "stored content hash does not match recomputed hash"
            );
        }
        Ok(RevisionCheck {
            revision_id: revision.id,
            record_id: revision.record_id,
            version: revision.version,
            finalized: revision.is_finalized(),
            stored_hash: revision.content_hash,
            recomputed_hash,
            intact,
        })
    }

    /// Walk every revision of a record: version continuity, parent links,
    /// and recomputed hashes. Also checks that the record points at its
    /// latest version.
    pub fn verify_record(&self, record_id: &RecordId) -> LedgerResult<ChainReport> {
        let record = self.record(record_id)?;
        let mut revisions = self.records.list_revisions(record_id)?;
        revisions.sort_by_key(|r| r.version);

        let mut violations: Vec<ChainViolation> = HashChainVerifier::violations(&revisions)
            .into_iter()
            .map(|e| ChainViolation {
                version: e.version(),
                message: e.to_string(),
            })
            .collect();

        if let Some(latest) = revisions.last() {
            if latest.id != record.current_revision_id {
                violations.push(ChainViolation {
                    version: Some(latest.version),
                    message: format!(
                        "record points at a revision other than its latest version {}",
                        latest.version
                    ),
                });
            }
        }

        if !violations.is_empty() {
            warn!(
                record_id = %record.id,
                display_id = %record.display_id,
                violations = violations.len(),
                "revision chain failed verification"
            );
        }

        Ok(ChainReport {
            record_id: record.id,
            display_id: record.display_id,
            versions: revisions.len() as u32,
            finalized: revisions.iter().filter(|r| r.is_finalized()).count() as u32,
            violations,
        })
    }
}
