//! Inputs to the store's conditional updates.
//!
//! Each command is applied as one atomic unit: every listed condition is
//! checked and every effect is written under the same critical section (or
//! transaction, for database backends), or nothing is written at all.

use tlg_types::{
    ContentHash, DisplayId, GovernanceRevision, Payload, RecordId, RevisionId, ThreadId,
    ThreadMove, Timestamp, UserId,
};

/// Replace a draft's payload.
///
/// Conditions: revision unfinalized, record not voided.
/// Effects: payload replaced, `draft_seq` incremented.
#[derive(Clone, Debug)]
pub struct UpdateDraft {
    pub revision_id: RevisionId,
    pub payload: Payload,
}

/// Seal a revision.
///
/// Conditions: `finalized_at` is null, `draft_seq == expected_draft_seq`,
/// record not voided, revision is the record's current revision.
/// Effects: revision gets `content_hash`/`finalized_at`/`finalized_by`; record
/// becomes finalized with `current_revision_id` pointing at the revision.
#[derive(Clone, Debug)]
pub struct FinalizeRevision {
    pub revision_id: RevisionId,
    pub expected_draft_seq: u64,
    pub content_hash: ContentHash,
    pub finalized_at: Timestamp,
    pub finalized_by: UserId,
}

/// Open a new draft revision atop a finalized record.
///
/// Conditions: record finalized, `current_revision_id == expected_current`,
/// current revision finalized, `(record, version)` unused.
/// Effects: revision inserted; record returns to draft with
/// `current_revision_id` pointing at the new revision.
#[derive(Clone, Debug)]
pub struct OpenAmendment {
    pub record_id: RecordId,
    pub expected_current: RevisionId,
    pub revision: GovernanceRevision,
}

/// Void a record.
///
/// Conditions: record not voided. Effects: status, `voided_*` fields.
#[derive(Clone, Debug)]
pub struct VoidRecord {
    pub record_id: RecordId,
    pub reason: String,
    pub voided_by: UserId,
    pub voided_at: Timestamp,
}

/// Move a record to a sub-number already issued on another thread.
///
/// Conditions: record still on `expected_thread`, destination thread exists
/// and is not deleted, `(to_thread, sub)` unused.
/// Effects: thread/sub/display id updated, breadcrumb appended.
#[derive(Clone, Debug)]
pub struct MoveRecord {
    pub record_id: RecordId,
    pub expected_thread: ThreadId,
    pub to_thread: ThreadId,
    pub sub: u32,
    pub display_id: DisplayId,
    pub breadcrumb: ThreadMove,
}
