//! Record creation and the revision lifecycle.

use std::fmt;

use serde::Serialize;
use tlg_crypto::{compute_content_hash, ChainLink};
use tlg_diff::{diff_payloads, PayloadDiff};
use tlg_store::{FinalizeRevision, OpenAmendment, Precondition, StoreError, UpdateDraft, VoidRecord};
use tlg_types::{
    Actor, ChangeType, ContentHash, DisplayId, EventType, GovernanceRecord, GovernanceRevision,
    LedgerThread, ModulePayload, ModuleType, Payload, PortfolioId, RecordId, RecordStatus,
    RevisionId, RevisionState, ThreadId, Timestamp, TrustId, UserId,
};
use tracing::{info, warn};

use crate::audit::{event, WithMeta};
use crate::error::{LedgerError, LedgerResult, TransitionCode};
use crate::lifecycle::{self, Action, Facts};
use crate::service::{Ledger, ThreadDetails};

/// Where a new record is filed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThreadSpec {
    /// Issue a fresh sub-number on an existing thread.
    Existing(ThreadId),
    /// Use a sub-number previously handed out by `allocate_sub`.
    Reserved { thread_id: ThreadId, sub: u32 },
    /// Open a new thread and file the record as its first entry.
    New(ThreadDetails),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRecord {
    pub portfolio_id: PortfolioId,
    pub trust_id: TrustId,
    pub module_type: ModuleType,
    pub title: String,
    pub payload: Payload,
    pub thread: ThreadSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRecord {
    pub record_id: RecordId,
    pub revision_id: RevisionId,
    pub display_id: DisplayId,
    pub thread_id: ThreadId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedRevision {
    pub record_id: RecordId,
    pub revision_id: RevisionId,
    pub version: u32,
    pub content_hash: ContentHash,
    pub finalized_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendedRecord {
    pub record_id: RecordId,
    pub new_revision_id: RevisionId,
    pub version: u32,
    pub parent_hash: ContentHash,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidedRecord {
    pub record_id: RecordId,
    pub voided_at: Timestamp,
}

/// One line of a record's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSummary {
    pub revision_id: RevisionId,
    pub version: u32,
    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub state: RevisionState,
    pub content_hash: Option<ContentHash>,
    pub parent_hash: Option<ContentHash>,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub finalized_at: Option<Timestamp>,
    pub finalized_by: Option<UserId>,
}

impl From<&GovernanceRevision> for RevisionSummary {
    fn from(r: &GovernanceRevision) -> Self {
        Self {
            revision_id: r.id,
            version: r.version,
            change_type: r.change_type,
            change_reason: r.change_reason.clone(),
            state: r.state(),
            content_hash: r.content_hash,
            parent_hash: r.parent_hash,
            created_by: r.created_by.clone(),
            created_at: r.created_at,
            finalized_at: r.finalized_at,
            finalized_by: r.finalized_by.clone(),
        }
    }
}

/// Field-level changes from one revision of a record to another.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDiff {
    pub record_id: RecordId,
    /// `None` when diffing version 1 against an empty payload.
    pub from_revision_id: Option<RevisionId>,
    pub from_version: Option<u32>,
    pub to_revision_id: RevisionId,
    pub to_version: u32,
    pub changes: PayloadDiff,
}

pub(crate) fn facts(record: &GovernanceRecord, revision: &GovernanceRevision) -> Facts {
    Facts {
        record: record.status,
        revision: revision.state(),
        version: revision.version,
        is_current: record.current_revision_id == revision.id,
    }
}

fn guard(action: Action, facts: &Facts, subject: impl fmt::Display) -> LedgerResult<()> {
    lifecycle::check(action, facts).map_err(|code| {
        LedgerError::transition(code, format!("{action:?} refused for {subject}"))
    })
}

fn non_blank(value: &str, field: &str) -> LedgerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

impl Ledger {
    /// File a new record with an unfinalized version 1.
    pub fn create_record(&self, actor: &Actor, new: NewRecord) -> LedgerResult<CreatedRecord> {
        let title = non_blank(&new.title, "title")?;
        ModulePayload::parse(new.module_type, &new.payload)?;

        let (thread, display_id, sub, fresh) = match &new.thread {
            ThreadSpec::Existing(thread_id) => {
                let thread = self.live_thread(thread_id)?;
                same_portfolio(&thread, &new.portfolio_id)?;
                let (display_id, sub) = self.allocator.allocate_next(thread_id)?;
                (thread, display_id, sub, true)
            }
            ThreadSpec::Reserved { thread_id, sub } => {
                let thread = self.live_thread(thread_id)?;
                same_portfolio(&thread, &new.portfolio_id)?;
                let display_id = self.reserved_slot(&thread, *sub)?;
                (thread, display_id, *sub, false)
            }
            ThreadSpec::New(details) => {
                let thread =
                    self.open_thread(actor, &new.portfolio_id, &new.trust_id, details.clone())?;
                let (display_id, sub) = self.allocator.allocate_next(&thread.id)?;
                (thread, display_id, sub, true)
            }
        };

        let now = self.clock.now();
        let record_id = RecordId::new();
        let revision = GovernanceRevision {
            id: RevisionId::new(),
            record_id,
            version: 1,
            parent_revision_id: None,
            change_type: ChangeType::Initial,
            change_reason: None,
            payload: new.payload,
            content_hash: None,
            parent_hash: None,
            created_by: actor.user_id.clone(),
            created_at: now,
            finalized_at: None,
            finalized_by: None,
            effective_at: None,
            draft_seq: 0,
        };
        let record = GovernanceRecord {
            id: record_id,
            portfolio_id: new.portfolio_id,
            trust_id: new.trust_id,
            module_type: new.module_type,
            title,
            display_id: display_id.clone(),
            thread_id: thread.id,
            sub,
            status: RecordStatus::Draft,
            current_revision_id: revision.id,
            finalized_at: None,
            finalized_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            created_by: actor.user_id.clone(),
            created_at: now,
            merge_history: Vec::new(),
        };

        if let Err(e) = self.records.insert_record(&record, &revision) {
            if fresh {
                warn!(
                    display_id = %display_id,
                    error = %e,
                    "record insert failed, sub-number wasted"
                );
            }
            return Err(e.into());
        }

        info!(
            record_id = %record.id,
            display_id = %display_id,
            module = %record.module_type,
            "record created"
        );
        self.audit.record(
            event(actor, &record, Some(revision.id), EventType::Created, now)
                .with_meta("displayId", display_id.to_string()),
        );

        Ok(CreatedRecord {
            record_id,
            revision_id: revision.id,
            display_id,
            thread_id: thread.id,
        })
    }

    /// Check that `sub` was issued on `thread` and never carried a record.
    fn reserved_slot(&self, thread: &LedgerThread, sub: u32) -> LedgerResult<DisplayId> {
        if sub == 0 || sub >= thread.next_sub {
            return Err(LedgerError::validation(format!(
                "sub-number {sub} has not been issued on {}",
                thread.prefix()
            )));
        }
        let display_id = thread.display_id(sub)?;
        if !self.records.find_by_display_id(&display_id)?.is_empty() {
            return Err(LedgerError::validation(format!(
                "{display_id} is already in use"
            )));
        }
        Ok(display_id)
    }

    /// Replace the payload of an unfinalized revision.
    pub fn update_draft(
        &self,
        actor: &Actor,
        revision_id: &RevisionId,
        payload: Payload,
    ) -> LedgerResult<GovernanceRevision> {
        let revision = self.revision(revision_id)?;
        let record = self.record(&revision.record_id)?;
        guard(Action::UpdateDraft, &facts(&record, &revision), revision_id)?;
        ModulePayload::parse(record.module_type, &payload)?;

        let updated = self.records.update_draft(&UpdateDraft {
            revision_id: *revision_id,
            payload,
        })?;

        self.audit.record(
            event(actor, &record, Some(updated.id), EventType::DraftUpdated, self.clock.now())
                .with_meta("draftSeq", updated.draft_seq),
        );
        Ok(updated)
    }

    /// Seal a revision: compute its content hash and make it immutable.
    ///
    /// Of two concurrent calls exactly one succeeds; the other observes
    /// `ALREADY_FINALIZED`. A draft edited between read and seal yields a
    /// retryable `Conflict`.
    pub fn finalize(
        &self,
        actor: &Actor,
        revision_id: &RevisionId,
    ) -> LedgerResult<FinalizedRevision> {
        self.seal(actor, revision_id, Action::Finalize)
    }

    /// [`finalize`](Self::finalize) restricted to amendments (version > 1).
    pub fn finalize_amendment(
        &self,
        actor: &Actor,
        revision_id: &RevisionId,
    ) -> LedgerResult<FinalizedRevision> {
        self.seal(actor, revision_id, Action::FinalizeAmendment)
    }

    fn seal(
        &self,
        actor: &Actor,
        revision_id: &RevisionId,
        action: Action,
    ) -> LedgerResult<FinalizedRevision> {
        let revision = self.revision(revision_id)?;
        let record = self.record(&revision.record_id)?;
        guard(action, &facts(&record, &revision), revision_id)?;

        let content_hash = compute_content_hash(&revision.hash_input());
        let finalized_at = self.clock.now();
        let (record, revision) = self.records.finalize_revision(&FinalizeRevision {
            revision_id: *revision_id,
            expected_draft_seq: revision.draft_seq,
            content_hash,
            finalized_at,
            finalized_by: actor.user_id.clone(),
        })?;
        debug_assert_eq!(record.status, lifecycle::next_status(action, RecordStatus::Draft));

        info!(
            record_id = %record.id,
            display_id = %record.display_id,
            version = revision.version,
            hash = %content_hash.short_hex(),
            "revision finalized"
        );
        self.audit.record(
            event(
                actor,
                &record,
                Some(revision.id),
                lifecycle::event_type(action, revision.version),
                finalized_at,
            )
            .with_meta("version", revision.version)
            .with_meta("contentHash", content_hash.to_hex()),
        );

        Ok(FinalizedRevision {
            record_id: record.id,
            revision_id: revision.id,
            version: revision.version,
            content_hash,
            finalized_at,
        })
    }

    /// Open a new draft version of a finalized record.
    pub fn amend(
        &self,
        actor: &Actor,
        record_id: &RecordId,
        change_reason: &str,
    ) -> LedgerResult<AmendedRecord> {
        self.amend_as(actor, record_id, change_reason, ChangeType::Amendment)
    }

    /// [`amend`](Self::amend) with an explicit change type, e.g. a correction.
    pub fn amend_as(
        &self,
        actor: &Actor,
        record_id: &RecordId,
        change_reason: &str,
        change_type: ChangeType,
    ) -> LedgerResult<AmendedRecord> {
        if change_type == ChangeType::Initial {
            return Err(LedgerError::validation(
                "an amendment cannot have change type initial",
            ));
        }
        let reason = change_reason.trim();
        if reason.is_empty() && self.config.require_change_reason {
            return Err(LedgerError::validation("change reason must not be empty"));
        }

        let record = self.record(record_id)?;
        let current = self.revision(&record.current_revision_id)?;
        guard(Action::Amend, &facts(&record, &current), record_id)?;
        let parent_hash = current.content_hash.ok_or_else(|| LedgerError::IntegrityViolation {
            record_id: record_id.to_string(),
            detail: format!("finalized version {} has no content hash", current.version),
        })?;

        let now = self.clock.now();
        let draft = GovernanceRevision {
            id: RevisionId::new(),
            record_id: *record_id,
            version: current.version + 1,
            parent_revision_id: Some(current.id),
            change_type,
            change_reason: (!reason.is_empty()).then(|| reason.to_string()),
            payload: current.payload.clone(),
            content_hash: None,
            parent_hash: Some(parent_hash),
            created_by: actor.user_id.clone(),
            created_at: now,
            finalized_at: None,
            finalized_by: None,
            effective_at: None,
            draft_seq: 0,
        };
        let record = self.records.open_amendment(&OpenAmendment {
            record_id: *record_id,
            expected_current: current.id,
            revision: draft.clone(),
        })?;

        info!(record_id = %record.id, version = draft.version, "amendment opened");
        self.audit.record(
            event(actor, &record, Some(draft.id), EventType::Amended, now)
                .with_meta("version", draft.version)
                .with_meta("changeType", change_type.to_string())
                .with_meta("changeReason", reason),
        );

        Ok(AmendedRecord {
            record_id: record.id,
            new_revision_id: draft.id,
            version: draft.version,
            parent_hash,
        })
    }

    /// Void a record. Terminal; revisions are left untouched.
    pub fn void(
        &self,
        actor: &Actor,
        record_id: &RecordId,
        reason: &str,
    ) -> LedgerResult<VoidedRecord> {
        let reason = non_blank(reason, "void reason")?;
        let record = self.record(record_id)?;
        let current = self.revision(&record.current_revision_id)?;
        guard(Action::Void, &facts(&record, &current), record_id)?;

        let voided_at = self.clock.now();
        let record = self
            .records
            .void_record(&VoidRecord {
                record_id: *record_id,
                reason: reason.clone(),
                voided_by: actor.user_id.clone(),
                voided_at,
            })
            .map_err(|e| match e {
                StoreError::PreconditionFailed(Precondition::RecordVoided) => {
                    LedgerError::transition(TransitionCode::AlreadyVoided, "record already voided")
                }
                other => other.into(),
            })?;

        info!(record_id = %record.id, display_id = %record.display_id, "record voided");
        self.audit.record(
            event(actor, &record, None, EventType::Voided, voided_at).with_meta("reason", reason),
        );
        Ok(VoidedRecord {
            record_id: record.id,
            voided_at,
        })
    }

    /// Every revision of a record, oldest first.
    pub fn history(&self, record_id: &RecordId) -> LedgerResult<Vec<RevisionSummary>> {
        self.record(record_id)?;
        let mut revisions = self.records.list_revisions(record_id)?;
        revisions.sort_by_key(|r| r.version);
        Ok(revisions.iter().map(RevisionSummary::from).collect())
    }

    /// Diff a revision against `compare_to`, or against its parent when none
    /// is given. Version 1 without a comparison diffs against an empty payload.
    pub fn diff(
        &self,
        revision_id: &RevisionId,
        compare_to: Option<&RevisionId>,
    ) -> LedgerResult<RevisionDiff> {
        let to = self.revision(revision_id)?;
        let from = match compare_to.or(to.parent_revision_id.as_ref()) {
            Some(id) => {
                let from = self.revision(id)?;
                if from.record_id != to.record_id {
                    return Err(LedgerError::validation(
                        "revisions belong to different records",
                    ));
                }
                Some(from)
            }
            None => None,
        };

        let empty = Payload::new();
        let old = from.as_ref().map(|r| &r.payload).unwrap_or(&empty);
        Ok(RevisionDiff {
            record_id: to.record_id,
            from_revision_id: from.as_ref().map(|r| r.id),
            from_version: from.as_ref().map(|r| r.version),
            to_revision_id: to.id,
            to_version: to.version,
            changes: diff_payloads(old, &to.payload),
        })
    }

    /// Audit events of a record, oldest first.
    pub fn events(&self, record_id: &RecordId) -> LedgerResult<Vec<tlg_types::GovernanceEvent>> {
        self.record(record_id)?;
        self.audit.events_for(record_id)
    }
}

fn same_portfolio(thread: &LedgerThread, portfolio_id: &PortfolioId) -> LedgerResult<()> {
    if &thread.portfolio_id != portfolio_id {
        return Err(LedgerError::validation(format!(
            "thread {} belongs to another portfolio",
            thread.prefix()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tlg_crypto::RevisionHashInput;
    use tlg_store::{EventStore, InMemoryStore, StoreResult};
    use tlg_types::GovernanceEvent;

    use super::*;
    use crate::service::LedgerStores;
    use crate::testing::{Harness, BASE};

    fn payload(value: serde_json::Value) -> Payload {
        Payload::from_value(value).unwrap()
    }

    #[test]
    fn filing_scenario_under_group_seven() {
        let h = Harness::new();
        for i in 1..=6 {
            h.thread(&format!("Earlier matter {i}"));
        }
        let thread = h.thread("Trustee minutes");
        assert_eq!(h.ledger.thread(&thread).unwrap().prefix().to_string(), format!("{BASE}-7"));

        let first = h.ledger.allocate_sub(&h.actor, &thread).unwrap();
        let second = h.ledger.allocate_sub(&h.actor, &thread).unwrap();
        assert_eq!(first.display_id.to_string(), "RF000000001US-7.001");
        assert_eq!(second.display_id.to_string(), "RF000000001US-7.002");

        h.tick();
        let created = h
            .ledger
            .create_record(
                &h.actor,
                h.new_record(
                    ThreadSpec::Reserved { thread_id: thread, sub: 1 },
                    json!({"title": "Initial filing"}),
                ),
            )
            .unwrap();
        assert_eq!(created.display_id.to_string(), "RF000000001US-7.001");

        h.tick();
        let v1 = h.ledger.finalize(&h.actor, &created.revision_id).unwrap();
        let stored_v1 = h.ledger.revision(&created.revision_id).unwrap();
        assert_eq!(stored_v1.parent_hash, None);
        assert!(stored_v1.hash_input().canonical_text().contains(r#""parentHash":"""#));
        assert_eq!(Some(v1.content_hash), stored_v1.content_hash);
        assert_eq!(v1.content_hash.to_hex().len(), 64);

        h.tick();
        let amended = h.ledger.amend(&h.actor, &created.record_id, "correct date").unwrap();
        assert_eq!(amended.version, 2);
        assert_eq!(amended.parent_hash, v1.content_hash);
        let draft = h.ledger.revision(&amended.new_revision_id).unwrap();
        assert_eq!(draft.payload, stored_v1.payload);
        assert_eq!(draft.change_reason.as_deref(), Some("correct date"));

        h.tick();
        h.ledger
            .update_draft(
                &h.actor,
                &amended.new_revision_id,
                payload(json!({"title": "Initial filing", "meeting_date": "2025-01-02"})),
            )
            .unwrap();
        h.tick();
        let v2 = h
            .ledger
            .finalize_amendment(&h.actor, &amended.new_revision_id)
            .unwrap();
        assert_ne!(v2.content_hash, v1.content_hash);

        let record = h.ledger.record(&created.record_id).unwrap();
        assert_eq!(record.status, RecordStatus::Finalized);
        assert_eq!(record.current_revision_id, amended.new_revision_id);

        let report = h.ledger.verify_record(&created.record_id).unwrap();
        assert!(report.is_intact(), "{:?}", report.violations);
        assert_eq!((report.versions, report.finalized), (2, 2));
        assert!(h.ledger.verify_revision(&created.revision_id).unwrap().intact);
    }

    #[test]
    fn content_hash_matches_the_documented_recipe() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let created = h.sealed_on(thread, "Initial filing");
        let stored = h.ledger.revision(&created.revision_id).unwrap();

        let expected = compute_content_hash(&RevisionHashInput {
            payload: &stored.payload,
            created_at: stored.created_at,
            created_by: &stored.created_by,
            version: 1,
            parent_hash: None,
        });
        assert_eq!(stored.content_hash, Some(expected));
    }

    #[test]
    fn chain_holds_over_many_amendments() {
        let h = Harness::new();
        let thread = h.thread("Distributions");
        let created = h.sealed_on(thread, "Quarterly distribution");

        for k in 2..=6u32 {
            h.tick();
            let amended = h.ledger.amend(&h.actor, &created.record_id, "revise").unwrap();
            assert_eq!(amended.version, k);
            h.tick();
            h.ledger
                .update_draft(
                    &h.actor,
                    &amended.new_revision_id,
                    payload(json!({"title": format!("Quarterly distribution v{k}")})),
                )
                .unwrap();
            h.tick();
            h.ledger.finalize_amendment(&h.actor, &amended.new_revision_id).unwrap();
        }

        let history = h.ledger.history(&created.record_id).unwrap();
        assert_eq!(
            history.iter().map(|r| r.version).collect::<Vec<_>>(),
            (1..=6u32).collect::<Vec<_>>()
        );
        for pair in history.windows(2) {
            assert_eq!(pair[1].parent_hash, pair[0].content_hash);
        }
        assert!(h.ledger.verify_record(&created.record_id).unwrap().is_intact());
    }

    #[test]
    fn finalized_revision_cannot_be_edited() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let created = h.sealed_on(thread, "Sealed");
        let before = h.ledger.revision(&created.revision_id).unwrap();

        let err = h
            .ledger
            .update_draft(&h.actor, &created.revision_id, payload(json!({"title": "Edited"})))
            .unwrap_err();
        assert_eq!(err.code(), "ALREADY_FINALIZED");
        assert_eq!(h.ledger.revision(&created.revision_id).unwrap(), before);
    }

    #[test]
    fn second_finalize_is_refused() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let created = h.sealed_on(thread, "Once");
        let err = h.ledger.finalize(&h.actor, &created.revision_id).unwrap_err();
        assert_eq!(err.code(), "ALREADY_FINALIZED");
        assert!(!err.is_retryable());
    }

    #[test]
    fn concurrent_finalize_has_exactly_one_winner() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let created = h.record_on(thread, "Race");

        let results: Vec<LedgerResult<FinalizedRevision>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| h.ledger.finalize(&h.actor, &created.revision_id)))
                .collect();
            handles.into_iter().map(|j| j.join().unwrap()).collect()
        });

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        for loser in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(loser.code(), "ALREADY_FINALIZED");
        }
        let stored = h.ledger.revision(&created.revision_id).unwrap();
        assert_eq!(stored.content_hash, Some(winners[0].content_hash));
    }

    #[test]
    fn amend_requires_a_finalized_record() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let draft = h.record_on(thread, "Draft only");
        assert_eq!(
            h.ledger.amend(&h.actor, &draft.record_id, "too early").unwrap_err().code(),
            "RECORD_NOT_FINALIZED"
        );

        let sealed = h.sealed_on(thread, "Sealed");
        h.ledger.amend(&h.actor, &sealed.record_id, "first").unwrap();
        assert_eq!(
            h.ledger.amend(&h.actor, &sealed.record_id, "second").unwrap_err().code(),
            "RECORD_NOT_FINALIZED"
        );
        assert_eq!(h.ledger.history(&sealed.record_id).unwrap().len(), 2);
    }

    #[test]
    fn change_reason_is_required_unless_configured_off() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let sealed = h.sealed_on(thread, "Sealed");
        assert!(matches!(
            h.ledger.amend(&h.actor, &sealed.record_id, "  "),
            Err(LedgerError::Validation(_))
        ));

        let relaxed = Harness::with_config(crate::LedgerConfig {
            require_change_reason: false,
            ..crate::LedgerConfig::default()
        });
        let thread = relaxed.thread("Minutes");
        let sealed = relaxed.sealed_on(thread, "Sealed");
        let amended = relaxed.ledger.amend(&relaxed.actor, &sealed.record_id, "").unwrap();
        let draft = relaxed.ledger.revision(&amended.new_revision_id).unwrap();
        assert_eq!(draft.change_reason, None);
    }

    #[test]
    fn correction_is_recorded_as_its_change_type() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let sealed = h.sealed_on(thread, "Sealed");
        let amended = h
            .ledger
            .amend_as(&h.actor, &sealed.record_id, "typo", ChangeType::Correction)
            .unwrap();
        assert_eq!(
            h.ledger.revision(&amended.new_revision_id).unwrap().change_type,
            ChangeType::Correction
        );
        assert!(h
            .ledger
            .amend_as(&h.actor, &sealed.record_id, "x", ChangeType::Initial)
            .is_err());
    }

    #[test]
    fn finalize_amendment_rejects_version_one() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let draft = h.record_on(thread, "v1");
        assert_eq!(
            h.ledger
                .finalize_amendment(&h.actor, &draft.revision_id)
                .unwrap_err()
                .code(),
            "NOT_AN_AMENDMENT"
        );
    }

    #[test]
    fn void_is_terminal() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let draft = h.record_on(thread, "Mistake");
        h.tick();
        h.ledger.void(&h.actor, &draft.record_id, "filed twice").unwrap();

        assert_eq!(
            h.ledger.finalize(&h.actor, &draft.revision_id).unwrap_err().code(),
            "RECORD_VOIDED"
        );
        assert_eq!(
            h.ledger
                .update_draft(&h.actor, &draft.revision_id, payload(json!({"title": "x"})))
                .unwrap_err()
                .code(),
            "RECORD_VOIDED"
        );
        assert_eq!(
            h.ledger.void(&h.actor, &draft.record_id, "again").unwrap_err().code(),
            "ALREADY_VOIDED"
        );
        assert!(matches!(
            h.ledger.void(&h.actor, &draft.record_id, ""),
            Err(LedgerError::Validation(_))
        ));

        let record = h.ledger.record(&draft.record_id).unwrap();
        assert_eq!(record.status, RecordStatus::Voided);
        assert_eq!(record.void_reason.as_deref(), Some("filed twice"));
        assert!(!h.ledger.revision(&draft.revision_id).unwrap().is_finalized());
    }

    #[test]
    fn sealed_record_can_be_voided_and_keeps_its_chain() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let sealed = h.sealed_on(thread, "Superseded");
        h.ledger.void(&h.actor, &sealed.record_id, "superseded").unwrap();
        assert_eq!(
            h.ledger.amend(&h.actor, &sealed.record_id, "x").unwrap_err().code(),
            "RECORD_VOIDED"
        );
        assert!(h.ledger.verify_record(&sealed.record_id).unwrap().is_intact());
    }

    #[test]
    fn each_transition_appends_one_event() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let created = h.record_on(thread, "Audited");
        h.tick();
        h.ledger
            .update_draft(&h.actor, &created.revision_id, payload(json!({"title": "Audited v1"})))
            .unwrap();
        h.tick();
        h.ledger.finalize(&h.actor, &created.revision_id).unwrap();
        h.tick();
        let amended = h.ledger.amend(&h.actor, &created.record_id, "update").unwrap();
        h.tick();
        h.ledger.finalize_amendment(&h.actor, &amended.new_revision_id).unwrap();
        h.tick();
        h.ledger.void(&h.actor, &created.record_id, "closed").unwrap();

        let types: Vec<EventType> = h
            .ledger
            .events(&created.record_id)
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                EventType::Created,
                EventType::DraftUpdated,
                EventType::Finalized,
                EventType::Amended,
                EventType::AmendmentFinalized,
                EventType::Voided,
            ]
        );
    }

    #[test]
    fn supervised_actions_record_both_identities() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let admin = Actor::new("admin-7").acting_as("trustee-1");
        h.tick();
        let created = h
            .ledger
            .create_record(
                &admin,
                h.new_record(ThreadSpec::Existing(thread), json!({"title": "x"})),
            )
            .unwrap();
        let events = h.ledger.events(&created.record_id).unwrap();
        assert_eq!(events[0].actor_id.as_str(), "admin-7");
        assert_eq!(events[0].acting_as_user_id.as_ref().map(|u| u.as_str()), Some("trustee-1"));
    }

    #[test]
    fn invalid_payload_is_rejected_without_side_effects() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let err = h
            .ledger
            .create_record(
                &h.actor,
                h.new_record(ThreadSpec::Existing(thread), json!({"title": ""})),
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ValidationError);
        assert_eq!(h.ledger.thread(&thread).unwrap().next_sub, 1);

        let created = h.record_on(thread, "Valid");
        let err = h
            .ledger
            .update_draft(
                &h.actor,
                &created.revision_id,
                payload(json!({"title": "ok", "motions": [{"text": " "}]})),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(h.ledger.revision(&created.revision_id).unwrap().draft_seq, 0);
    }

    #[test]
    fn reserved_subs_must_be_issued_and_unused() {
        let h = Harness::new();
        let thread = h.thread("Reserved");
        let reserved = |sub| {
            h.ledger.create_record(
                &h.actor,
                h.new_record(
                    ThreadSpec::Reserved { thread_id: thread, sub },
                    json!({"title": "Reserved"}),
                ),
            )
        };

        assert!(matches!(reserved(1), Err(LedgerError::Validation(_))));
        h.ledger.allocate_sub(&h.actor, &thread).unwrap();
        reserved(1).unwrap();
        assert!(matches!(reserved(1), Err(LedgerError::Validation(_))));
        assert!(matches!(reserved(0), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn records_on_another_portfolios_thread_are_refused() {
        let h = Harness::new();
        let thread = h.thread("Mine");
        let mut foreign = h.new_record(ThreadSpec::Existing(thread), json!({"title": "x"}));
        foreign.portfolio_id = PortfolioId::new("pf-other");
        assert!(matches!(
            h.ledger.create_record(&h.actor, foreign),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(h.ledger.thread(&thread).unwrap().next_sub, 1);
    }

    #[test]
    fn new_thread_spec_opens_a_thread() {
        let h = Harness::new();
        h.thread("Existing");
        let created = h
            .ledger
            .create_record(
                &h.actor,
                h.new_record(
                    ThreadSpec::New(ThreadDetails::new(
                        "Insurance",
                        tlg_types::ThreadCategory::Insurance,
                    )),
                    json!({"title": "Policy renewal"}),
                ),
            )
            .unwrap();
        assert_eq!(created.display_id.to_string(), "RF000000001US-2.001");
        assert_eq!(h.ledger.thread(&created.thread_id).unwrap().title, "Insurance");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let h = Harness::new();
        assert_eq!(
            h.ledger
                .finalize(&h.actor, &RevisionId::new())
                .unwrap_err()
                .code(),
            "NOT_FOUND"
        );
        assert_eq!(h.ledger.history(&RecordId::new()).unwrap_err().code(), "NOT_FOUND");
        assert_eq!(h.ledger.events(&RecordId::new()).unwrap_err().code(), "NOT_FOUND");
        let err = h
            .ledger
            .create_record(
                &h.actor,
                h.new_record(ThreadSpec::Existing(ThreadId::new()), json!({"title": "x"})),
            )
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn diff_defaults_to_the_parent_revision() {
        let h = Harness::new();
        let thread = h.thread("Minutes");
        let created = h.sealed_on(thread, "Board meeting");

        let first = h.ledger.diff(&created.revision_id, None).unwrap();
        assert_eq!(first.from_revision_id, None);
        assert_eq!(first.changes.additions(), 1);

        h.tick();
        let amended = h.ledger.amend(&h.actor, &created.record_id, "add notes").unwrap();
        h.ledger
            .update_draft(
                &h.actor,
                &amended.new_revision_id,
                payload(json!({"title": "Board meeting (corrected)", "notes": "quorum present"})),
            )
            .unwrap();

        let diff = h.ledger.diff(&amended.new_revision_id, None).unwrap();
        assert_eq!(diff.from_version, Some(1));
        assert_eq!(diff.to_version, 2);
        assert_eq!(diff.changes.additions(), 1);
        assert_eq!(diff.changes.modifications(), 1);

        let reverse = h
            .ledger
            .diff(&created.revision_id, Some(&amended.new_revision_id))
            .unwrap();
        assert_eq!(reverse.changes.removals(), 1);

        let other = h.sealed_on(thread, "Other");
        assert!(matches!(
            h.ledger.diff(&created.revision_id, Some(&other.revision_id)),
            Err(LedgerError::Validation(_))
        ));
    }

    struct BrokenEvents;

    impl EventStore for BrokenEvents {
        fn append_event(&self, _: &GovernanceEvent) -> StoreResult<()> {
            Err(tlg_store::StoreError::LockPoisoned)
        }
        fn events_for_record(&self, _: &RecordId) -> StoreResult<Vec<GovernanceEvent>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn audit_failures_do_not_undo_transitions() {
        let store = Arc::new(InMemoryStore::new());
        let mut stores = LedgerStores::shared(store.clone());
        stores.events = Arc::new(BrokenEvents);
        let ledger = Ledger::with_stores(
            stores,
            Arc::new(crate::clock::SystemClock),
            crate::LedgerConfig::default(),
        )
        .unwrap();
        let actor = Actor::new("trustee-1");
        let portfolio = PortfolioId::new("pf-1");
        ledger.register_base(&actor, &portfolio, BASE).unwrap();

        let created = ledger
            .create_record(
                &actor,
                NewRecord {
                    portfolio_id: portfolio,
                    trust_id: TrustId::new("trust-1"),
                    module_type: ModuleType::Minutes,
                    title: "Unaudited".into(),
                    payload: payload(json!({"title": "Unaudited"})),
                    thread: ThreadSpec::New(ThreadDetails::new(
                        "t",
                        tlg_types::ThreadCategory::General,
                    )),
                },
            )
            .unwrap();
        ledger.finalize(&actor, &created.revision_id).unwrap();
        assert_eq!(
            ledger.record(&created.record_id).unwrap().status,
            RecordStatus::Finalized
        );
        assert!(ledger.events(&created.record_id).unwrap().is_empty());
    }
}
