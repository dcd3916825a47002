//! Thread maintenance: merge, split and reassign.
//!
//! Each record move is two steps: issue a sub-number on the destination,
//! then move the record conditionally on it still being where it was read.
//! A failure between the steps wastes a sub-number but can never put two
//! records on one display id. Runs are not transactional as a whole; every
//! record's outcome is reported and one integrity log row summarizes the run.

use std::collections::BTreeSet;

use serde::Serialize;
use tlg_store::MoveRecord;
use tlg_types::{
    Actor, DisplayIdChange, EventType, GovernanceRecord, IntegrityEntryId, IntegrityLogEntry,
    LedgerThread, MoveFailure, MoveOperation, RecordId, ThreadId, ThreadMove,
};
use tracing::{debug, info, warn};

use crate::audit::{event, WithMeta};
use crate::error::{LedgerError, LedgerResult, TransitionCode};
use crate::service::{Ledger, ThreadDetails};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub entry: IntegrityLogEntry,
    /// Sources that were emptied and soft-deleted.
    pub deleted_threads: Vec<ThreadId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOutcome {
    pub thread: LedgerThread,
    pub entry: IntegrityLogEntry,
}

/// Moves and failures accumulated over one run.
#[derive(Default)]
struct Tally {
    moves: Vec<DisplayIdChange>,
    failures: Vec<MoveFailure>,
}

impl Tally {
    fn push(&mut self, outcome: Result<DisplayIdChange, MoveFailure>) {
        match outcome {
            Ok(change) => self.moves.push(change),
            Err(failure) => self.failures.push(failure),
        }
    }

    fn fail(&mut self, record_id: RecordId, err: &LedgerError) {
        self.failures.push(failure(record_id, err));
    }
}

fn failure(record_id: RecordId, err: &LedgerError) -> MoveFailure {
    MoveFailure {
        record_id,
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

impl Ledger {
    /// Move every non-voided record of `sources` onto `target`, then
    /// soft-delete each source that moved cleanly.
    pub fn merge(
        &self,
        actor: &Actor,
        target: &ThreadId,
        sources: &[ThreadId],
        reason: &str,
    ) -> LedgerResult<MergeOutcome> {
        let reason = required_reason(reason)?;
        let target = self.live_thread(target)?;
        if sources.is_empty() {
            return Err(LedgerError::validation("merge needs at least one source thread"));
        }
        let distinct: BTreeSet<&ThreadId> = sources.iter().collect();
        if distinct.len() != sources.len() || distinct.contains(&&target.id) {
            return Err(LedgerError::validation(
                "merge sources must be distinct and exclude the target",
            ));
        }
        let sources = sources
            .iter()
            .map(|id| {
                let thread = self.live_thread(id)?;
                if thread.portfolio_id != target.portfolio_id {
                    return Err(LedgerError::validation(format!(
                        "thread {} belongs to another portfolio",
                        thread.prefix()
                    )));
                }
                Ok(thread)
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let mut tally = Tally::default();
        let mut deleted_threads = Vec::new();
        for source in &sources {
            let failures_before = tally.failures.len();
            for record in self.records.records_in_thread(&source.id)? {
                if record.is_voided() {
                    continue;
                }
                tally.push(self.move_one(actor, &record, &target, MoveOperation::Merge, &reason));
            }

            if tally.failures.len() == failures_before {
                self.threads.soft_delete_thread(&source.id, self.clock.now())?;
                info!(thread_id = %source.id, prefix = %source.prefix(), "source thread retired");
                deleted_threads.push(source.id);
            } else {
                warn!(
                    thread_id = %source.id,
                    failures = tally.failures.len() - failures_before,
                    "source thread kept because some records did not move"
                );
            }
        }

        let entry = self.log_run(
            actor,
            MoveOperation::Merge,
            &target,
            sources.iter().map(|s| s.id).collect(),
            reason,
            tally,
        );
        Ok(MergeOutcome {
            entry,
            deleted_threads,
        })
    }

    /// Open a new thread beside `source` and move the named records onto it.
    pub fn split(
        &self,
        actor: &Actor,
        source: &ThreadId,
        record_ids: &[RecordId],
        new_title: &str,
        reason: &str,
    ) -> LedgerResult<SplitOutcome> {
        let reason = required_reason(reason)?;
        if record_ids.is_empty() {
            return Err(LedgerError::validation("split needs at least one record"));
        }
        let source = self.live_thread(source)?;
        let thread = self.open_thread(
            actor,
            &source.portfolio_id,
            &source.trust_id,
            ThreadDetails {
                title: new_title.to_string(),
                category: source.category,
                primary_party: source.primary_party.clone(),
                external_ref: None,
            },
        )?;

        let mut tally = Tally::default();
        for record_id in unique(record_ids) {
            match self.movable(record_id) {
                Ok(record) if record.thread_id != source.id => tally.fail(
                    *record_id,
                    &LedgerError::validation(format!(
                        "record is filed under {}, not {}",
                        record.display_id,
                        source.prefix()
                    )),
                ),
                Ok(record) => {
                    tally.push(self.move_one(
                        actor,
                        &record,
                        &thread,
                        MoveOperation::Split,
                        &reason,
                    ))
                }
                Err(e) => tally.fail(*record_id, &e),
            }
        }

        let entry = self.log_run(
            actor,
            MoveOperation::Split,
            &thread,
            vec![source.id],
            reason,
            tally,
        );
        Ok(SplitOutcome { thread, entry })
    }

    /// Move an arbitrary set of records onto `target`. Records already on
    /// the target are left alone.
    pub fn reassign(
        &self,
        actor: &Actor,
        record_ids: &[RecordId],
        target: &ThreadId,
        reason: &str,
    ) -> LedgerResult<IntegrityLogEntry> {
        let reason = required_reason(reason)?;
        if record_ids.is_empty() {
            return Err(LedgerError::validation("reassign needs at least one record"));
        }
        let target = self.live_thread(target)?;

        let mut tally = Tally::default();
        let mut source_ids = BTreeSet::new();
        for record_id in unique(record_ids) {
            let record = match self.movable(record_id) {
                Ok(record) => record,
                Err(e) => {
                    tally.fail(*record_id, &e);
                    continue;
                }
            };
            if record.portfolio_id != target.portfolio_id {
                tally.fail(
                    *record_id,
                    &LedgerError::validation("record belongs to another portfolio"),
                );
                continue;
            }
            if record.thread_id == target.id {
                debug!(record_id = %record.id, "already on target thread");
                continue;
            }
            source_ids.insert(record.thread_id);
            tally.push(self.move_one(actor, &record, &target, MoveOperation::Reassign, &reason));
        }

        Ok(self.log_run(
            actor,
            MoveOperation::Reassign,
            &target,
            source_ids.into_iter().collect(),
            reason,
            tally,
        ))
    }

    /// A record that exists and is not voided.
    fn movable(&self, record_id: &RecordId) -> LedgerResult<GovernanceRecord> {
        let record = self.record(record_id)?;
        if record.is_voided() {
            return Err(LedgerError::transition(
                TransitionCode::RecordVoided,
                "voided records are not moved",
            ));
        }
        Ok(record)
    }

    fn move_one(
        &self,
        actor: &Actor,
        record: &GovernanceRecord,
        to: &LedgerThread,
        operation: MoveOperation,
        reason: &str,
    ) -> Result<DisplayIdChange, MoveFailure> {
        let (display_id, sub) = self
            .allocator
            .allocate_next(&to.id)
            .map_err(|e| failure(record.id, &e))?;

        let at = self.clock.now();
        let cmd = MoveRecord {
            record_id: record.id,
            expected_thread: record.thread_id,
            to_thread: to.id,
            sub,
            display_id: display_id.clone(),
            breadcrumb: ThreadMove {
                operation,
                from_thread_id: record.thread_id,
                from_display_id: record.display_id.clone(),
                to_thread_id: to.id,
                to_display_id: display_id.clone(),
                reason: reason.to_string(),
                moved_by: actor.user_id.clone(),
                at,
            },
        };
        let moved = self.records.move_record(&cmd).map_err(|e| {
            warn!(
                record_id = %record.id,
                wasted = %display_id,
                error = %e,
                "move failed, sub-number wasted"
            );
            failure(record.id, &LedgerError::from(e))
        })?;

        debug!(record_id = %moved.id, from = %record.display_id, to = %display_id, "record moved");
        self.audit.record(
            event(actor, &moved, None, EventType::Moved, at)
                .with_meta("operation", operation.to_string())
                .with_meta("from", record.display_id.to_string())
                .with_meta("to", display_id.to_string())
                .with_meta("reason", reason),
        );
        Ok(DisplayIdChange {
            record_id: record.id,
            before: record.display_id.clone(),
            after: display_id,
        })
    }

    fn log_run(
        &self,
        actor: &Actor,
        operation: MoveOperation,
        target: &LedgerThread,
        source_thread_ids: Vec<ThreadId>,
        reason: String,
        tally: Tally,
    ) -> IntegrityLogEntry {
        let entry = IntegrityLogEntry {
            id: IntegrityEntryId::new(),
            operation,
            portfolio_id: target.portfolio_id.clone(),
            actor_id: actor.user_id.clone(),
            acting_as_user_id: actor.acting_as.clone(),
            reason,
            target_thread_id: target.id,
            source_thread_ids,
            moves: tally.moves,
            failures: tally.failures,
            at: self.clock.now(),
        };
        info!(
            operation = %operation,
            target = %target.prefix(),
            moved = entry.moves.len(),
            failed = entry.failures.len(),
            "thread maintenance finished"
        );
        self.audit.record_integrity(&entry);
        entry
    }
}

fn required_reason(reason: &str) -> LedgerResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LedgerError::validation("a reason is required"));
    }
    Ok(reason.to_string())
}

fn unique(ids: &[RecordId]) -> impl Iterator<Item = &RecordId> {
    let mut seen = BTreeSet::new();
    ids.iter().filter(move |id| seen.insert(**id))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::testing::Harness;
    use crate::LedgerConfig;

    fn subs_on(h: &Harness, thread: &ThreadId) -> Vec<u32> {
        h.ledger
            .records_in_thread(thread)
            .unwrap()
            .iter()
            .map(|r| r.sub)
            .collect()
    }

    #[test]
    fn merge_conserves_records_and_retires_sources() {
        let h = Harness::new();
        let target = h.thread("Target");
        let a = h.thread("Source A");
        let b = h.thread("Source B");

        h.sealed_on(target, "t1");
        let a1 = h.sealed_on(a, "a1");
        let a2 = h.record_on(a, "a2");
        let a3 = h.record_on(a, "a3");
        h.ledger.void(&h.actor, &a3.record_id, "withdrawn").unwrap();
        let b1 = h.sealed_on(b, "b1");
        let b2 = h.record_on(b, "b2");

        h.tick();
        let outcome = h.ledger.merge(&h.actor, &target, &[a, b], "consolidate").unwrap();

        assert_eq!(outcome.entry.moves.len(), 4);
        assert!(outcome.entry.failures.is_empty());
        assert_eq!(outcome.deleted_threads, vec![a, b]);
        assert_eq!(subs_on(&h, &target), vec![1, 2, 3, 4, 5]);

        // The voided record stays where it was.
        let voided = h.ledger.record(&a3.record_id).unwrap();
        assert_eq!(voided.thread_id, a);
        assert_eq!(subs_on(&h, &a), vec![3]);
        assert!(subs_on(&h, &b).is_empty());

        for moved in [&a1, &a2, &b1, &b2] {
            let record = h.ledger.record(&moved.record_id).unwrap();
            assert_eq!(record.thread_id, target);
            assert_eq!(record.merge_history.len(), 1);
            assert_eq!(record.merge_history[0].from_display_id, moved.display_id);
            assert_eq!(record.merge_history[0].operation, MoveOperation::Merge);
        }

        let before: HashSet<_> = outcome.entry.moves.iter().map(|m| m.before.clone()).collect();
        let after: HashSet<_> = outcome.entry.moves.iter().map(|m| m.after.clone()).collect();
        assert_eq!(before.len(), 4);
        assert_eq!(after.len(), 4);
        assert!(before.is_disjoint(&after));

        for id in [a, b] {
            let thread = h.ledger.thread(&id).unwrap();
            assert!(thread.is_deleted());
            assert!(thread.next_sub > 1);
        }
        assert_eq!(h.ledger.integrity_log(&h.portfolio).unwrap(), vec![outcome.entry]);
    }

    #[test]
    fn moved_records_answer_to_old_ids_and_keep_their_chain() {
        let h = Harness::new();
        let target = h.thread("Target");
        let source = h.thread("Source");
        let sealed = h.sealed_on(source, "Keep me");

        h.tick();
        h.ledger.merge(&h.actor, &target, &[source], "tidy").unwrap();

        let old = h.ledger.resolve_display_id(&sealed.display_id.to_string()).unwrap();
        assert_eq!(old.record.id, sealed.record_id);
        assert!(!old.current);
        let new = h.ledger.resolve_display_id(&old.record.display_id.to_string()).unwrap();
        assert!(new.current);

        assert!(h.ledger.verify_record(&sealed.record_id).unwrap().is_intact());
        let events = h.ledger.events(&sealed.record_id).unwrap();
        assert_eq!(events.last().map(|e| e.event_type), Some(EventType::Moved));
    }

    #[test]
    fn merge_keeps_a_source_that_could_not_be_emptied() {
        let h = Harness::with_config(LedgerConfig {
            max_sub: 2,
            ..LedgerConfig::default()
        });
        let target = h.thread("Target");
        let source = h.thread("Source");
        h.record_on(target, "t1");
        h.record_on(source, "s1");
        h.record_on(source, "s2");

        let outcome = h.ledger.merge(&h.actor, &target, &[source], "squeeze").unwrap();
        assert_eq!(outcome.entry.moves.len(), 1);
        assert_eq!(outcome.entry.failures.len(), 1);
        assert_eq!(outcome.entry.failures[0].code, "ALLOCATION_EXHAUSTED");
        assert!(outcome.deleted_threads.is_empty());
        assert!(!h.ledger.thread(&source).unwrap().is_deleted());
        assert_eq!(subs_on(&h, &source), vec![2]);
    }

    #[test]
    fn merge_validates_its_inputs() {
        let h = Harness::new();
        let target = h.thread("Target");
        let source = h.thread("Source");

        for (sources, reason) in [
            (vec![], "r"),
            (vec![target], "r"),
            (vec![source, source], "r"),
            (vec![source], " "),
        ] {
            assert!(
                matches!(
                    h.ledger.merge(&h.actor, &target, &sources, reason),
                    Err(LedgerError::Validation(_))
                ),
                "{sources:?} / {reason:?}"
            );
        }

        h.ledger.merge(&h.actor, &target, &[source], "once").unwrap();
        assert_eq!(
            h.ledger
                .merge(&h.actor, &target, &[source], "twice")
                .unwrap_err()
                .code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn split_moves_only_named_records() {
        let h = Harness::new();
        let source = h.thread("Dispute with contractor");
        let other = h.thread("Unrelated");
        let keep = h.sealed_on(source, "keep");
        let go = h.sealed_on(source, "go");
        let voided = h.record_on(source, "voided");
        h.ledger.void(&h.actor, &voided.record_id, "dup").unwrap();
        let stranger = h.record_on(other, "stranger");

        h.tick();
        let outcome = h
            .ledger
            .split(
                &h.actor,
                &source,
                &[go.record_id, voided.record_id, stranger.record_id, go.record_id],
                "Roof claim",
                "separate matter",
            )
            .unwrap();

        assert_eq!(outcome.thread.group, 3);
        assert_eq!(outcome.thread.category, h.ledger.thread(&source).unwrap().category);
        assert_eq!(outcome.entry.moves.len(), 1);
        assert_eq!(outcome.entry.moves[0].after.to_string(), "RF000000001US-3.001");
        let codes: Vec<&str> = outcome.entry.failures.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["RECORD_VOIDED", "VALIDATION_ERROR"]);
        assert_eq!(outcome.entry.source_thread_ids, vec![source]);

        assert_eq!(h.ledger.record(&keep.record_id).unwrap().thread_id, source);
        assert_eq!(h.ledger.record(&go.record_id).unwrap().thread_id, outcome.thread.id);
        assert!(!h.ledger.thread(&source).unwrap().is_deleted());
    }

    #[test]
    fn reassign_moves_between_threads_and_reports_failures() {
        let h = Harness::new();
        let x = h.thread("X");
        let y = h.thread("Y");
        let target = h.thread("Target");
        let on_x = h.sealed_on(x, "x");
        let on_y = h.record_on(y, "y");
        let already = h.record_on(target, "already");
        let missing = RecordId::new();

        h.tick();
        let entry = h
            .ledger
            .reassign(
                &h.actor,
                &[on_x.record_id, on_y.record_id, already.record_id, missing],
                &target,
                "refile",
            )
            .unwrap();

        assert_eq!(entry.operation, MoveOperation::Reassign);
        assert_eq!(entry.moves.len(), 2);
        assert_eq!(entry.failures.len(), 1);
        assert_eq!(entry.failures[0].record_id, missing);
        assert_eq!(entry.failures[0].code, "NOT_FOUND");
        let sources: HashSet<ThreadId> = entry.source_thread_ids.iter().copied().collect();
        assert_eq!(sources, HashSet::from([x, y]));
        assert_eq!(subs_on(&h, &target), vec![1, 2, 3]);
        assert!(!h.ledger.thread(&x).unwrap().is_deleted());
        assert_eq!(h.ledger.record(&already.record_id).unwrap().sub, 1);
    }

    #[test]
    fn moved_away_ids_are_never_reissued() {
        let h = Harness::new();
        let source = h.thread("Source");
        let target = h.thread("Target");
        let first = h.record_on(source, "first");
        h.ledger
            .reassign(&h.actor, &[first.record_id], &target, "move")
            .unwrap();

        let next = h.record_on(source, "second");
        assert_ne!(next.display_id, first.display_id);
        assert_eq!(next.display_id.sub(), 2);
    }

    #[test]
    fn retired_groups_are_not_handed_to_new_threads() {
        let h = Harness::new();
        let target = h.thread("Target");
        let source = h.thread("Source");
        let old = h.sealed_on(source, "before merge");
        assert_eq!(old.display_id.to_string(), "RF000000001US-2.001");

        h.tick();
        h.ledger.merge(&h.actor, &target, &[source], "consolidate").unwrap();

        let fresh_thread = h.thread("New matter");
        assert_eq!(h.ledger.thread(&fresh_thread).unwrap().group, 3);
        let fresh = h.record_on(fresh_thread, "unrelated");
        assert_eq!(fresh.display_id.to_string(), "RF000000001US-3.001");

        let moved = h.ledger.record(&old.record_id).unwrap();
        assert!(moved
            .merge_history
            .iter()
            .all(|m| m.from_display_id != fresh.display_id));
        assert_ne!(fresh.display_id, moved.display_id);

        let resolved = h.ledger.resolve_display_id("RF000000001US-2.001").unwrap();
        assert_eq!(resolved.record.id, old.record_id);
        assert!(!resolved.current);
    }
}
