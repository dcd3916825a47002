use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tlg_types::{
    Base, DisplayId, GovernanceAttestation, GovernanceEvent, GovernanceRecord,
    GovernanceRevision, IntegrityLogEntry, LedgerThread, PortfolioId, RecordId, RecordStatus,
    RevisionId, ThreadId, Timestamp,
};

use crate::command::{FinalizeRevision, MoveRecord, OpenAmendment, UpdateDraft, VoidRecord};
use crate::error::{Precondition, StoreError, StoreResult};
use crate::traits::{EventStore, IntegrityLogStore, RecordStore, ThreadStore};

/// In-memory store for tests, the CLI, and embedding.
///
/// All state sits behind one `RwLock`. Every conditional update checks its
/// conditions and applies its effects under a single write guard, which is
/// what makes them atomic with respect to each other.
pub struct InMemoryStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    bases: HashMap<PortfolioId, Base>,
    threads: HashMap<ThreadId, LedgerThread>,
    /// Every group a thread has ever held, deleted threads included.
    groups: HashMap<(PortfolioId, Base, u32), ThreadId>,
    records: HashMap<RecordId, GovernanceRecord>,
    /// Uniqueness index over `(thread, sub)`, i.e. over display ids.
    slots: HashMap<(ThreadId, u32), RecordId>,
    revisions: HashMap<RevisionId, GovernanceRevision>,
    record_revisions: HashMap<RecordId, Vec<RevisionId>>,
    events: Vec<GovernanceEvent>,
    attestations: Vec<GovernanceAttestation>,
    integrity: Vec<IntegrityLogEntry>,
}

/// Serializable image of an [`InMemoryStore`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub bases: BTreeMap<PortfolioId, Base>,
    pub threads: Vec<LedgerThread>,
    pub records: Vec<GovernanceRecord>,
    pub revisions: Vec<GovernanceRevision>,
    pub events: Vec<GovernanceEvent>,
    pub attestations: Vec<GovernanceAttestation>,
    pub integrity: Vec<IntegrityLogEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Rebuild a store, and its uniqueness indexes, from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let mut state = StoreState {
            bases: snapshot.bases.into_iter().collect(),
            events: snapshot.events,
            attestations: snapshot.attestations,
            integrity: snapshot.integrity,
            ..StoreState::default()
        };

        for thread in snapshot.threads {
            let key = (thread.portfolio_id.clone(), thread.base.clone(), thread.group);
            if state.groups.insert(key, thread.id).is_some() {
                return Err(corrupt(format!("duplicate group {}", thread.prefix())));
            }
            state.threads.insert(thread.id, thread);
        }

        for record in snapshot.records {
            if state.slots.insert((record.thread_id, record.sub), record.id).is_some() {
                return Err(corrupt(format!("duplicate display id {}", record.display_id)));
            }
            state.records.insert(record.id, record);
        }

        let mut revisions = snapshot.revisions;
        revisions.sort_by_key(|r| (r.record_id, r.version));
        for revision in revisions {
            state
                .record_revisions
                .entry(revision.record_id)
                .or_default()
                .push(revision.id);
            state.revisions.insert(revision.id, revision);
        }

        Ok(Self {
            inner: RwLock::new(state),
        })
    }

    /// Copy the full contents into a serializable snapshot.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let state = self.read()?;
        let mut threads: Vec<_> = state.threads.values().cloned().collect();
        threads.sort_by_key(|t| t.id);
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        let mut revisions: Vec<_> = state.revisions.values().cloned().collect();
        revisions.sort_by_key(|r| (r.record_id, r.version));

        Ok(StoreSnapshot {
            bases: state.bases.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            threads,
            records,
            revisions,
            events: state.events.clone(),
            attestations: state.attestations.clone(),
            integrity: state.integrity.clone(),
        })
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("InMemoryStore");
        if let Ok(state) = self.inner.read() {
            debug
                .field("threads", &state.threads.len())
                .field("records", &state.records.len())
                .field("revisions", &state.revisions.len())
                .field("events", &state.events.len());
        }
        debug.finish()
    }
}

fn corrupt(reason: String) -> StoreError {
    StoreError::Serialization(format!("corrupt snapshot: {reason}"))
}

fn failed(condition: Precondition) -> StoreError {
    StoreError::PreconditionFailed(condition)
}

impl ThreadStore for InMemoryStore {
    fn register_base(&self, portfolio: &PortfolioId, base: &Base) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.bases.get(portfolio) {
            Some(existing) if existing == base => Ok(()),
            Some(existing) => Err(StoreError::BaseAlreadyRegistered {
                portfolio: portfolio.to_string(),
                existing: existing.to_string(),
            }),
            None => {
                state.bases.insert(portfolio.clone(), base.clone());
                Ok(())
            }
        }
    }

    fn portfolio_base(&self, portfolio: &PortfolioId) -> StoreResult<Option<Base>> {
        Ok(self.read()?.bases.get(portfolio).cloned())
    }

    fn used_groups(&self, portfolio: &PortfolioId, base: &Base) -> StoreResult<Vec<u32>> {
        let state = self.read()?;
        let mut groups: Vec<u32> = state
            .groups
            .keys()
            .filter(|(p, b, _)| p == portfolio && b == base)
            .map(|(_, _, group)| *group)
            .collect();
        groups.sort_unstable();
        Ok(groups)
    }

    fn insert_thread(&self, thread: &LedgerThread) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.threads.contains_key(&thread.id) {
            return Err(StoreError::UniqueConflict {
                constraint: "thread id",
            });
        }
        let key = (thread.portfolio_id.clone(), thread.base.clone(), thread.group);
        if state.groups.contains_key(&key) {
            return Err(StoreError::UniqueConflict {
                constraint: "portfolio base group",
            });
        }
        state.groups.insert(key, thread.id);
        state.threads.insert(thread.id, thread.clone());
        Ok(())
    }

    fn get_thread(&self, id: &ThreadId) -> StoreResult<Option<LedgerThread>> {
        Ok(self.read()?.threads.get(id).cloned())
    }

    fn list_threads(
        &self,
        portfolio: &PortfolioId,
        include_deleted: bool,
    ) -> StoreResult<Vec<LedgerThread>> {
        let state = self.read()?;
        let mut threads: Vec<_> = state
            .threads
            .values()
            .filter(|t| &t.portfolio_id == portfolio && (include_deleted || !t.is_deleted()))
            .cloned()
            .collect();
        threads.sort_by(|a, b| {
            a.base
                .cmp(&b.base)
                .then(a.group.cmp(&b.group))
                .then(a.id.cmp(&b.id))
        });
        Ok(threads)
    }

    fn increment_next_sub(&self, id: &ThreadId, max_sub: u32, at: Timestamp) -> StoreResult<u32> {
        let mut state = self.write()?;
        let thread = state
            .threads
            .get_mut(id)
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| StoreError::not_found("thread", id))?;
        if thread.next_sub > max_sub {
            return Err(StoreError::Exhausted {
                what: "sub-numbers",
                limit: max_sub,
            });
        }
        let issued = thread.next_sub;
        thread.next_sub += 1;
        thread.updated_at = at;
        Ok(issued)
    }

    fn soft_delete_thread(&self, id: &ThreadId, at: Timestamp) -> StoreResult<LedgerThread> {
        let mut state = self.write()?;
        let thread = state
            .threads
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("thread", id))?;
        if thread.is_deleted() {
            return Err(failed(Precondition::ThreadDeleted));
        }
        thread.deleted_at = Some(at);
        thread.updated_at = at;
        Ok(thread.clone())
    }
}

impl RecordStore for InMemoryStore {
    fn insert_record(
        &self,
        record: &GovernanceRecord,
        revision: &GovernanceRevision,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let thread = state
            .threads
            .get(&record.thread_id)
            .ok_or_else(|| StoreError::not_found("thread", record.thread_id))?;
        if thread.is_deleted() {
            return Err(failed(Precondition::ThreadDeleted));
        }
        if state.records.contains_key(&record.id) {
            return Err(StoreError::UniqueConflict {
                constraint: "record id",
            });
        }
        if state.slots.contains_key(&(record.thread_id, record.sub)) {
            return Err(StoreError::UniqueConflict {
                constraint: "thread sub",
            });
        }
        if state.revisions.contains_key(&revision.id) {
            return Err(StoreError::UniqueConflict {
                constraint: "revision id",
            });
        }

        state.slots.insert((record.thread_id, record.sub), record.id);
        state.records.insert(record.id, record.clone());
        state.record_revisions.insert(record.id, vec![revision.id]);
        state.revisions.insert(revision.id, revision.clone());
        Ok(())
    }

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<GovernanceRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    fn get_revision(&self, id: &RevisionId) -> StoreResult<Option<GovernanceRevision>> {
        Ok(self.read()?.revisions.get(id).cloned())
    }

    fn list_revisions(&self, record: &RecordId) -> StoreResult<Vec<GovernanceRevision>> {
        let state = self.read()?;
        Ok(state
            .record_revisions
            .get(record)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.revisions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn records_in_thread(&self, thread: &ThreadId) -> StoreResult<Vec<GovernanceRecord>> {
        let state = self.read()?;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| &r.thread_id == thread)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.sub);
        Ok(records)
    }

    fn find_by_display_id(&self, display_id: &DisplayId) -> StoreResult<Vec<GovernanceRecord>> {
        let state = self.read()?;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| r.answers_to(display_id))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn update_draft(&self, cmd: &UpdateDraft) -> StoreResult<GovernanceRevision> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let revision = state
            .revisions
            .get_mut(&cmd.revision_id)
            .ok_or_else(|| StoreError::not_found("revision", cmd.revision_id))?;
        if revision.is_finalized() {
            return Err(failed(Precondition::AlreadyFinalized));
        }
        let record = state
            .records
            .get(&revision.record_id)
            .ok_or_else(|| StoreError::not_found("record", revision.record_id))?;
        if record.is_voided() {
            return Err(failed(Precondition::RecordVoided));
        }

        revision.payload = cmd.payload.clone();
        revision.draft_seq += 1;
        Ok(revision.clone())
    }

    fn finalize_revision(
        &self,
        cmd: &FinalizeRevision,
    ) -> StoreResult<(GovernanceRecord, GovernanceRevision)> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let revision = state
            .revisions
            .get_mut(&cmd.revision_id)
            .ok_or_else(|| StoreError::not_found("revision", cmd.revision_id))?;
        if revision.is_finalized() {
            return Err(failed(Precondition::AlreadyFinalized));
        }
        if revision.draft_seq != cmd.expected_draft_seq {
            return Err(failed(Precondition::DraftChanged));
        }
        let record = state
            .records
            .get_mut(&revision.record_id)
            .ok_or_else(|| StoreError::not_found("record", revision.record_id))?;
        if record.is_voided() {
            return Err(failed(Precondition::RecordVoided));
        }
        if record.current_revision_id != revision.id {
            return Err(failed(Precondition::RevisionNotCurrent));
        }

        revision.content_hash = Some(cmd.content_hash);
        revision.finalized_at = Some(cmd.finalized_at);
        revision.finalized_by = Some(cmd.finalized_by.clone());

        record.status = RecordStatus::Finalized;
        record.current_revision_id = revision.id;
        record.finalized_at = Some(cmd.finalized_at);
        record.finalized_by = Some(cmd.finalized_by.clone());

        Ok((record.clone(), revision.clone()))
    }

    fn open_amendment(&self, cmd: &OpenAmendment) -> StoreResult<GovernanceRecord> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let record = state
            .records
            .get_mut(&cmd.record_id)
            .ok_or_else(|| StoreError::not_found("record", cmd.record_id))?;
        match record.status {
            RecordStatus::Voided => return Err(failed(Precondition::RecordVoided)),
            RecordStatus::Draft => return Err(failed(Precondition::RecordNotFinalized)),
            RecordStatus::Finalized => {}
        }
        if record.current_revision_id != cmd.expected_current {
            return Err(failed(Precondition::RevisionNotCurrent));
        }
        let current_finalized = state
            .revisions
            .get(&record.current_revision_id)
            .map(GovernanceRevision::is_finalized)
            .unwrap_or(false);
        if !current_finalized {
            return Err(failed(Precondition::CurrentRevisionOpen));
        }
        let versions = state.record_revisions.entry(record.id).or_default();
        let version_taken = versions.iter().any(|id| {
            state
                .revisions
                .get(id)
                .is_some_and(|r| r.version == cmd.revision.version)
        });
        if version_taken || state.revisions.contains_key(&cmd.revision.id) {
            return Err(StoreError::UniqueConflict {
                constraint: "record version",
            });
        }

        versions.push(cmd.revision.id);
        state.revisions.insert(cmd.revision.id, cmd.revision.clone());
        record.status = RecordStatus::Draft;
        record.current_revision_id = cmd.revision.id;
        Ok(record.clone())
    }

    fn void_record(&self, cmd: &VoidRecord) -> StoreResult<GovernanceRecord> {
        let mut state = self.write()?;
        let record = state
            .records
            .get_mut(&cmd.record_id)
            .ok_or_else(|| StoreError::not_found("record", cmd.record_id))?;
        if record.is_voided() {
            return Err(failed(Precondition::RecordVoided));
        }
        record.status = RecordStatus::Voided;
        record.voided_at = Some(cmd.voided_at);
        record.voided_by = Some(cmd.voided_by.clone());
        record.void_reason = Some(cmd.reason.clone());
        Ok(record.clone())
    }

    fn move_record(&self, cmd: &MoveRecord) -> StoreResult<GovernanceRecord> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let destination = state
            .threads
            .get(&cmd.to_thread)
            .ok_or_else(|| StoreError::not_found("thread", cmd.to_thread))?;
        if destination.is_deleted() {
            return Err(failed(Precondition::ThreadDeleted));
        }
        if state.slots.contains_key(&(cmd.to_thread, cmd.sub)) {
            return Err(StoreError::UniqueConflict {
                constraint: "thread sub",
            });
        }
        let record = state
            .records
            .get_mut(&cmd.record_id)
            .ok_or_else(|| StoreError::not_found("record", cmd.record_id))?;
        if record.thread_id != cmd.expected_thread {
            return Err(failed(Precondition::RecordMoved));
        }

        state.slots.remove(&(record.thread_id, record.sub));
        state.slots.insert((cmd.to_thread, cmd.sub), record.id);
        record.thread_id = cmd.to_thread;
        record.sub = cmd.sub;
        record.display_id = cmd.display_id.clone();
        record.merge_history.push(cmd.breadcrumb.clone());
        Ok(record.clone())
    }

    fn insert_attestation(&self, attestation: &GovernanceAttestation) -> StoreResult<()> {
        let mut state = self.write()?;
        let revision = state
            .revisions
            .get(&attestation.revision_id)
            .ok_or_else(|| StoreError::not_found("revision", attestation.revision_id))?;
        if !revision.is_finalized() {
            return Err(failed(Precondition::RevisionNotFinalized));
        }
        state.attestations.push(attestation.clone());
        Ok(())
    }

    fn list_attestations(&self, record: &RecordId) -> StoreResult<Vec<GovernanceAttestation>> {
        let state = self.read()?;
        Ok(state
            .attestations
            .iter()
            .filter(|a| &a.record_id == record)
            .cloned()
            .collect())
    }
}

impl EventStore for InMemoryStore {
    fn append_event(&self, event: &GovernanceEvent) -> StoreResult<()> {
        self.write()?.events.push(event.clone());
        Ok(())
    }

    fn events_for_record(&self, record: &RecordId) -> StoreResult<Vec<GovernanceEvent>> {
        let state = self.read()?;
        Ok(state
            .events
            .iter()
            .filter(|e| &e.record_id == record)
            .cloned()
            .collect())
    }
}

impl IntegrityLogStore for InMemoryStore {
    fn append_integrity_entry(&self, entry: &IntegrityLogEntry) -> StoreResult<()> {
        self.write()?.integrity.push(entry.clone());
        Ok(())
    }

    fn integrity_entries(&self, portfolio: &PortfolioId) -> StoreResult<Vec<IntegrityLogEntry>> {
        let state = self.read()?;
        Ok(state
            .integrity
            .iter()
            .filter(|e| &e.portfolio_id == portfolio)
            .cloned()
            .collect())
    }
}
