use tlg_types::{
    Base, DisplayId, GovernanceAttestation, GovernanceEvent, GovernanceRecord,
    GovernanceRevision, IntegrityLogEntry, LedgerThread, PortfolioId, RecordId, RevisionId,
    ThreadId, Timestamp,
};

use crate::command::{FinalizeRevision, MoveRecord, OpenAmendment, UpdateDraft, VoidRecord};
use crate::error::StoreResult;

/// Thread rows, the portfolio base registry, and the sub-number counter.
///
/// Implementations must satisfy these invariants:
/// - `(portfolio, base, group)` is unique across all threads, soft-deleted
///   ones included; `insert_thread` reports a violation as `UniqueConflict`
///   and writes nothing.
/// - `increment_next_sub` is a single atomic increment-and-return-previous.
///   Two concurrent callers on one thread always observe different values.
///   It must never be emulated as read, then write.
/// - Threads are never hard-deleted.
pub trait ThreadStore: Send + Sync {
    /// Register a portfolio's base, or confirm the one already registered.
    ///
    /// Fails with `BaseAlreadyRegistered` if a different base is on file.
    fn register_base(&self, portfolio: &PortfolioId, base: &Base) -> StoreResult<()>;

    fn portfolio_base(&self, portfolio: &PortfolioId) -> StoreResult<Option<Base>>;

    /// Groups ever held by a thread of `(portfolio, base)`, ascending.
    ///
    /// A soft-deleted thread keeps its group so that display ids issued
    /// under it are never issued again.
    fn used_groups(&self, portfolio: &PortfolioId, base: &Base) -> StoreResult<Vec<u32>>;

    fn insert_thread(&self, thread: &LedgerThread) -> StoreResult<()>;

    /// Read a thread, including soft-deleted ones.
    fn get_thread(&self, id: &ThreadId) -> StoreResult<Option<LedgerThread>>;

    fn list_threads(
        &self,
        portfolio: &PortfolioId,
        include_deleted: bool,
    ) -> StoreResult<Vec<LedgerThread>>;

    /// Atomically return `next_sub` and advance it by one.
    ///
    /// Fails with `NotFound` for a missing or soft-deleted thread, and with
    /// `Exhausted` (without advancing) once `next_sub > max_sub`.
    fn increment_next_sub(&self, id: &ThreadId, max_sub: u32, at: Timestamp) -> StoreResult<u32>;

    /// Mark a thread deleted. `next_sub` and the group are left untouched.
    fn soft_delete_thread(&self, id: &ThreadId, at: Timestamp) -> StoreResult<LedgerThread>;
}

/// Records, revisions, and attestations.
pub trait RecordStore: Send + Sync {
    /// Insert a record together with its first revision.
    ///
    /// `(thread, sub)` must be unused; a collision is `UniqueConflict`.
    fn insert_record(
        &self,
        record: &GovernanceRecord,
        revision: &GovernanceRevision,
    ) -> StoreResult<()>;

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<GovernanceRecord>>;

    fn get_revision(&self, id: &RevisionId) -> StoreResult<Option<GovernanceRevision>>;

    /// All revisions of a record, ordered by version.
    fn list_revisions(&self, record: &RecordId) -> StoreResult<Vec<GovernanceRevision>>;

    /// Records currently filed under a thread, ordered by sub-number.
    fn records_in_thread(&self, thread: &ThreadId) -> StoreResult<Vec<GovernanceRecord>>;

    /// Records whose current or historical display id matches.
    fn find_by_display_id(&self, display_id: &DisplayId) -> StoreResult<Vec<GovernanceRecord>>;

    fn update_draft(&self, cmd: &UpdateDraft) -> StoreResult<GovernanceRevision>;

    fn finalize_revision(
        &self,
        cmd: &FinalizeRevision,
    ) -> StoreResult<(GovernanceRecord, GovernanceRevision)>;

    fn open_amendment(&self, cmd: &OpenAmendment) -> StoreResult<GovernanceRecord>;

    fn void_record(&self, cmd: &VoidRecord) -> StoreResult<GovernanceRecord>;

    fn move_record(&self, cmd: &MoveRecord) -> StoreResult<GovernanceRecord>;

    /// Insert an attestation. The target revision must be finalized.
    fn insert_attestation(&self, attestation: &GovernanceAttestation) -> StoreResult<()>;

    fn list_attestations(&self, record: &RecordId) -> StoreResult<Vec<GovernanceAttestation>>;
}

/// Append-only audit rows. There is deliberately no update or delete.
pub trait EventStore: Send + Sync {
    fn append_event(&self, event: &GovernanceEvent) -> StoreResult<()>;

    /// Events of one record in the order they were appended.
    fn events_for_record(&self, record: &RecordId) -> StoreResult<Vec<GovernanceEvent>>;
}

/// Append-only thread maintenance summaries.
pub trait IntegrityLogStore: Send + Sync {
    fn append_integrity_entry(&self, entry: &IntegrityLogEntry) -> StoreResult<()>;

    fn integrity_entries(&self, portfolio: &PortfolioId) -> StoreResult<Vec<IntegrityLogEntry>>;
}

/// A backend that provides every store the ledger needs.
pub trait LedgerStore: ThreadStore + RecordStore + EventStore + IntegrityLogStore {}

impl<T> LedgerStore for T where T: ThreadStore + RecordStore + EventStore + IntegrityLogStore {}
