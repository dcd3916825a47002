//! Persistence primitives for the Trust Ledger.
//!
//! The ledger's correctness rests on a handful of operations that must be
//! atomic at the storage layer. This crate names them as traits so any
//! backend can provide them, and ships an in-memory backend plus a JSON
//! snapshot file for the CLI.
//!
//! # Atomic Primitives
//!
//! - `ThreadStore::insert_thread` -- unique `(portfolio, base, group)` among live threads
//! - `ThreadStore::increment_next_sub` -- single increment-and-return
//! - `RecordStore::insert_record` -- unique `(thread, sub)`
//! - `RecordStore::update_draft` / `finalize_revision` / `open_amendment` /
//!   `void_record` / `move_record` -- conditional updates described by the
//!   [`command`] types
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- one `RwLock` around all state
//! - [`SnapshotFile`] -- loads and atomically saves an [`InMemoryStore`] as JSON
//!
//! # Design Rules
//!
//! 1. A failed condition writes nothing.
//! 2. Events and integrity entries are append-only; there is no delete.
//! 3. Threads are soft-deleted, never removed.

pub mod command;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use command::{FinalizeRevision, MoveRecord, OpenAmendment, UpdateDraft, VoidRecord};
pub use error::{Precondition, StoreError, StoreResult};
pub use file::SnapshotFile;
pub use memory::{InMemoryStore, StoreSnapshot};
pub use traits::{EventStore, IntegrityLogStore, LedgerStore, RecordStore, ThreadStore};
