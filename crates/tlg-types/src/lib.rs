//! Foundation types for the Trust Ledger (TLG).
//!
//! Every other TLG crate depends on `tlg-types`. It defines the persisted
//! shapes of the ledger and the small value types they are built from.
//!
//! # Key Types
//!
//! - [`DisplayId`] / [`ThreadPrefix`] / [`Base`] -- human-readable `<base>-<group>.<sub>` identifiers
//! - [`LedgerThread`] -- an administrative matter that issues sub-numbers
//! - [`GovernanceRecord`] / [`GovernanceRevision`] -- records and their versioned payloads
//! - [`GovernanceEvent`] -- append-only audit rows
//! - [`GovernanceAttestation`] -- self-asserted sign-offs on finalized revisions
//! - [`IntegrityLogEntry`] -- before/after summary of a thread maintenance run
//! - [`Payload`] / [`ModulePayload`] -- opaque stored content and its typed, validated view
//! - [`ContentHash`] -- 256-bit revision digest

pub mod actor;
pub mod attestation;
pub mod display;
pub mod error;
pub mod event;
pub mod hash;
pub mod ids;
pub mod integrity;
pub mod payload;
pub mod record;
pub mod revision;
pub mod thread;

/// Wall-clock instant used on every persisted row.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub use actor::Actor;
pub use attestation::{GovernanceAttestation, SignatureType};
pub use display::{Base, DisplayId, ThreadPrefix, MAX_GROUP, MAX_SUB};
pub use error::TypeError;
pub use event::{EventType, GovernanceEvent};
pub use hash::ContentHash;
pub use ids::{
    AttestationId, EventId, IntegrityEntryId, PortfolioId, RecordId, RevisionId, ThreadId,
    TrustId, UserId,
};
pub use integrity::{DisplayIdChange, IntegrityLogEntry, MoveFailure, MoveOperation};
pub use payload::{ModulePayload, ModuleType, Payload};
pub use record::{GovernanceRecord, RecordStatus, ThreadMove};
pub use revision::{ChangeType, GovernanceRevision, RevisionState};
pub use thread::{LedgerThread, ThreadCategory};
