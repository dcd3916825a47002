//! Trust Ledger core.
//!
//! Issues permanent `<base>-<group>.<sub>` reference identifiers for
//! administrative matters and keeps an append-only, hash-chained revision
//! history for every governance record filed under them.
//!
//! # Components
//!
//! - [`ThreadAllocator`] -- lowest-free group per thread, atomic sub-numbers
//! - [`lifecycle`] -- pure record/revision state machine
//! - [`Ledger`] -- the operation surface: records, revisions, attestations,
//!   verification and thread maintenance
//! - [`AuditLog`] -- best-effort, append-only event and integrity log writer
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tlg_ledger::{Ledger, LedgerConfig, NewRecord, ThreadDetails, ThreadSpec};
//! use tlg_store::InMemoryStore;
//! use tlg_types::{Actor, ModuleType, Payload, PortfolioId, ThreadCategory, TrustId};
//!
//! let ledger = Ledger::new(Arc::new(InMemoryStore::new()), LedgerConfig::default()).unwrap();
//! let actor = Actor::new("trustee-1");
//! let portfolio = PortfolioId::new("pf-1");
//! ledger.register_base(&actor, &portfolio, "RF000000001US").unwrap();
//!
//! let created = ledger
//!     .create_record(
//!         &actor,
//!         NewRecord {
//!             portfolio_id: portfolio,
//!             trust_id: TrustId::new("trust-1"),
//!             module_type: ModuleType::Minutes,
//!             title: "Annual meeting".into(),
//!             payload: Payload::from_json_str(r#"{"title":"Annual meeting"}"#).unwrap(),
//!             thread: ThreadSpec::New(ThreadDetails::new("Meetings", ThreadCategory::Meeting)),
//!         },
//!     )
//!     .unwrap();
//! assert_eq!(created.display_id.to_string(), "RF000000001US-1.001");
//!
//! let sealed = ledger.finalize(&actor, &created.revision_id).unwrap();
//! assert_eq!(sealed.content_hash.to_hex().len(), 64);
//! ```

pub mod allocator;
pub mod attestation;
pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod maintenance;
pub mod revisions;
pub mod service;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use allocator::{lowest_free_group, ThreadAllocator, ThreadRequest};
pub use attestation::NewAttestation;
pub use audit::AuditLog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{ErrorKind, LedgerError, LedgerResult, TransitionCode};
pub use maintenance::{MergeOutcome, SplitOutcome};
pub use revisions::{
    AmendedRecord, CreatedRecord, FinalizedRevision, NewRecord, RevisionDiff, RevisionSummary,
    ThreadSpec, VoidedRecord,
};
pub use service::{
    AllocatedSub, CreatedThread, Ledger, LedgerStores, ResolvedRecord, ThreadDetails,
};
pub use verify::{ChainReport, ChainViolation, RevisionCheck};
