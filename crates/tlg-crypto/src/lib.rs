//! Hash chain engine for the Trust Ledger.
//!
//! Provides a locale-independent canonical JSON encoding, domain-separated
//! BLAKE3 hashing, the revision content hash, and verification of the
//! parent-hash chain that links every finalized version of a record.
//!
//! All crypto operations wrap established libraries -- no custom cryptography.

pub mod canonical;
pub mod chain;
pub mod hasher;

pub use canonical::canonical_json;
pub use chain::{compute_content_hash, ChainError, ChainLink, HashChainVerifier, RevisionHashInput};
pub use hasher::ContentHasher;
