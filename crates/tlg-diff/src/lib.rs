//! Field-level diff between two revision payloads.
//!
//! Payloads are opaque JSON maps, so the diff walks them structurally:
//! nested objects yield dotted paths (`motions.count`), arrays yield indexed
//! paths (`attendees[2]`), and only leaves that actually differ are reported.
//!
//! # Key Types
//!
//! - [`PayloadDiff`] / [`FieldChange`] -- the change list between two payloads

pub mod field_diff;

pub use field_diff::{diff_payloads, diff_values, FieldChange, PayloadDiff};
