//! Append-only audit trail.
//!
//! Writes are attempted synchronously before an operation returns, but they
//! are best-effort: a failed append is logged at error level and the
//! transition it describes stays committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tlg_store::{EventStore, IntegrityLogStore};
use tlg_types::{
    Actor, EventId, EventType, GovernanceEvent, GovernanceRecord, IntegrityLogEntry, PortfolioId,
    RecordId, RevisionId, Timestamp,
};
use tracing::{debug, error};

use crate::error::LedgerResult;

/// Event and integrity-log writer.
#[derive(Clone)]
pub struct AuditLog {
    events: Arc<dyn EventStore>,
    integrity: Arc<dyn IntegrityLogStore>,
}

impl AuditLog {
    pub fn new(events: Arc<dyn EventStore>, integrity: Arc<dyn IntegrityLogStore>) -> Self {
        Self { events, integrity }
    }

    /// Append one event. Never fails the caller.
    pub fn record(&self, event: GovernanceEvent) {
        match self.events.append_event(&event) {
            Ok(()) => debug!(
                record_id = %event.record_id,
                event_type = %event.event_type,
                "audit event appended"
            ),
            Err(e) => error!(
                record_id = %event.record_id,
                event_type = %event.event_type,
                error = %e,
                "failed to append audit event"
            ),
        }
    }

    /// Append one integrity log row. Never fails the caller.
    pub fn record_integrity(&self, entry: &IntegrityLogEntry) {
        if let Err(e) = self.integrity.append_integrity_entry(entry) {
            error!(
                entry_id = %entry.id,
                operation = %entry.operation,
                error = %e,
                "failed to append integrity log entry"
            );
        }
    }

    /// Events of a record, oldest first. Ties keep append order.
    pub fn events_for(&self, record: &RecordId) -> LedgerResult<Vec<GovernanceEvent>> {
        let mut events = self.events.events_for_record(record)?;
        events.sort_by_key(|e| e.at);
        Ok(events)
    }

    pub fn integrity_entries(
        &self,
        portfolio: &PortfolioId,
    ) -> LedgerResult<Vec<IntegrityLogEntry>> {
        let mut entries = self.integrity.integrity_entries(portfolio)?;
        entries.sort_by_key(|e| e.at);
        Ok(entries)
    }
}

/// Start an event for `record` performed by `actor`.
pub(crate) fn event(
    actor: &Actor,
    record: &GovernanceRecord,
    revision_id: Option<RevisionId>,
    event_type: EventType,
    at: Timestamp,
) -> GovernanceEvent {
    GovernanceEvent {
        id: EventId::new(),
        record_id: record.id,
        revision_id,
        event_type,
        actor_id: actor.user_id.clone(),
        acting_as_user_id: actor.acting_as.clone(),
        portfolio_id: record.portfolio_id.clone(),
        trust_id: record.trust_id.clone(),
        meta: BTreeMap::new(),
        at,
    }
}

pub(crate) trait WithMeta {
    fn with_meta(self, key: &str, value: impl Into<Value>) -> Self;
}

impl WithMeta for GovernanceEvent {
    fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }
}
