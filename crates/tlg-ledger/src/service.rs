use std::sync::Arc;

use serde::Serialize;
use tlg_store::{EventStore, IntegrityLogStore, LedgerStore, RecordStore, ThreadStore};
use tlg_types::{
    Actor, Base, DisplayId, GovernanceRecord, GovernanceRevision, IntegrityLogEntry,
    LedgerThread, PortfolioId, RecordId, RevisionId, ThreadCategory, ThreadId, TrustId,
};
use tracing::info;

use crate::allocator::{ThreadAllocator, ThreadRequest};
use crate::audit::AuditLog;
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};

/// Store handles a [`Ledger`] runs against.
#[derive(Clone)]
pub struct LedgerStores {
    pub threads: Arc<dyn ThreadStore>,
    pub records: Arc<dyn RecordStore>,
    pub events: Arc<dyn EventStore>,
    pub integrity: Arc<dyn IntegrityLogStore>,
}

impl LedgerStores {
    /// Use one backend for everything.
    pub fn shared<S: LedgerStore + 'static>(store: Arc<S>) -> Self {
        Self {
            threads: store.clone(),
            records: store.clone(),
            events: store.clone(),
            integrity: store,
        }
    }
}

/// The ledger's operation surface.
///
/// Handlers are stateless: every operation reads what it needs from the
/// stores and relies on their atomic primitives for correctness, so one
/// `Ledger` can be shared across threads.
pub struct Ledger {
    pub(crate) threads: Arc<dyn ThreadStore>,
    pub(crate) records: Arc<dyn RecordStore>,
    pub(crate) audit: AuditLog,
    pub(crate) allocator: ThreadAllocator,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: LedgerConfig,
}

/// Descriptive fields of a new thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadDetails {
    pub title: String,
    pub category: ThreadCategory,
    pub primary_party: Option<String>,
    pub external_ref: Option<String>,
}

impl ThreadDetails {
    pub fn new(title: impl Into<String>, category: ThreadCategory) -> Self {
        Self {
            title: title.into(),
            category,
            primary_party: None,
            external_ref: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedThread {
    pub thread_id: ThreadId,
    pub display_id_prefix: String,
    pub group: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedSub {
    pub display_id: DisplayId,
    pub sub: u32,
}

/// A record found by display id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRecord {
    pub record: GovernanceRecord,
    /// False when the id only matches a pre-move breadcrumb.
    pub current: bool,
}

impl Ledger {
    /// A ledger on a single backend with the system clock.
    pub fn new<S: LedgerStore + 'static>(
        store: Arc<S>,
        config: LedgerConfig,
    ) -> LedgerResult<Self> {
        Self::with_stores(LedgerStores::shared(store), Arc::new(SystemClock), config)
    }

    pub fn with_stores(
        stores: LedgerStores,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> LedgerResult<Self> {
        config.validate()?;
        let allocator = ThreadAllocator::new(stores.threads.clone(), clock.clone(), &config);
        Ok(Self {
            threads: stores.threads,
            records: stores.records,
            audit: AuditLog::new(stores.events, stores.integrity),
            allocator,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ---- Threads ----

    /// Set a portfolio's base. Re-registering the same base is a no-op; a
    /// different one is refused because bases never change.
    pub fn register_base(
        &self,
        actor: &Actor,
        portfolio_id: &PortfolioId,
        base: &str,
    ) -> LedgerResult<Base> {
        let base = Base::new(base)?;
        self.threads.register_base(portfolio_id, &base)?;
        info!(portfolio = %portfolio_id, base = %base, actor = %actor.user_id, "base registered");
        Ok(base)
    }

    pub fn portfolio_base(&self, portfolio_id: &PortfolioId) -> LedgerResult<Base> {
        self.threads
            .portfolio_base(portfolio_id)?
            .ok_or_else(|| LedgerError::not_found("portfolio base", portfolio_id))
    }

    pub fn create_thread(
        &self,
        actor: &Actor,
        portfolio_id: &PortfolioId,
        trust_id: &TrustId,
        details: ThreadDetails,
    ) -> LedgerResult<CreatedThread> {
        let thread = self.open_thread(actor, portfolio_id, trust_id, details)?;
        Ok(CreatedThread {
            thread_id: thread.id,
            display_id_prefix: thread.prefix().to_string(),
            group: thread.group,
        })
    }

    pub(crate) fn open_thread(
        &self,
        actor: &Actor,
        portfolio_id: &PortfolioId,
        trust_id: &TrustId,
        details: ThreadDetails,
    ) -> LedgerResult<LedgerThread> {
        let base = self.portfolio_base(portfolio_id)?;
        let thread = self.allocator.allocate_thread(&ThreadRequest {
            portfolio_id: portfolio_id.clone(),
            trust_id: trust_id.clone(),
            base,
            title: details.title,
            category: details.category,
            primary_party: details.primary_party,
            external_ref: details.external_ref,
        })?;
        info!(
            thread_id = %thread.id,
            prefix = %thread.prefix(),
            actor = %actor.user_id,
            "thread opened"
        );
        Ok(thread)
    }

    /// Reserve the next sub-number on a thread without filing anything.
    ///
    /// The number is consumed even if no record is ever created under it.
    pub fn allocate_sub(&self, actor: &Actor, thread_id: &ThreadId) -> LedgerResult<AllocatedSub> {
        let (display_id, sub) = self.allocator.allocate_next(thread_id)?;
        info!(display_id = %display_id, actor = %actor.user_id, "sub-number reserved");
        Ok(AllocatedSub { display_id, sub })
    }

    /// Read a thread, soft-deleted or not.
    pub fn thread(&self, thread_id: &ThreadId) -> LedgerResult<LedgerThread> {
        self.threads
            .get_thread(thread_id)?
            .ok_or_else(|| LedgerError::not_found("thread", thread_id))
    }

    pub fn threads(
        &self,
        portfolio_id: &PortfolioId,
        include_deleted: bool,
    ) -> LedgerResult<Vec<LedgerThread>> {
        Ok(self.threads.list_threads(portfolio_id, include_deleted)?)
    }

    pub(crate) fn live_thread(&self, thread_id: &ThreadId) -> LedgerResult<LedgerThread> {
        self.threads
            .get_thread(thread_id)?
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| LedgerError::not_found("thread", thread_id))
    }

    // ---- Records ----

    pub fn record(&self, record_id: &RecordId) -> LedgerResult<GovernanceRecord> {
        self.records
            .get_record(record_id)?
            .ok_or_else(|| LedgerError::not_found("record", record_id))
    }

    pub fn revision(&self, revision_id: &RevisionId) -> LedgerResult<GovernanceRevision> {
        self.records
            .get_revision(revision_id)?
            .ok_or_else(|| LedgerError::not_found("revision", revision_id))
    }

    pub fn records_in_thread(&self, thread_id: &ThreadId) -> LedgerResult<Vec<GovernanceRecord>> {
        self.thread(thread_id)?;
        Ok(self.records.records_in_thread(thread_id)?)
    }

    /// Find the record behind a display id, current or from before a move.
    ///
    /// A record currently holding the id wins over historical matches; among
    /// historical matches the most recently moved record wins.
    pub fn resolve_display_id(&self, display_id: &str) -> LedgerResult<ResolvedRecord> {
        let wanted: DisplayId = display_id.trim().parse()?;
        let matches = self.records.find_by_display_id(&wanted)?;

        if let Some(record) = matches.iter().find(|r| r.display_id == wanted) {
            return Ok(ResolvedRecord {
                record: record.clone(),
                current: true,
            });
        }
        matches
            .into_iter()
            .max_by_key(|r| {
                r.merge_history
                    .iter()
                    .filter(|m| m.from_display_id == wanted)
                    .map(|m| m.at)
                    .max()
            })
            .map(|record| ResolvedRecord {
                record,
                current: false,
            })
            .ok_or_else(|| LedgerError::not_found("display id", wanted))
    }

    // ---- Maintenance log ----

    pub fn integrity_log(
        &self,
        portfolio_id: &PortfolioId,
    ) -> LedgerResult<Vec<IntegrityLogEntry>> {
        self.audit.integrity_entries(portfolio_id)
    }
}
