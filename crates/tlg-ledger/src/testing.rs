use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use tlg_store::InMemoryStore;
use tlg_types::{Actor, ModuleType, Payload, PortfolioId, ThreadCategory, ThreadId, TrustId};

use crate::clock::ManualClock;
use crate::config::LedgerConfig;
use crate::revisions::{CreatedRecord, NewRecord, ThreadSpec};
use crate::service::{Ledger, LedgerStores, ThreadDetails};

pub(crate) const BASE: &str = "RF000000001US";

/// A ledger over an in-memory store with a hand-driven clock.
pub(crate) struct Harness {
    pub ledger: Ledger,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub actor: Actor,
    pub portfolio: PortfolioId,
    pub trust: TrustId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_735_689_600, 0).unwrap(),
        ));
        let stores = LedgerStores::shared(store.clone());
        let ledger = Ledger::with_stores(stores, clock.clone(), config).unwrap();
        let actor = Actor::new("trustee-1");
        let portfolio = PortfolioId::new("pf-1");
        ledger.register_base(&actor, &portfolio, BASE).unwrap();
        Self {
            ledger,
            store,
            clock,
            actor,
            portfolio,
            trust: TrustId::new("trust-1"),
        }
    }

    pub fn tick(&self) {
        self.clock.advance(Duration::milliseconds(1_250));
    }

    pub fn thread(&self, title: &str) -> ThreadId {
        self.ledger
            .create_thread(
                &self.actor,
                &self.portfolio,
                &self.trust,
                ThreadDetails::new(title, ThreadCategory::General),
            )
            .unwrap()
            .thread_id
    }

    pub fn new_record(&self, thread: ThreadSpec, payload: Value) -> NewRecord {
        let title = payload
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled")
            .to_string();
        NewRecord {
            portfolio_id: self.portfolio.clone(),
            trust_id: self.trust.clone(),
            module_type: ModuleType::Minutes,
            title,
            payload: Payload::from_value(payload).unwrap(),
            thread,
        }
    }

    pub fn record_on(&self, thread: ThreadId, title: &str) -> CreatedRecord {
        self.tick();
        self.ledger
            .create_record(
                &self.actor,
                self.new_record(
                    ThreadSpec::Existing(thread),
                    serde_json::json!({ "title": title }),
                ),
            )
            .unwrap()
    }

    /// Create and finalize a record on `thread`.
    pub fn sealed_on(&self, thread: ThreadId, title: &str) -> CreatedRecord {
        let created = self.record_on(thread, title);
        self.tick();
        self.ledger.finalize(&self.actor, &created.revision_id).unwrap();
        created
    }
}
