//! Identifier issuance.
//!
//! A new thread takes the lowest free group found by a scan. The store's
//! uniqueness constraint catches races and the scan is retried a bounded
//! number of times. Sub-numbers come from a single atomic increment and are
//! never computed from a read.

use std::sync::Arc;

use tlg_store::{StoreError, ThreadStore};
use tlg_types::{
    Base, DisplayId, LedgerThread, PortfolioId, ThreadCategory, ThreadId, TrustId,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};

/// Parameters for a new thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadRequest {
    pub portfolio_id: PortfolioId,
    pub trust_id: TrustId,
    pub base: Base,
    pub title: String,
    pub category: ThreadCategory,
    pub primary_party: Option<String>,
    pub external_ref: Option<String>,
}

/// Issues thread groups and sub-numbers.
#[derive(Clone)]
pub struct ThreadAllocator {
    threads: Arc<dyn ThreadStore>,
    clock: Arc<dyn Clock>,
    max_group: u32,
    max_sub: u32,
    attempts: u32,
}

impl ThreadAllocator {
    pub fn new(
        threads: Arc<dyn ThreadStore>,
        clock: Arc<dyn Clock>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            threads,
            clock,
            max_group: config.max_group,
            max_sub: config.max_sub,
            attempts: config.thread_create_attempts.max(1),
        }
    }

    /// Create a thread on the lowest free group of `(portfolio, base)`.
    ///
    /// A lost race for a group rescans and retries; any other store error
    /// returns immediately. Running out of retries is a `Conflict`.
    pub fn allocate_thread(&self, request: &ThreadRequest) -> LedgerResult<LedgerThread> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(LedgerError::validation("thread title must not be empty"));
        }

        for attempt in 1..=self.attempts {
            let used = self
                .threads
                .used_groups(&request.portfolio_id, &request.base)?;
            let group = lowest_free_group(&used, self.max_group).ok_or(
                LedgerError::AllocationExhausted {
                    what: "thread groups",
                    limit: self.max_group,
                },
            )?;

            let now = self.clock.now();
            let thread = LedgerThread {
                id: ThreadId::new(),
                portfolio_id: request.portfolio_id.clone(),
                trust_id: request.trust_id.clone(),
                base: request.base.clone(),
                group,
                title: title.to_string(),
                category: request.category,
                primary_party: request.primary_party.clone(),
                external_ref: request.external_ref.clone(),
                next_sub: 1,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };

            match self.threads.insert_thread(&thread) {
                Ok(()) => {
                    info!(
                        thread_id = %thread.id,
                        prefix = %thread.prefix(),
                        attempt,
                        "thread created"
                    );
                    return Ok(thread);
                }
                Err(StoreError::UniqueConflict { .. }) => {
                    warn!(group, attempt, "group claimed concurrently, rescanning");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(LedgerError::Conflict(format!(
            "no free group could be claimed after {} attempts",
            self.attempts
        )))
    }

    /// Issue the next sub-number on a thread.
    pub fn allocate_next(&self, thread_id: &ThreadId) -> LedgerResult<(DisplayId, u32)> {
        let thread = self
            .threads
            .get_thread(thread_id)?
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| LedgerError::not_found("thread", thread_id))?;

        let sub = self
            .threads
            .increment_next_sub(thread_id, self.max_sub, self.clock.now())?;
        let display_id = thread.display_id(sub)?;
        debug!(thread_id = %thread_id, display_id = %display_id, "sub-number issued");
        Ok((display_id, sub))
    }
}

/// Lowest group in `1..=max_group` absent from `used`.
pub fn lowest_free_group(used: &[u32], max_group: u32) -> Option<u32> {
    (1..=max_group).find(|group| !used.contains(group))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;
    use tlg_store::InMemoryStore;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    fn allocator_with(store: Arc<dyn ThreadStore>, config: LedgerConfig) -> ThreadAllocator {
        ThreadAllocator::new(store, clock(), &config)
    }

    fn request(title: &str) -> ThreadRequest {
        ThreadRequest {
            portfolio_id: PortfolioId::new("pf-1"),
            trust_id: TrustId::new("trust-1"),
            base: Base::new("RF000000001US").unwrap(),
            title: title.to_string(),
            category: ThreadCategory::General,
            primary_party: None,
            external_ref: None,
        }
    }

    #[test]
    fn lowest_free_group_fills_gaps() {
        assert_eq!(lowest_free_group(&[], 99), Some(1));
        assert_eq!(lowest_free_group(&[1, 2, 4], 99), Some(3));
        assert_eq!(lowest_free_group(&[1, 2, 3], 3), None);
    }

    #[test]
    fn groups_are_issued_lowest_first_and_never_reused() {
        let store = Arc::new(InMemoryStore::new());
        let alloc = allocator_with(store.clone(), LedgerConfig::default());
        let first = alloc.allocate_thread(&request("a")).unwrap();
        let second = alloc.allocate_thread(&request("b")).unwrap();
        assert_eq!((first.group, second.group), (1, 2));

        store
            .soft_delete_thread(&first.id, Utc.timestamp_opt(1_700_000_100, 0).unwrap())
            .unwrap();
        let third = alloc.allocate_thread(&request("c")).unwrap();
        assert_eq!(third.group, 3);
        assert_eq!(third.prefix().to_string(), "RF000000001US-3");
    }

    #[test]
    fn deleted_threads_still_count_toward_exhaustion() {
        let store = Arc::new(InMemoryStore::new());
        let config = LedgerConfig {
            max_group: 1,
            ..LedgerConfig::default()
        };
        let alloc = allocator_with(store.clone(), config);
        let only = alloc.allocate_thread(&request("a")).unwrap();
        store
            .soft_delete_thread(&only.id, Utc.timestamp_opt(1_700_000_100, 0).unwrap())
            .unwrap();
        let err = alloc.allocate_thread(&request("b")).unwrap_err();
        assert_eq!(err.code(), "ALLOCATION_EXHAUSTED");
    }

    #[test]
    fn group_space_exhaustion() {
        let store = Arc::new(InMemoryStore::new());
        let config = LedgerConfig {
            max_group: 2,
            ..LedgerConfig::default()
        };
        let alloc = allocator_with(store, config);
        alloc.allocate_thread(&request("a")).unwrap();
        alloc.allocate_thread(&request("b")).unwrap();
        let err = alloc.allocate_thread(&request("c")).unwrap_err();
        assert_eq!(err.code(), "ALLOCATION_EXHAUSTED");
        assert!(!err.is_retryable());
    }

    #[test]
    fn blank_title_is_rejected() {
        let alloc = allocator_with(Arc::new(InMemoryStore::new()), LedgerConfig::default());
        assert!(matches!(
            alloc.allocate_thread(&request("   ")),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn subs_start_at_one_and_never_repeat() {
        let store = Arc::new(InMemoryStore::new());
        let alloc = allocator_with(store.clone(), LedgerConfig::default());
        let thread = alloc.allocate_thread(&request("a")).unwrap();

        let (id, sub) = alloc.allocate_next(&thread.id).unwrap();
        assert_eq!(sub, 1);
        assert_eq!(id.to_string(), "RF000000001US-1.001");
        assert_eq!(store.get_thread(&thread.id).unwrap().unwrap().next_sub, 2);

        let (_, sub) = alloc.allocate_next(&thread.id).unwrap();
        assert_eq!(sub, 2);
    }

    #[test]
    fn parallel_sub_allocation_is_unique_and_dense() {
        let store = Arc::new(InMemoryStore::new());
        let alloc = allocator_with(store.clone(), LedgerConfig::default());
        let thread = alloc.allocate_thread(&request("busy")).unwrap();

        let issued: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..10)
                .map(|_| {
                    let alloc = alloc.clone();
                    let id = thread.id;
                    scope.spawn(move || {
                        (0..30)
                            .map(|_| alloc.allocate_next(&id).unwrap().1)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let distinct: HashSet<u32> = issued.iter().copied().collect();
        assert_eq!(distinct.len(), 300);
        assert_eq!(distinct, (1..=300).collect::<HashSet<u32>>());
        assert_eq!(store.get_thread(&thread.id).unwrap().unwrap().next_sub, 301);
    }

    #[test]
    fn parallel_thread_creation_claims_distinct_groups() {
        let store = Arc::new(InMemoryStore::new());
        let config = LedgerConfig {
            thread_create_attempts: 32,
            ..LedgerConfig::default()
        };
        let alloc = allocator_with(store, config);

        let groups: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..12)
                .map(|i| {
                    let alloc = alloc.clone();
                    scope.spawn(move || {
                        alloc
                            .allocate_thread(&request(&format!("t{i}")))
                            .unwrap()
                            .group
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let distinct: HashSet<u32> = groups.into_iter().collect();
        assert_eq!(distinct, (1..=12).collect::<HashSet<u32>>());
    }

    #[test]
    fn sub_exhaustion_does_not_advance_counter() {
        let store = Arc::new(InMemoryStore::new());
        let config = LedgerConfig {
            max_sub: 3,
            ..LedgerConfig::default()
        };
        let alloc = allocator_with(store.clone(), config);
        let thread = alloc.allocate_thread(&request("small")).unwrap();
        for _ in 0..3 {
            alloc.allocate_next(&thread.id).unwrap();
        }
        let err = alloc.allocate_next(&thread.id).unwrap_err();
        assert_eq!(err.code(), "ALLOCATION_EXHAUSTED");
        assert_eq!(store.get_thread(&thread.id).unwrap().unwrap().next_sub, 4);
    }

    #[test]
    fn deleted_or_missing_thread_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let alloc = allocator_with(store.clone(), LedgerConfig::default());
        assert_eq!(
            alloc.allocate_next(&ThreadId::new()).unwrap_err().code(),
            "NOT_FOUND"
        );

        let thread = alloc.allocate_thread(&request("gone")).unwrap();
        store
            .soft_delete_thread(&thread.id, Utc.timestamp_opt(1_700_000_100, 0).unwrap())
            .unwrap();
        assert_eq!(alloc.allocate_next(&thread.id).unwrap_err().code(), "NOT_FOUND");
    }

    /// Reports every group as free, so each insert collides with group 1.
    struct BlindGroups(InMemoryStore);

    impl ThreadStore for BlindGroups {
        fn register_base(&self, p: &PortfolioId, b: &Base) -> tlg_store::StoreResult<()> {
            self.0.register_base(p, b)
        }
        fn portfolio_base(&self, p: &PortfolioId) -> tlg_store::StoreResult<Option<Base>> {
            self.0.portfolio_base(p)
        }
        fn used_groups(&self, _: &PortfolioId, _: &Base) -> tlg_store::StoreResult<Vec<u32>> {
            Ok(Vec::new())
        }
        fn insert_thread(&self, t: &LedgerThread) -> tlg_store::StoreResult<()> {
            self.0.insert_thread(t)
        }
        fn get_thread(&self, id: &ThreadId) -> tlg_store::StoreResult<Option<LedgerThread>> {
            self.0.get_thread(id)
        }
        fn list_threads(
            &self,
            p: &PortfolioId,
            include_deleted: bool,
        ) -> tlg_store::StoreResult<Vec<LedgerThread>> {
            self.0.list_threads(p, include_deleted)
        }
        fn increment_next_sub(
            &self,
            id: &ThreadId,
            max_sub: u32,
            at: tlg_types::Timestamp,
        ) -> tlg_store::StoreResult<u32> {
            self.0.increment_next_sub(id, max_sub, at)
        }
        fn soft_delete_thread(
            &self,
            id: &ThreadId,
            at: tlg_types::Timestamp,
        ) -> tlg_store::StoreResult<LedgerThread> {
            self.0.soft_delete_thread(id, at)
        }
    }

    #[test]
    fn retries_are_bounded_and_surface_as_conflict() {
        let store = Arc::new(BlindGroups(InMemoryStore::new()));
        let config = LedgerConfig {
            thread_create_attempts: 3,
            ..LedgerConfig::default()
        };
        let alloc = allocator_with(store, config);
        alloc.allocate_thread(&request("first")).unwrap();

        let err = alloc.allocate_thread(&request("second")).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(err.is_retryable());
    }

    proptest! {
        #[test]
        fn lowest_free_group_is_the_first_gap(
            used in proptest::collection::vec(1u32..=20, 0..25),
            max_group in 1u32..=20,
        ) {
            match lowest_free_group(&used, max_group) {
                Some(group) => {
                    prop_assert!(group <= max_group);
                    prop_assert!(!used.contains(&group));
                    prop_assert!((1..group).all(|g| used.contains(&g)));
                }
                None => {
                    prop_assert!((1..=max_group).all(|g| used.contains(&g)));
                }
            }
        }
    }
}
