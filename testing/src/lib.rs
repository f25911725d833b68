//! # Convene Testing
//!
//! Testing utilities for Convene reducers and services.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - The [`ReducerTest`] Given/When/Then harness
//! - Fake analytics services ([`stats::InMemoryStatsClient`] and friends)
//! - A journal that always fails ([`journal::FailingJournal`])
//!
//! ## Example
//!
//! ```ignore
//! use convene_testing::{ManualClock, stats::InMemoryStatsClient};
//!
//! #[tokio::test]
//! async fn publish_then_read() {
//!     let clock = ManualClock::at(test_time());
//!     let stats = InMemoryStatsClient::shared();
//!     let platform = Platform::with_parts(config, Arc::new(clock.clone()), stats, journal);
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use convene_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions, resolve_effects};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use convene_testing::mocks::FixedClock;
    /// use convene_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can hand one clone to the
    /// platform and advance it from the outside.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start at `time`.
        #[must_use]
        pub fn at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward.
        ///
        /// # Panics
        ///
        /// Panics if another thread panicked while holding the clock.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }

        /// Jump to an absolute time.
        ///
        /// # Panics
        ///
        /// Panics if another thread panicked while holding the clock.
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap() = to;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// 2025-01-01 00:00:00 UTC, the reference time for tests.
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Fake analytics services.
pub mod stats {
    use convene_stats::{EndpointHit, StatsClient, StatsError, StatsFuture, StatsQuery, ViewStats};
    use std::collections::{BTreeMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Analytics service kept in memory.
    ///
    /// Counts the hits recorded through it, honours the time window and the
    /// `unique` flag, and can be seeded with extra counts per path.
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryStatsClient {
        hits: Arc<Mutex<Vec<EndpointHit>>>,
        seeded: Arc<Mutex<BTreeMap<String, u64>>>,
        queries: Arc<Mutex<Vec<StatsQuery>>>,
    }

    impl InMemoryStatsClient {
        /// Create an empty service.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create an Arc-wrapped instance for sharing.
        #[must_use]
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::new())
        }

        /// Add `hits` to the count reported for `uri`.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn seed(&self, uri: impl Into<String>, hits: u64) {
            *self.seeded.lock().unwrap().entry(uri.into()).or_default() += hits;
        }

        /// Every hit recorded so far.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn recorded_hits(&self) -> Vec<EndpointHit> {
            self.hits.lock().unwrap().clone()
        }

        /// Every query received so far.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn queries(&self) -> Vec<StatsQuery> {
            self.queries.lock().unwrap().clone()
        }

        fn count(&self, query: &StatsQuery) -> Result<Vec<ViewStats>, StatsError> {
            let poisoned = |e: String| StatsError::RequestFailed(e);
            let hits = self.hits.lock().map_err(|e| poisoned(e.to_string()))?;
            let seeded = self.seeded.lock().map_err(|e| poisoned(e.to_string()))?;

            let mut per_uri: BTreeMap<String, (String, HashSet<String>, u64)> = BTreeMap::new();
            for hit in hits
                .iter()
                .filter(|h| h.timestamp >= query.start && h.timestamp <= query.end)
                .filter(|h| query.uris.is_empty() || query.uris.contains(&h.uri))
            {
                let entry = per_uri
                    .entry(hit.uri.clone())
                    .or_insert_with(|| (hit.app.clone(), HashSet::new(), 0));
                entry.1.insert(hit.ip.clone());
                entry.2 += 1;
            }

            let mut result: BTreeMap<String, ViewStats> = per_uri
                .into_iter()
                .map(|(uri, (app, ips, total))| {
                    let hits = if query.unique { ips.len() as u64 } else { total };
                    (uri.clone(), ViewStats { app, uri, hits })
                })
                .collect();

            for (uri, extra) in seeded
                .iter()
                .filter(|(uri, _)| query.uris.is_empty() || query.uris.contains(uri))
            {
                result
                    .entry(uri.clone())
                    .or_insert_with(|| ViewStats {
                        app: "seeded".to_string(),
                        uri: uri.clone(),
                        hits: 0,
                    })
                    .hits += extra;
            }

            let mut stats: Vec<ViewStats> = result.into_values().collect();
            stats.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.uri.cmp(&b.uri)));
            Ok(stats)
        }
    }

    impl StatsClient for InMemoryStatsClient {
        fn record_hit(&self, hit: EndpointHit) -> StatsFuture<'_, ()> {
            Box::pin(async move {
                self.hits
                    .lock()
                    .map_err(|e| StatsError::RequestFailed(e.to_string()))?
                    .push(hit);
                Ok(())
            })
        }

        fn query_hits(&self, query: StatsQuery) -> StatsFuture<'_, Vec<ViewStats>> {
            Box::pin(async move {
                if let Ok(mut queries) = self.queries.lock() {
                    queries.push(query.clone());
                }
                self.count(&query)
            })
        }
    }

    /// Analytics service that refuses every call.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UnreachableStatsClient;

    impl StatsClient for UnreachableStatsClient {
        fn record_hit(&self, _hit: EndpointHit) -> StatsFuture<'_, ()> {
            Box::pin(async { Err(StatsError::RequestFailed("connection refused".to_string())) })
        }

        fn query_hits(&self, _query: StatsQuery) -> StatsFuture<'_, Vec<ViewStats>> {
            Box::pin(async { Err(StatsError::RequestFailed("connection refused".to_string())) })
        }
    }

    /// Analytics service that answers correctly but only after `delay`.
    #[derive(Debug, Clone)]
    pub struct SlowStatsClient {
        inner: InMemoryStatsClient,
        delay: Duration,
    }

    impl SlowStatsClient {
        /// Wrap `inner`, delaying every call by `delay`.
        #[must_use]
        pub const fn new(inner: InMemoryStatsClient, delay: Duration) -> Self {
            Self { inner, delay }
        }
    }

    impl StatsClient for SlowStatsClient {
        fn record_hit(&self, hit: EndpointHit) -> StatsFuture<'_, ()> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.inner.record_hit(hit).await
            })
        }

        fn query_hits(&self, query: StatsQuery) -> StatsFuture<'_, Vec<ViewStats>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.inner.query_hits(query).await
            })
        }
    }
}

/// Fake journals.
pub mod journal {
    use convene_core::journal::{InMemoryJournal, Journal, JournalEntry, JournalError};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Journal whose storage is always unavailable.
    #[derive(Debug, Clone, Default)]
    pub struct FailingJournal {
        attempts: Arc<AtomicUsize>,
    }

    impl FailingJournal {
        /// Create a failing journal.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of appends attempted.
        #[must_use]
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl Journal for FailingJournal {
        fn append(
            &self,
            _entry: JournalEntry,
        ) -> Pin<Box<dyn Future<Output = Result<(), JournalError>> + Send + '_>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(JournalError::Storage("disk unavailable".to_string())) })
        }

        fn load(&self) -> Pin<Box<dyn Future<Output = Result<Vec<JournalEntry>, JournalError>> + Send + '_>> {
            Box::pin(async { Err(JournalError::Storage("disk unavailable".to_string())) })
        }
    }

    /// Wraps an [`InMemoryJournal`] and sleeps before every append.
    #[derive(Debug, Clone)]
    pub struct SlowJournal {
        inner: Arc<InMemoryJournal>,
        delay: Duration,
    }

    impl SlowJournal {
        /// Delay each append to `inner` by `delay`.
        #[must_use]
        pub const fn new(inner: Arc<InMemoryJournal>, delay: Duration) -> Self {
            Self { inner, delay }
        }
    }

    impl Journal for SlowJournal {
        fn append(
            &self,
            entry: JournalEntry,
        ) -> Pin<Box<dyn Future<Output = Result<(), JournalError>> + Send + '_>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.inner.append(entry).await
            })
        }

        fn load(&self) -> Pin<Box<dyn Future<Output = Result<Vec<JournalEntry>, JournalError>> + Send + '_>> {
            self.inner.load()
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock, test_time};
