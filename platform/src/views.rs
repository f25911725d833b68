//! View enrichment backed by the analytics service.
//!
//! Reads never fail because of analytics. A query that errors or outlives
//! its timeout is answered with zero views for the whole batch, and a hit
//! that cannot be delivered is dropped after a warning.

use crate::types::{Compilation, CompilationId, Event, EventId};
use crate::metrics::names;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use convene_core::environment::Clock;
use convene_stats::{EndpointHit, StatsClient, StatsQuery, ViewStats};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// An event together with its unique view count.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventView {
    /// The event
    #[serde(flatten)]
    pub event: Event,
    /// Distinct clients that read the event page
    pub views: u64,
}

/// A compilation with its member events and their view counts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompilationView {
    /// Identifier
    pub id: CompilationId,
    /// Title
    pub title: String,
    /// Shown on the front page
    pub pinned: bool,
    /// Member events, ascending by id
    pub events: Vec<EventView>,
}

/// Decorates events with view counts.
#[derive(Clone)]
pub struct ViewEnricher {
    stats: Arc<dyn StatsClient>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    lookback: ChronoDuration,
}

impl std::fmt::Debug for ViewEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEnricher")
            .field("timeout", &self.timeout)
            .field("lookback", &self.lookback)
            .finish_non_exhaustive()
    }
}

impl ViewEnricher {
    /// Query `stats` for hits in `[now - lookback, now]`, waiting at most `timeout`.
    #[must_use]
    pub fn new(
        stats: Arc<dyn StatsClient>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        lookback: ChronoDuration,
    ) -> Self {
        Self {
            stats,
            clock,
            timeout,
            lookback,
        }
    }

    /// Unique views per event. Missing paths count as zero.
    pub async fn views_for(&self, ids: &[EventId]) -> HashMap<EventId, u64> {
        if ids.is_empty() {
            return HashMap::new();
        }

        let now = self.clock.now();
        let query = StatsQuery {
            // A window reaching past the calendar's start begins there.
            start: now
                .checked_sub_signed(self.lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: now,
            uris: ids.iter().map(|id| id.path()).collect(),
            unique: true,
        };

        let stats = match tokio::time::timeout(self.timeout, self.stats.query_hits(query)).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(error)) => {
                tracing::warn!(%error, events = ids.len(), "View lookup failed, reporting zero views");
                metrics::counter!(names::VIEWS_FALLBACK).increment(1);
                Vec::new()
            },
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis(),
                    events = ids.len(),
                    "View lookup timed out, reporting zero views"
                );
                metrics::counter!(names::VIEWS_FALLBACK).increment(1);
                Vec::new()
            },
        };

        let by_path = hits_by_path(stats);
        ids.iter()
            .map(|id| (*id, by_path.get(&id.path()).copied().unwrap_or(0)))
            .collect()
    }

    /// Attach view counts to every event, keeping order.
    pub async fn enrich(&self, events: Vec<Event>) -> Vec<EventView> {
        let ids: Vec<EventId> = events.iter().map(|event| event.id).collect();
        let views = self.views_for(&ids).await;

        events
            .into_iter()
            .map(|event| EventView {
                views: views.get(&event.id).copied().unwrap_or(0),
                event,
            })
            .collect()
    }

    /// Attach the view count to one event.
    pub async fn enrich_one(&self, event: Event) -> EventView {
        let views = self.views_for(&[event.id]).await;
        EventView {
            views: views.get(&event.id).copied().unwrap_or(0),
            event,
        }
    }

    /// Attach view counts to one compilation's members.
    pub async fn enrich_compilation(&self, compilation: Compilation, events: Vec<Event>) -> CompilationView {
        CompilationView {
            id: compilation.id,
            title: compilation.title,
            pinned: compilation.pinned,
            events: self.enrich(events).await,
        }
    }

    /// Attach view counts to the members of every compilation with a single
    /// lookup. Events shared between compilations are counted once.
    pub async fn enrich_compilations(
        &self,
        compilations: Vec<(Compilation, Vec<Event>)>,
    ) -> Vec<CompilationView> {
        let ids: Vec<EventId> = compilations
            .iter()
            .flat_map(|(_, events)| events.iter().map(|event| event.id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let views = self.views_for(&ids).await;

        compilations
            .into_iter()
            .map(|(compilation, events)| CompilationView {
                id: compilation.id,
                title: compilation.title,
                pinned: compilation.pinned,
                events: events
                    .into_iter()
                    .map(|event| EventView {
                        views: views.get(&event.id).copied().unwrap_or(0),
                        event,
                    })
                    .collect(),
            })
            .collect()
    }
}

fn hits_by_path(stats: Vec<ViewStats>) -> HashMap<String, u64> {
    let mut by_path = HashMap::with_capacity(stats.len());
    for entry in stats {
        *by_path.entry(entry.uri).or_insert(0) += entry.hits;
    }
    by_path
}

/// Reports public reads to the analytics service without waiting for it.
#[derive(Clone)]
pub struct HitRecorder {
    stats: Arc<dyn StatsClient>,
    clock: Arc<dyn Clock>,
    app: String,
    timeout: Duration,
}

impl std::fmt::Debug for HitRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HitRecorder")
            .field("app", &self.app)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HitRecorder {
    /// Report hits as `app`.
    #[must_use]
    pub fn new(
        stats: Arc<dyn StatsClient>,
        clock: Arc<dyn Clock>,
        app: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            stats,
            clock,
            app: app.into(),
            timeout,
        }
    }

    /// Send a hit in the background.
    ///
    /// The handle is only useful to tests that want to wait for delivery.
    pub fn record(&self, uri: impl Into<String>, ip: impl Into<String>) -> JoinHandle<()> {
        let hit = EndpointHit::new(self.app.clone(), uri, ip, self.clock.now());
        let stats = Arc::clone(&self.stats);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let uri = hit.uri.clone();
            match tokio::time::timeout(timeout, stats.record_hit(hit)).await {
                Ok(Ok(())) => tracing::trace!(%uri, "Hit recorded"),
                Ok(Err(error)) => {
                    tracing::warn!(%uri, %error, "Failed to record hit");
                    metrics::counter!(names::HITS_DROPPED).increment(1);
                },
                Err(_) => {
                    tracing::warn!(%uri, "Recording hit timed out");
                    metrics::counter!(names::HITS_DROPPED).increment(1);
                },
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::fixtures;
    use crate::types::EventState;
    use convene_testing::stats::{InMemoryStatsClient, SlowStatsClient, UnreachableStatsClient};
    use convene_testing::{test_clock, test_time};

    fn events(n: u64) -> Vec<Event> {
        (1..=n)
            .map(|id| Event {
                id: EventId::new(id),
                ..fixtures::event(EventState::Published, 0, false)
            })
            .collect()
    }

    fn enricher(stats: Arc<dyn StatsClient>, timeout: Duration) -> ViewEnricher {
        ViewEnricher::new(stats, Arc::new(test_clock()), timeout, ChronoDuration::days(7300))
    }

    #[tokio::test]
    async fn counts_map_back_by_path() {
        let stats = InMemoryStatsClient::shared();
        stats.seed("/events/1", 5);
        stats.seed("/events/3", 2);
        stats.seed("/events/99", 40);

        let views = enricher(stats.clone(), Duration::from_secs(1))
            .enrich(events(3))
            .await;

        let counts: Vec<(u64, u64)> = views.iter().map(|v| (v.event.id.value(), v.views)).collect();
        assert_eq!(counts, vec![(1, 5), (2, 0), (3, 2)]);

        let query = stats.queries().pop().unwrap();
        assert!(query.unique);
        assert_eq!(query.end, test_time());
        assert_eq!(query.uris, vec!["/events/1", "/events/2", "/events/3"]);
    }

    #[tokio::test]
    async fn unreachable_service_yields_zero_views() {
        let views = enricher(Arc::new(UnreachableStatsClient), Duration::from_secs(1))
            .enrich(events(4))
            .await;

        assert_eq!(views.len(), 4);
        assert!(views.iter().all(|v| v.views == 0));
    }

    #[tokio::test]
    async fn slow_service_yields_zero_views() {
        let inner = InMemoryStatsClient::new();
        inner.seed("/events/1", 9);
        let slow = SlowStatsClient::new(inner, Duration::from_millis(500));

        let view = enricher(Arc::new(slow), Duration::from_millis(20))
            .enrich_one(events(1).remove(0))
            .await;

        assert_eq!(view.views, 0);
    }

    #[tokio::test]
    async fn window_past_the_calendar_starts_at_its_beginning() {
        let stats = InMemoryStatsClient::shared();
        stats.seed("/events/1", 3);
        let enricher = ViewEnricher::new(
            stats.clone(),
            Arc::new(test_clock()),
            Duration::from_secs(1),
            ChronoDuration::days(100_000_000_000),
        );

        let view = enricher.enrich_one(events(1).remove(0)).await;

        assert_eq!(view.views, 3);
        assert_eq!(stats.queries().pop().unwrap().start, DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn compilations_share_one_lookup() {
        let stats = InMemoryStatsClient::shared();
        stats.seed("/events/2", 6);
        let compilation = |id: u64, members: &[Event]| Compilation {
            id: CompilationId::new(id),
            title: format!("compilation {id}"),
            pinned: false,
            events: members.iter().map(|event| event.id).collect(),
        };
        let all = events(3);
        let first = all[..2].to_vec();
        let second = all[1..].to_vec();

        let views = enricher(stats.clone(), Duration::from_secs(1))
            .enrich_compilations(vec![
                (compilation(1, &first), first.clone()),
                (compilation(2, &second), second.clone()),
                (compilation(3, &[]), Vec::new()),
            ])
            .await;

        let counts: Vec<Vec<u64>> = views
            .iter()
            .map(|view| view.events.iter().map(|event| event.views).collect())
            .collect();
        assert_eq!(counts, vec![vec![0, 6], vec![6, 0], vec![]]);

        let queries = stats.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].uris, vec!["/events/1", "/events/2", "/events/3"]);
    }

    #[tokio::test]
    async fn empty_batch_skips_the_service() {
        let stats = InMemoryStatsClient::shared();
        let views = enricher(stats.clone(), Duration::from_secs(1)).views_for(&[]).await;

        assert!(views.is_empty());
        assert!(stats.queries().is_empty());
    }

    #[tokio::test]
    async fn recorder_delivers_hits_with_app_name() {
        let stats = InMemoryStatsClient::shared();
        let recorder = HitRecorder::new(
            stats.clone(),
            Arc::new(test_clock()),
            "convene-main",
            Duration::from_secs(1),
        );

        recorder.record("/events/7", "10.1.1.1").await.unwrap();

        let hits = stats.recorded_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].app, "convene-main");
        assert_eq!(hits[0].uri, "/events/7");
        assert_eq!(hits[0].timestamp, test_time());
    }

    #[tokio::test]
    async fn recorder_swallows_failures() {
        let recorder = HitRecorder::new(
            Arc::new(UnreachableStatsClient),
            Arc::new(test_clock()),
            "convene-main",
            Duration::from_secs(1),
        );

        assert!(recorder.record("/events", "10.1.1.1").await.is_ok());
    }
}
