//! Shared setup for the platform integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Duration;
use convene::{
    Config, DomainError, EventId, Location, NewEvent, Platform, ServiceError, User,
};
use convene_core::journal::{InMemoryJournal, Journal};
use convene_stats::StatsClient;
use convene_testing::stats::InMemoryStatsClient;
use convene_testing::{ManualClock, test_time};
use std::sync::Arc;

/// Config with short timeouts so fallback tests stay quick.
pub fn config() -> Config {
    let mut config = Config::default();
    config.stats.timeout_ms = 100;
    config.app.command_timeout_ms = 2_000;
    config
}

/// A platform plus handles on its collaborators.
pub struct Harness {
    pub platform: Platform,
    pub clock: ManualClock,
    pub stats: Arc<InMemoryStatsClient>,
    pub journal: Arc<InMemoryJournal>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::at(test_time());
        let stats = InMemoryStatsClient::shared();
        let journal = Arc::new(InMemoryJournal::new());
        let platform = Platform::with_parts(
            &config(),
            Arc::new(clock.clone()),
            stats.clone(),
            journal.clone(),
        );
        Self {
            platform,
            clock,
            stats,
            journal,
        }
    }
}

/// A platform wired to the given analytics service and journal.
pub fn platform_with(stats: Arc<dyn StatsClient>, journal: Arc<dyn Journal>) -> (Platform, ManualClock) {
    let clock = ManualClock::at(test_time());
    let platform = Platform::with_parts(&config(), Arc::new(clock.clone()), stats, journal);
    (platform, clock)
}

/// Registered people around one event.
pub struct Fixture {
    pub organizer: User,
    pub attendees: Vec<User>,
    pub event: EventId,
}

pub fn new_event(category: convene::CategoryId, limit: u32, moderation: bool) -> NewEvent {
    NewEvent {
        title: "Harbour night swim".to_string(),
        annotation: "A night swim across the harbour".to_string(),
        description: "Meet at the pier, bring a towel and a torch".to_string(),
        category,
        location: Location { lat: 59.9, lon: 10.7 },
        event_date: test_time() + Duration::days(3),
        paid: Some(false),
        participant_limit: Some(limit),
        request_moderation: Some(moderation),
    }
}

/// Register an organizer and `attendees` users, then create and publish an
/// event three days out.
pub async fn published_event(platform: &Platform, attendees: usize, limit: u32, moderation: bool) -> Fixture {
    let organizer = platform
        .register_user("Olga Organizer", "olga@example.com")
        .await
        .unwrap();

    let mut registered = Vec::with_capacity(attendees);
    for n in 0..attendees {
        let user = platform
            .register_user(&format!("Attendee {n}"), &format!("attendee{n}@example.com"))
            .await
            .unwrap();
        registered.push(user);
    }

    let category = platform.add_category("Outdoors").await.unwrap();
    let created = platform
        .create_event(organizer.id, new_event(category.id, limit, moderation))
        .await
        .unwrap();
    platform.publish_event(created.event.id).await.unwrap();

    Fixture {
        organizer,
        attendees: registered,
        event: created.event.id,
    }
}

/// The domain error behind a refused command.
pub fn domain(error: ServiceError) -> DomainError {
    match error {
        ServiceError::Domain(domain) => domain,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

/// Wait until the background recorder has delivered `count` hits.
pub async fn wait_for_hits(stats: &InMemoryStatsClient, count: usize) {
    for _ in 0..100 {
        if stats.recorded_hits().len() >= count {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("only {} of {count} hits arrived", stats.recorded_hits().len());
}
