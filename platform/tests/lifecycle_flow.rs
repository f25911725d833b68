//! Event lifecycle and read-side tests with a controllable clock.
//!
//! Run with: `cargo test --test lifecycle_flow`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod common;

use chrono::Duration;
use common::{Harness, new_event, published_event, wait_for_hits};
use convene::{
    Actor, AdminEventFilter, ErrorCategory, EventPatch, EventSort, EventState, Page,
    PublicEventFilter, StateAction,
};
use convene_testing::test_time;

#[tokio::test]
async fn publication_needs_an_hour_of_lead_time() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let organizer = platform.register_user("Olga", "olga@example.com").await.unwrap();
    let category = platform.add_category("Outdoors").await.unwrap();

    let created = platform
        .create_event(organizer.id, new_event(category.id, 0, true))
        .await
        .unwrap();
    assert_eq!(created.event.state, EventState::Pending);
    assert_eq!(created.views, 0);

    // Three days out; move to 30 minutes before the start.
    harness
        .clock
        .set(created.event.event_date - Duration::minutes(30));

    let error = platform.publish_event(created.event.id).await.unwrap_err();
    assert_eq!(error.category(), ErrorCategory::DateTimeViolation);

    harness.clock.set(test_time());
    let published = platform.publish_event(created.event.id).await.unwrap();
    assert_eq!(published.event.state, EventState::Published);
    assert_eq!(published.event.published_on, Some(test_time()));

    let again = platform.publish_event(created.event.id).await.unwrap_err();
    assert_eq!(again.category(), ErrorCategory::RestrictionViolation);
}

#[tokio::test]
async fn events_must_be_two_hours_out() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let organizer = platform.register_user("Olga", "olga@example.com").await.unwrap();
    let category = platform.add_category("Outdoors").await.unwrap();

    let mut too_soon = new_event(category.id, 0, true);
    too_soon.event_date = test_time() + Duration::minutes(90);

    let error = platform.create_event(organizer.id, too_soon).await.unwrap_err();
    assert_eq!(error.category(), ErrorCategory::DateTimeViolation);
}

#[tokio::test]
async fn initiator_cannot_touch_a_published_event() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let fixture = published_event(platform, 0, 0, true).await;

    let patch = EventPatch {
        title: Some("Harbour day swim".to_string()),
        ..EventPatch::default()
    };
    let error = platform
        .edit_event(fixture.event, Actor::Initiator(fixture.organizer.id), patch.clone())
        .await
        .unwrap_err();
    assert_eq!(error.category(), ErrorCategory::RestrictionViolation);

    let edited = platform.edit_event(fixture.event, Actor::Admin, patch).await.unwrap();
    assert_eq!(edited.event.title, "Harbour day swim");
    assert_eq!(edited.event.state, EventState::Published);
}

#[tokio::test]
async fn pending_events_can_be_withdrawn_or_rejected() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let organizer = platform.register_user("Olga", "olga@example.com").await.unwrap();
    let category = platform.add_category("Outdoors").await.unwrap();

    let first = platform
        .create_event(organizer.id, new_event(category.id, 0, true))
        .await
        .unwrap();
    let withdrawn = platform
        .cancel_event(first.event.id, Actor::Initiator(organizer.id))
        .await
        .unwrap();
    assert_eq!(withdrawn.event.state, EventState::Canceled);

    let second = platform
        .create_event(organizer.id, new_event(category.id, 0, true))
        .await
        .unwrap();
    let rejected = platform
        .edit_event(
            second.event.id,
            Actor::Admin,
            EventPatch::state_only(StateAction::RejectEvent),
        )
        .await
        .unwrap();
    assert_eq!(rejected.event.state, EventState::Canceled);

    let error = platform.publish_event(second.event.id).await.unwrap_err();
    assert_eq!(error.category(), ErrorCategory::RestrictionViolation);
}

#[tokio::test]
async fn unpublished_events_are_not_public() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let organizer = platform.register_user("Olga", "olga@example.com").await.unwrap();
    let category = platform.add_category("Outdoors").await.unwrap();
    let created = platform
        .create_event(organizer.id, new_event(category.id, 0, true))
        .await
        .unwrap();

    let error = platform
        .get_public_event(created.event.id, "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(error.category(), ErrorCategory::NotFound);

    let own = platform.get_own_event(organizer.id, created.event.id).await.unwrap();
    assert_eq!(own.event.state, EventState::Pending);

    let listed = platform.list_own_events(organizer.id, Page::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn public_reads_count_unique_visitors() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let fixture = published_event(platform, 0, 0, true).await;

    for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.1"] {
        platform.get_public_event(fixture.event, ip).await.unwrap();
    }
    wait_for_hits(&harness.stats, 3).await;

    let view = platform.get_public_event(fixture.event, "10.0.0.2").await.unwrap();
    assert_eq!(view.views, 2);

    let hits = harness.stats.recorded_hits();
    assert!(hits.iter().all(|hit| hit.uri == format!("/events/{}", fixture.event)));
    assert!(hits.iter().all(|hit| hit.app == "convene-main"));
}

#[tokio::test]
async fn search_sorted_by_views_ranks_before_paging() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let fixture = published_event(platform, 0, 0, true).await;

    let category = platform.add_category("Concerts").await.unwrap();
    let mut ids = vec![fixture.event];
    for _ in 0..2 {
        let created = platform
            .create_event(fixture.organizer.id, new_event(category.id, 0, true))
            .await
            .unwrap();
        platform.publish_event(created.event.id).await.unwrap();
        ids.push(created.event.id);
    }

    harness.stats.seed(&ids[0].path(), 1);
    harness.stats.seed(&ids[1].path(), 9);
    harness.stats.seed(&ids[2].path(), 4);

    let filter = PublicEventFilter {
        sort: Some(EventSort::Views),
        page: Page::new(0, 2),
        ..PublicEventFilter::default()
    };
    let found = platform.search_public_events(&filter, "10.0.0.1").await.unwrap();

    let ranked: Vec<_> = found.iter().map(|view| (view.event.id, view.views)).collect();
    assert_eq!(ranked, vec![(ids[1], 9), (ids[2], 4)]);

    wait_for_hits(&harness.stats, 1).await;
    assert_eq!(harness.stats.recorded_hits()[0].uri, "/events");
}

#[tokio::test]
async fn inverted_search_range_is_refused() {
    let harness = Harness::new();
    let filter = AdminEventFilter {
        range_start: Some(test_time() + Duration::days(2)),
        range_end: Some(test_time()),
        ..AdminEventFilter::default()
    };

    let error = harness.platform.search_admin_events(&filter).await.unwrap_err();
    assert_eq!(error.category(), ErrorCategory::DateTimeViolation);
}

#[tokio::test]
async fn admin_search_filters_by_state() {
    let harness = Harness::new();
    let platform = &harness.platform;
    let fixture = published_event(platform, 0, 0, true).await;
    let category = platform.add_category("Concerts").await.unwrap();
    platform
        .create_event(fixture.organizer.id, new_event(category.id, 0, true))
        .await
        .unwrap();

    let filter = AdminEventFilter {
        states: vec![EventState::Published],
        ..AdminEventFilter::default()
    };
    let found = platform.search_admin_events(&filter).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].event.id, fixture.event);
}
