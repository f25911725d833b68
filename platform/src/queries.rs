//! Read-side filters for event searches.
//!
//! Selection and ordering happen against [`PlatformState`]; view counts are
//! attached afterwards by [`crate::views::ViewEnricher`]. Sorting by views
//! therefore enriches every match before paging, while every other order
//! pages first and enriches only the page.

use crate::error::DomainError;
use crate::state::PlatformState;
use crate::types::{CategoryId, Event, EventState, UserId};
use crate::views::EventView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Offset pagination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Items to skip
    pub from: usize,
    /// Items to return
    pub size: usize,
}

impl Page {
    /// Page size used when the caller does not choose one.
    pub const DEFAULT_SIZE: usize = 10;

    /// `size` items starting at `from`.
    #[must_use]
    pub const fn new(from: usize, size: usize) -> Self {
        Self { from, size }
    }

    /// Cut this page out of `items`.
    #[must_use]
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.from).take(self.size).collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

/// Ordering of public search results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSort {
    /// Soonest first
    EventDate,
    /// Most viewed first, ties by id
    Views,
}

fn check_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), DomainError> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(DomainError::DateTimeViolation(format!(
            "Range start {start} is after range end {end}"
        ))),
        _ => Ok(()),
    }
}

/// Search over published events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicEventFilter {
    /// Case-insensitive substring of the annotation or description
    pub text: Option<String>,
    /// Any of these categories; empty means all
    pub categories: Vec<CategoryId>,
    /// Only paid or only free events
    pub paid: Option<bool>,
    /// Earliest event date; defaults to now
    pub range_start: Option<DateTime<Utc>>,
    /// Latest event date
    pub range_end: Option<DateTime<Utc>>,
    /// Skip events without a free seat
    pub only_available: bool,
    /// Result order; by id when absent
    pub sort: Option<EventSort>,
    /// Page to return
    pub page: Page,
}

impl PublicEventFilter {
    /// Reject a range whose start is after its end.
    ///
    /// # Errors
    ///
    /// [`DomainError::DateTimeViolation`] for an inverted range.
    pub fn validate(&self) -> Result<(), DomainError> {
        check_range(self.range_start, self.range_end)
    }

    /// Whether `event` is part of the result.
    #[must_use]
    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if event.state != EventState::Published {
            return false;
        }

        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            if !event.annotation.to_lowercase().contains(&needle)
                && !event.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }
        if self.paid.is_some_and(|paid| paid != event.paid) {
            return false;
        }

        let start = self.range_start.unwrap_or(now);
        if event.event_date < start || self.range_end.is_some_and(|end| event.event_date > end) {
            return false;
        }

        !self.only_available || !crate::aggregates::capacity::is_exhausted(event)
    }

    /// Matching events in id order, or date order when sorting by date.
    #[must_use]
    pub fn select(&self, state: &PlatformState, now: DateTime<Utc>) -> Vec<Event> {
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|event| self.matches(event, now))
            .cloned()
            .collect();

        if self.sort == Some(EventSort::EventDate) {
            events.sort_by(|a, b| a.event_date.cmp(&b.event_date).then(a.id.cmp(&b.id)));
        }
        events
    }
}

/// Administrative search over every event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminEventFilter {
    /// Initiated by any of these users; empty means all
    pub users: Vec<UserId>,
    /// In any of these states; empty means all
    pub states: Vec<EventState>,
    /// In any of these categories; empty means all
    pub categories: Vec<CategoryId>,
    /// Earliest event date
    pub range_start: Option<DateTime<Utc>>,
    /// Latest event date
    pub range_end: Option<DateTime<Utc>>,
    /// Page to return
    pub page: Page,
}

impl AdminEventFilter {
    /// Reject a range whose start is after its end.
    ///
    /// # Errors
    ///
    /// [`DomainError::DateTimeViolation`] for an inverted range.
    pub fn validate(&self) -> Result<(), DomainError> {
        check_range(self.range_start, self.range_end)
    }

    /// Whether `event` is part of the result.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        (self.users.is_empty() || self.users.contains(&event.initiator))
            && (self.states.is_empty() || self.states.contains(&event.state))
            && (self.categories.is_empty() || self.categories.contains(&event.category))
            && self.range_start.is_none_or(|start| event.event_date >= start)
            && self.range_end.is_none_or(|end| event.event_date <= end)
    }

    /// The requested page of matching events, in id order.
    #[must_use]
    pub fn select(&self, state: &PlatformState) -> Vec<Event> {
        let matching = state
            .events
            .values()
            .filter(|event| self.matches(event))
            .cloned()
            .collect();
        self.page.slice(matching)
    }
}

/// Most viewed first; equal counts keep id order.
pub fn sort_by_views(views: &mut [EventView]) {
    views.sort_by(|a, b| b.views.cmp(&a.views).then(a.event.id.cmp(&b.event.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::fixtures;
    use crate::types::EventId;
    use chrono::Duration;
    use convene_testing::test_time;

    fn event(id: u64, days: i64) -> Event {
        Event {
            id: EventId::new(id),
            event_date: test_time() + Duration::days(days),
            ..fixtures::event(EventState::Published, 0, false)
        }
    }

    #[test]
    fn page_slices_by_offset() {
        let page = Page::new(2, 2);
        assert_eq!(page.slice(vec![1, 2, 3, 4, 5]), vec![3, 4]);
        assert_eq!(Page::default().size, 10);
    }

    #[test]
    fn inverted_range_is_a_date_violation() {
        let filter = PublicEventFilter {
            range_start: Some(test_time() + Duration::days(2)),
            range_end: Some(test_time()),
            ..PublicEventFilter::default()
        };
        assert!(matches!(filter.validate(), Err(DomainError::DateTimeViolation(_))));
    }

    #[test]
    fn public_filter_defaults_to_future_published_events() {
        let filter = PublicEventFilter::default();
        let now = test_time();

        assert!(filter.matches(&event(1, 3), now));
        assert!(!filter.matches(&event(2, -1), now));
        assert!(!filter.matches(
            &Event {
                state: EventState::Pending,
                ..event(3, 3)
            },
            now
        ));
    }

    #[test]
    fn text_search_ignores_case() {
        let filter = PublicEventFilter {
            text: Some("HARBOUR".to_string()),
            ..PublicEventFilter::default()
        };
        assert!(filter.matches(&event(1, 3), test_time()));

        let filter = PublicEventFilter {
            text: Some("opera".to_string()),
            ..PublicEventFilter::default()
        };
        assert!(!filter.matches(&event(1, 3), test_time()));
    }

    #[test]
    fn only_available_skips_full_events() {
        let full = Event {
            participant_limit: 2,
            confirmed_requests: 2,
            ..event(1, 3)
        };
        let filter = PublicEventFilter {
            only_available: true,
            ..PublicEventFilter::default()
        };
        assert!(!filter.matches(&full, test_time()));
        assert!(PublicEventFilter::default().matches(&full, test_time()));
    }

    #[test]
    fn admin_filter_combines_criteria() {
        let filter = AdminEventFilter {
            states: vec![EventState::Pending],
            users: vec![fixtures::ORGANIZER],
            ..AdminEventFilter::default()
        };
        assert!(!filter.matches(&event(1, 3)));
        assert!(filter.matches(&Event {
            state: EventState::Pending,
            ..event(1, 3)
        }));
    }

    #[test]
    fn views_sort_descending_with_id_ties() {
        let mut views = vec![
            EventView { event: event(1, 1), views: 3 },
            EventView { event: event(2, 1), views: 7 },
            EventView { event: event(3, 1), views: 3 },
        ];
        sort_by_views(&mut views);
        let order: Vec<u64> = views.iter().map(|v| v.event.id.value()).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }
}
