//! Reducers for the event platform.
//!
//! Each reducer owns one slice of the command set and ignores the rest:
//!
//! - [`directory`]: users and categories
//! - [`lifecycle`]: event creation, edits and the state machine
//! - [`admission`]: participation requests under the capacity ledger
//! - [`rating`]: reactions and the ratings derived from them
//! - [`compilations`]: administrator-curated event collections
//!
//! All five share [`PlatformState`] and are combined by [`platform_reducer`].
//! The store runs the combined reducer under one write lock, so every
//! validate-then-apply sequence below is a single atomic unit of work.

use crate::actions::PlatformAction;
use crate::error::DomainError;
use crate::facts::PlatformFact;
use crate::metrics::names;
use crate::state::PlatformState;
use convene_core::composition::{CombinedReducer, combine_reducers};
use convene_core::environment::Clock;
use convene_core::journal::{Fact, Journal, JournalEntry};
use convene_core::{Effect, SmallVec, smallvec};
use convene_runtime::Store;
use std::sync::Arc;
use uuid::Uuid;

pub mod admission;
pub mod capacity;
pub mod compilations;
pub mod directory;
pub mod lifecycle;
pub mod outcomes;
pub mod rating;

pub use outcomes::OutcomeLedger;

/// Collaborators the platform reducers depend on.
#[derive(Clone)]
pub struct PlatformEnvironment {
    /// Source of "now" for every date rule
    pub clock: Arc<dyn Clock>,
    /// Where committed facts are recorded
    pub journal: Arc<dyn Journal>,
    /// Outcomes of recent commands
    pub outcomes: Arc<OutcomeLedger>,
}

impl PlatformEnvironment {
    /// Create an environment.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, journal: Arc<dyn Journal>) -> Self {
        Self {
            clock,
            journal,
            outcomes: Arc::new(OutcomeLedger::new()),
        }
    }
}

impl std::fmt::Debug for PlatformEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformEnvironment")
            .field("now", &self.clock.now())
            .finish_non_exhaustive()
    }
}

/// Effects returned by the platform reducers.
pub type PlatformEffects = SmallVec<[Effect<PlatformAction>; 4]>;

/// Combined reducer type.
pub type PlatformReducer = CombinedReducer<PlatformState, PlatformAction, PlatformEnvironment>;

/// Store running the platform reducer.
pub type PlatformStore = Store<PlatformState, PlatformAction, PlatformEnvironment, PlatformReducer>;

/// Combine the directory, lifecycle, admission, rating and compilation reducers.
#[must_use]
pub fn platform_reducer() -> PlatformReducer {
    combine_reducers(vec![
        Arc::new(directory::DirectoryReducer),
        Arc::new(lifecycle::LifecycleReducer),
        Arc::new(admission::AdmissionReducer),
        Arc::new(rating::RatingReducer),
        Arc::new(compilations::CompilationReducer),
    ])
}

/// Apply `fact`, report the outcome and record the fact in the journal.
///
/// The state change is visible as soon as this returns, and the outcome does
/// not wait for the journal. A journal failure is logged and counted but does
/// not undo the change.
pub(crate) fn commit(
    state: &mut PlatformState,
    correlation_id: Uuid,
    fact: PlatformFact,
    env: &PlatformEnvironment,
) -> PlatformEffects {
    let sequence = state.apply(&fact);
    let journal = Arc::clone(&env.journal);
    let recorded_at = env.clock.now();

    tracing::debug!(sequence, fact_type = fact.fact_type(), %correlation_id, "Fact committed");

    let entry = JournalEntry::encode(sequence, &fact, recorded_at);
    let outcome = PlatformAction::Committed {
        correlation_id,
        sequence,
        fact,
    };
    env.outcomes.record(&outcome);

    smallvec![
        Effect::future(async move { Some(outcome) }),
        Effect::future(async move {
            let appended = match entry {
                Ok(entry) => journal.append(entry).await,
                Err(error) => Err(error),
            };

            if let Err(error) = appended {
                tracing::error!(sequence, %error, "Failed to journal fact");
                metrics::counter!(names::JOURNAL_FAILURES).increment(1);
            }
            None
        }),
    ]
}

/// Report that a command was refused. State is untouched.
pub(crate) fn refuse(
    correlation_id: Uuid,
    error: DomainError,
    env: &PlatformEnvironment,
) -> PlatformEffects {
    let category = error.category();
    tracing::debug!(%correlation_id, category = category.as_str(), %error, "Command refused");
    metrics::counter!(names::COMMANDS_REFUSED, "category" => category.as_str()).increment(1);

    let outcome = PlatformAction::Refused {
        correlation_id,
        error,
    };
    env.outcomes.record(&outcome);

    smallvec![Effect::future(async move { Some(outcome) })]
}

/// Shared fixtures for the reducer tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fixtures {
    use super::PlatformEnvironment;
    use crate::facts::PlatformFact;
    use crate::state::PlatformState;
    use crate::types::{
        Category, CategoryId, Event, EventId, EventState, Location, ParticipationRequest,
        RequestId, RequestStatus, User, UserId,
    };
    use chrono::Duration;
    use convene_core::journal::InMemoryJournal;
    use convene_testing::{test_clock, test_time};
    use std::sync::Arc;

    pub const ORGANIZER: UserId = UserId::new(1);
    pub const ALICE: UserId = UserId::new(2);
    pub const BOB: UserId = UserId::new(3);
    pub const EVENT: EventId = EventId::new(1);
    pub const CATEGORY: CategoryId = CategoryId::new(1);

    pub fn env() -> PlatformEnvironment {
        PlatformEnvironment::new(Arc::new(test_clock()), Arc::new(InMemoryJournal::new()))
    }

    pub fn user(id: UserId) -> User {
        User {
            id,
            name: format!("user-{id}"),
            email: format!("user{id}@example.com"),
            rating: 0,
        }
    }

    pub fn event(state: EventState, limit: u32, moderation: bool) -> Event {
        Event {
            id: EVENT,
            title: "Harbour night swim".to_string(),
            annotation: "A night swim across the harbour".to_string(),
            description: "Meet at the pier, bring a towel and a torch".to_string(),
            category: CATEGORY,
            initiator: ORGANIZER,
            location: Location { lat: 59.9, lon: 10.7 },
            paid: false,
            participant_limit: limit,
            request_moderation: moderation,
            state,
            created_on: test_time() - Duration::days(1),
            published_on: (state == EventState::Published).then(test_time),
            event_date: test_time() + Duration::days(7),
            confirmed_requests: 0,
            rating: 0,
        }
    }

    /// Users 1..=3, one category and the given event.
    pub fn state_with(event: Event) -> PlatformState {
        let mut state = PlatformState::new();
        for id in [ORGANIZER, ALICE, BOB] {
            state.apply(&PlatformFact::UserRegistered { user: user(id) });
        }
        state.apply(&PlatformFact::CategoryAdded {
            category: Category {
                id: CATEGORY,
                name: "Outdoors".to_string(),
            },
        });
        state.apply(&PlatformFact::EventCreated { event });
        state
    }

    /// Add a request and keep the event's confirmed counter in step.
    pub fn with_request(
        mut state: PlatformState,
        id: u64,
        requester: UserId,
        status: RequestStatus,
    ) -> PlatformState {
        let mut event = state.event(EVENT).unwrap().clone();
        if status == RequestStatus::Confirmed {
            event.confirmed_requests += 1;
        }
        state.apply(&PlatformFact::RequestSubmitted {
            request: ParticipationRequest {
                id: RequestId::new(id),
                event: EVENT,
                requester,
                status,
                created: test_time(),
            },
            event,
        });
        state
    }
}
