//! Event lifecycle: creation, edits and the publication state machine.
//!
//! ```text
//!            PUBLISH_EVENT (admin, date >= now + 1h)
//!   PENDING ─────────────────────────────────────────► PUBLISHED
//!      │
//!      │ CANCEL_REVIEW (initiator) / REJECT_EVENT (admin)
//!      ▼
//!   CANCELED
//! ```
//!
//! Both PUBLISHED and CANCELED are terminal. An initiator may edit fields
//! only while the event is not published; an administrator may edit fields
//! in any state. Every date written by a create or an edit must be at least
//! two hours ahead.

use super::{PlatformEffects, PlatformEnvironment, capacity, commit, refuse};
use crate::actions::PlatformAction;
use crate::error::{DomainError, Entity};
use crate::facts::PlatformFact;
use crate::state::PlatformState;
use crate::types::{
    Actor, Event, EventId, EventPatch, EventState, NewEvent, StateAction, UserId,
};
use chrono::{DateTime, Duration, Utc};
use convene_core::{SmallVec, reducer::Reducer};
use std::ops::RangeInclusive;

const TITLE_LEN: RangeInclusive<usize> = 3..=120;
const ANNOTATION_LEN: RangeInclusive<usize> = 20..=2000;
const DESCRIPTION_LEN: RangeInclusive<usize> = 20..=7000;

/// Minimum lead time for a date written by a create or an edit.
#[must_use]
pub fn min_lead_time() -> Duration {
    Duration::hours(2)
}

/// Minimum lead time at the moment of publication.
#[must_use]
pub fn min_publish_lead_time() -> Duration {
    Duration::hours(1)
}

/// Reducer for event creation and the state machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleReducer;

impl LifecycleReducer {
    // ========================================================================
    // Validation
    // ========================================================================

    fn check_text(field: &str, value: &str, bounds: &RangeInclusive<usize>) -> Result<(), DomainError> {
        let len = value.trim().chars().count();
        if bounds.contains(&len) {
            Ok(())
        } else {
            Err(DomainError::InvalidInput(format!(
                "Field: {field}. Error: length must be between {} and {}. Value: {len}",
                bounds.start(),
                bounds.end()
            )))
        }
    }

    fn check_lead_time(date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), DomainError> {
        if date < now + min_lead_time() {
            return Err(DomainError::DateTimeViolation(format!(
                "Event date {date} must be at least two hours from now"
            )));
        }
        Ok(())
    }

    fn validate_create_event(
        state: &PlatformState,
        initiator: UserId,
        new_event: &NewEvent,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        state.user(initiator)?;
        state.category(new_event.category)?;
        Self::check_text("title", &new_event.title, &TITLE_LEN)?;
        Self::check_text("annotation", &new_event.annotation, &ANNOTATION_LEN)?;
        Self::check_text("description", &new_event.description, &DESCRIPTION_LEN)?;
        Self::check_lead_time(new_event.event_date, now)
    }

    /// Produce the edited event without touching state.
    fn validate_edit_event(
        state: &PlatformState,
        event_id: EventId,
        actor: Actor,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Event, DomainError> {
        let current = state.event(event_id)?;

        if let Actor::Initiator(user) = actor {
            state.user(user)?;
            if current.initiator != user {
                return Err(DomainError::not_found(Entity::Event, event_id));
            }
            if current.state == EventState::Published {
                return Err(DomainError::RestrictionViolation(
                    "Only pending or canceled events can be changed".to_string(),
                ));
            }
        }

        let mut event = current.clone();
        Self::apply_patch(state, &mut event, patch, now)?;

        if let Some(action) = patch.state_action {
            Self::transition(&mut event, actor, action, now)?;
        }

        Ok(event)
    }

    fn apply_patch(
        state: &PlatformState,
        event: &mut Event,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };

        if let Some(title) = present(&patch.title) {
            Self::check_text("title", &title, &TITLE_LEN)?;
            event.title = title;
        }
        if let Some(annotation) = present(&patch.annotation) {
            Self::check_text("annotation", &annotation, &ANNOTATION_LEN)?;
            event.annotation = annotation;
        }
        if let Some(description) = present(&patch.description) {
            Self::check_text("description", &description, &DESCRIPTION_LEN)?;
            event.description = description;
        }
        if let Some(category) = patch.category {
            state.category(category)?;
            event.category = category;
        }
        if let Some(location) = patch.location {
            event.location = location;
        }
        if let Some(date) = patch.event_date {
            Self::check_lead_time(date, now)?;
            event.event_date = date;
        }
        if let Some(paid) = patch.paid {
            event.paid = paid;
        }
        if let Some(limit) = patch.participant_limit {
            capacity::accepts_limit(event, limit)?;
            event.participant_limit = limit;
        }
        if let Some(moderation) = patch.request_moderation {
            event.request_moderation = moderation;
        }

        Ok(())
    }

    /// Move `event` through the state machine. Leaves it untouched on error.
    fn transition(
        event: &mut Event,
        actor: Actor,
        action: StateAction,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match (actor, action) {
            (Actor::Initiator(_), StateAction::SendToReview) => match event.state {
                EventState::Pending => Ok(()),
                EventState::Published | EventState::Canceled => Err(DomainError::RestrictionViolation(
                    format!("Cannot send a {} event to review", event.state),
                )),
            },

            (Actor::Initiator(_), StateAction::CancelReview) | (Actor::Admin, StateAction::RejectEvent) => {
                if event.state != EventState::Pending {
                    return Err(DomainError::RestrictionViolation(format!(
                        "Cannot cancel the event because it's not in the right state: {}",
                        event.state
                    )));
                }
                event.state = EventState::Canceled;
                Ok(())
            },

            (Actor::Admin, StateAction::PublishEvent) => {
                if event.event_date < now + min_publish_lead_time() {
                    return Err(DomainError::DateTimeViolation(format!(
                        "Event date {} must be at least one hour after publication",
                        event.event_date
                    )));
                }
                if event.state != EventState::Pending {
                    return Err(DomainError::RestrictionViolation(format!(
                        "Cannot publish the event because it's not in the right state: {}",
                        event.state
                    )));
                }
                event.state = EventState::Published;
                event.published_on = Some(now);
                Ok(())
            },

            (Actor::Initiator(_), StateAction::PublishEvent | StateAction::RejectEvent)
            | (Actor::Admin, StateAction::SendToReview | StateAction::CancelReview) => {
                Err(DomainError::RestrictionViolation(format!(
                    "State action {action:?} is not available to {actor:?}"
                )))
            },
        }
    }

    // ========================================================================
    // Command handling
    // ========================================================================

    fn revise(
        state: &mut PlatformState,
        correlation_id: uuid::Uuid,
        event_id: EventId,
        actor: Actor,
        patch: &EventPatch,
        env: &PlatformEnvironment,
    ) -> PlatformEffects {
        let now = env.clock.now();
        match Self::validate_edit_event(state, event_id, actor, patch, now) {
            Ok(event) => {
                if let Some(action) = patch.state_action {
                    tracing::info!(event_id = %event.id, ?action, state = %event.state, "Event state action applied");
                }
                commit(state, correlation_id, PlatformFact::EventRevised { event }, env)
            },
            Err(error) => refuse(correlation_id, error, env),
        }
    }
}

impl Reducer for LifecycleReducer {
    type State = PlatformState;
    type Action = PlatformAction;
    type Environment = PlatformEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> PlatformEffects {
        match action {
            PlatformAction::CreateEvent {
                correlation_id,
                initiator,
                new_event,
            } => {
                let now = env.clock.now();
                if let Err(error) = Self::validate_create_event(state, initiator, &new_event, now) {
                    return refuse(correlation_id, error, env);
                }

                let event = Event {
                    id: state.next_event_id(),
                    title: new_event.title.trim().to_string(),
                    annotation: new_event.annotation.trim().to_string(),
                    description: new_event.description.trim().to_string(),
                    category: new_event.category,
                    initiator,
                    location: new_event.location,
                    paid: new_event.paid.unwrap_or(false),
                    participant_limit: new_event.participant_limit.unwrap_or(0),
                    request_moderation: new_event.request_moderation.unwrap_or(true),
                    state: EventState::Pending,
                    created_on: now,
                    published_on: None,
                    event_date: new_event.event_date,
                    confirmed_requests: 0,
                    rating: 0,
                };
                tracing::info!(event_id = %event.id, initiator = %initiator, "Event created");
                commit(state, correlation_id, PlatformFact::EventCreated { event }, env)
            },

            PlatformAction::EditEvent {
                correlation_id,
                event_id,
                actor,
                patch,
            } => Self::revise(state, correlation_id, event_id, actor, &patch, env),

            PlatformAction::PublishEvent {
                correlation_id,
                event_id,
            } => {
                let patch = EventPatch::state_only(StateAction::PublishEvent);
                Self::revise(state, correlation_id, event_id, Actor::Admin, &patch, env)
            },

            PlatformAction::CancelEvent {
                correlation_id,
                event_id,
                actor,
            } => {
                let action = match actor {
                    Actor::Initiator(_) => StateAction::CancelReview,
                    Actor::Admin => StateAction::RejectEvent,
                };
                let patch = EventPatch::state_only(action);
                Self::revise(state, correlation_id, event_id, actor, &patch, env)
            },

            _ => SmallVec::new(),
        }
    }
}
