//! Rating ledger.
//!
//! A confirmed participant may hold one reaction per event. Every reaction
//! write moves the event's rating and its initiator's rating by the same
//! delta, inside the same fact:
//!
//! | operation | delta |
//! |---|---|
//! | add LIKE / DISLIKE | +1 / -1 |
//! | change to LIKE / DISLIKE | +2 / -2 |
//! | remove LIKE / DISLIKE | -1 / +1 |
//!
//! Canceling a confirmed request removes the requester's reaction the same
//! way, inside the cancellation fact (see [`retract`]).

use super::{PlatformEffects, PlatformEnvironment, commit, refuse};
use crate::actions::PlatformAction;
use crate::error::DomainError;
use crate::facts::{PlatformFact, Retraction};
use crate::metrics::names;
use crate::state::PlatformState;
use crate::types::{Event, EventId, Reaction, ReactionKind, User, UserId};
use chrono::{DateTime, Utc};
use convene_core::{SmallVec, reducer::Reducer};

/// Records touched by one reaction write.
type Ledger = (Reaction, Event, User);

/// Reducer for reactions.
#[derive(Clone, Copy, Debug, Default)]
pub struct RatingReducer;

impl RatingReducer {
    /// Look up the event and its initiator, then move both ratings by `delta`.
    fn rate(
        state: &PlatformState,
        event_id: EventId,
        delta: i64,
    ) -> Result<(Event, User), DomainError> {
        let mut event = state.event(event_id)?.clone();
        let mut initiator = state.user(event.initiator)?.clone();
        event.rating += delta;
        initiator.rating += delta;
        Ok((event, initiator))
    }

    fn validate_add(
        state: &PlatformState,
        event_id: EventId,
        user: UserId,
        kind: ReactionKind,
        now: DateTime<Utc>,
    ) -> Result<Ledger, DomainError> {
        state.user(user)?;
        let event = state.event(event_id)?;

        if event.initiator == user {
            return Err(DomainError::RestrictionViolation(
                "The initiator cannot rate their own event".to_string(),
            ));
        }
        if !state.is_confirmed_participant(event_id, user) {
            return Err(DomainError::RestrictionViolation(format!(
                "User {user} has no confirmed request for event {event_id}"
            )));
        }
        if state.reactions.contains_key(&(event_id, user)) {
            return Err(DomainError::RestrictionViolation(format!(
                "User {user} has already rated event {event_id}"
            )));
        }

        let (event, initiator) = Self::rate(state, event_id, kind.weight())?;
        let reaction = Reaction {
            id: state.next_reaction_id(),
            event: event_id,
            user,
            kind,
            created_on: now,
            updated_on: None,
        };
        Ok((reaction, event, initiator))
    }

    fn validate_change(
        state: &PlatformState,
        event_id: EventId,
        user: UserId,
        kind: ReactionKind,
        now: DateTime<Utc>,
    ) -> Result<Ledger, DomainError> {
        state.user(user)?;
        state.event(event_id)?;
        let existing = state.reaction(event_id, user)?;

        if !state.is_confirmed_participant(event_id, user) {
            return Err(DomainError::RestrictionViolation(format!(
                "User {user} has no confirmed request for event {event_id}"
            )));
        }

        if existing.kind == kind {
            return Err(DomainError::RestrictionViolation(format!(
                "Reaction of user {user} on event {event_id} is already {kind}"
            )));
        }

        let (event, initiator) = Self::rate(state, event_id, 2 * kind.weight())?;
        let reaction = Reaction {
            kind,
            updated_on: Some(now),
            ..existing.clone()
        };
        Ok((reaction, event, initiator))
    }

    fn validate_remove(
        state: &PlatformState,
        event_id: EventId,
        user: UserId,
    ) -> Result<Ledger, DomainError> {
        state.user(user)?;
        state.event(event_id)?;
        let existing = state.reaction(event_id, user)?.clone();

        let (event, initiator) = Self::rate(state, event_id, -existing.kind.weight())?;
        Ok((existing, event, initiator))
    }

    fn record(
        state: &mut PlatformState,
        correlation_id: uuid::Uuid,
        op: &'static str,
        ledger: Result<Ledger, DomainError>,
        into_fact: fn(Reaction, Event, User) -> PlatformFact,
        env: &PlatformEnvironment,
    ) -> PlatformEffects {
        let (reaction, event, initiator) = match ledger {
            Ok(ledger) => ledger,
            Err(error) => return refuse(correlation_id, error, env),
        };

        tracing::info!(
            event_id = %event.id,
            user_id = %reaction.user,
            kind = %reaction.kind,
            op,
            rating = event.rating,
            "Reaction applied"
        );
        metrics::counter!(names::REACTIONS_APPLIED, "op" => op).increment(1);

        let fact = into_fact(reaction, event, initiator);
        commit(state, correlation_id, fact, env)
    }
}

/// Drop `user`'s reaction on `event` and reverse its weight on the event
/// and its initiator.
///
/// Used when the user gives up the seat that allowed the reaction. `event`
/// is the caller's working copy and receives the reversed rating.
pub(crate) fn retract(
    state: &PlatformState,
    event: &mut Event,
    user: UserId,
) -> Result<Option<Retraction>, DomainError> {
    let Some(reaction) = state.reactions.get(&(event.id, user)) else {
        return Ok(None);
    };

    let delta = -reaction.kind.weight();
    let mut initiator = state.user(event.initiator)?.clone();
    event.rating += delta;
    initiator.rating += delta;

    tracing::info!(event_id = %event.id, user_id = %user, kind = %reaction.kind, "Reaction retracted with its seat");
    metrics::counter!(names::REACTIONS_APPLIED, "op" => "retract").increment(1);

    Ok(Some(Retraction {
        reaction: reaction.clone(),
        initiator,
    }))
}

impl Reducer for RatingReducer {
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
            PlatformAction::AddReaction {
                correlation_id,
                event_id,
                user,
                kind,
            } => {
                let ledger = Self::validate_add(state, event_id, user, kind, env.clock.now());
                Self::record(state, correlation_id, "add", ledger, added, env)
            },

            PlatformAction::ChangeReaction {
                correlation_id,
                event_id,
                user,
                kind,
            } => {
                let ledger = Self::validate_change(state, event_id, user, kind, env.clock.now());
                Self::record(state, correlation_id, "change", ledger, changed, env)
            },

            PlatformAction::RemoveReaction {
                correlation_id,
                event_id,
                user,
            } => {
                let ledger = Self::validate_remove(state, event_id, user);
                Self::record(state, correlation_id, "remove", ledger, removed, env)
            },

            _ => SmallVec::new(),
        }
    }
}

fn added(reaction: Reaction, event: Event, initiator: User) -> PlatformFact {
    PlatformFact::ReactionAdded {
        reaction,
        event,
        initiator,
    }
}

fn changed(reaction: Reaction, event: Event, initiator: User) -> PlatformFact {
    PlatformFact::ReactionChanged {
        reaction,
        event,
        initiator,
    }
}

fn removed(reaction: Reaction, event: Event, initiator: User) -> PlatformFact {
    PlatformFact::ReactionRemoved {
        reaction,
        event,
        initiator,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::aggregates::fixtures::{self, ALICE, BOB, EVENT, ORGANIZER};
    use crate::error::ErrorCategory;
    use crate::types::{EventState, RequestId, RequestStatus};
    use convene_testing::ReducerTest;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn add(user: UserId, kind: ReactionKind) -> PlatformAction {
        PlatformAction::AddReaction {
            correlation_id: Uuid::new_v4(),
            event_id: EVENT,
            user,
            kind,
        }
    }

    fn change(user: UserId, kind: ReactionKind) -> PlatformAction {
        PlatformAction::ChangeReaction {
            correlation_id: Uuid::new_v4(),
            event_id: EVENT,
            user,
            kind,
        }
    }

    fn remove(user: UserId) -> PlatformAction {
        PlatformAction::RemoveReaction {
            correlation_id: Uuid::new_v4(),
            event_id: EVENT,
            user,
        }
    }

    fn refused_with(category: ErrorCategory) -> impl FnOnce(&[PlatformAction]) {
        move |actions| match actions {
            [PlatformAction::Refused { error, .. }] => assert_eq!(error.category(), category),
            other => panic!("expected {category:?} refusal, got {other:?}"),
        }
    }

    /// Published event with ALICE confirmed and BOB pending.
    fn participants() -> PlatformState {
        let state = fixtures::state_with(fixtures::event(EventState::Published, 0, false));
        let state = fixtures::with_request(state, 1, ALICE, RequestStatus::Confirmed);
        fixtures::with_request(state, 2, BOB, RequestStatus::Pending)
    }

    fn ratings(state: &PlatformState) -> (i64, i64) {
        (
            state.event(EVENT).unwrap().rating,
            state.user(ORGANIZER).unwrap().rating,
        )
    }

    fn run(state: &mut PlatformState, action: PlatformAction) {
        let _ = RatingReducer.reduce(state, action, &fixtures::env());
    }

    #[test]
    fn like_moves_event_and_initiator() {
        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(participants())
            .when_action(add(ALICE, ReactionKind::Like))
            .then_state(|state| {
                assert_eq!(ratings(state), (1, 1));
                assert_eq!(state.reaction(EVENT, ALICE).unwrap().kind, ReactionKind::Like);
            })
            .then_actions(|actions| {
                assert!(matches!(
                    actions,
                    [PlatformAction::Committed {
                        fact: PlatformFact::ReactionAdded { .. },
                        ..
                    }]
                ));
            })
            .run();
    }

    #[test]
    fn pending_participant_cannot_react() {
        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(participants())
            .when_action(add(BOB, ReactionKind::Dislike))
            .then_state(|state| assert_eq!(ratings(state), (0, 0)))
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn initiator_cannot_react() {
        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(participants())
            .when_action(add(ORGANIZER, ReactionKind::Like))
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn second_reaction_is_refused() {
        let mut state = participants();
        run(&mut state, add(ALICE, ReactionKind::Like));

        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(add(ALICE, ReactionKind::Dislike))
            .then_state(|state| assert_eq!(ratings(state), (1, 1)))
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn reversal_moves_rating_by_two() {
        let mut state = participants();
        run(&mut state, add(ALICE, ReactionKind::Like));

        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(change(ALICE, ReactionKind::Dislike))
            .then_state(|state| {
                assert_eq!(ratings(state), (-1, -1));
                let reaction = state.reaction(EVENT, ALICE).unwrap();
                assert_eq!(reaction.kind, ReactionKind::Dislike);
                assert!(reaction.updated_on.is_some());
            })
            .run();
    }

    #[test]
    fn same_kind_update_is_refused() {
        let mut state = participants();
        run(&mut state, add(ALICE, ReactionKind::Dislike));

        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(change(ALICE, ReactionKind::Dislike))
            .then_state(|state| assert_eq!(ratings(state), (-1, -1)))
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn reversal_needs_a_confirmed_seat() {
        let mut state = participants();
        run(&mut state, add(ALICE, ReactionKind::Like));
        // A seat given up without retracting, as journals written before
        // retraction existed may hold.
        let mut request = state.request(RequestId::new(1)).unwrap().clone();
        request.status = RequestStatus::Canceled;
        let event = state.event(EVENT).unwrap().clone();
        state.apply(&PlatformFact::RequestCanceled {
            request,
            event,
            retracted: None,
        });

        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(change(ALICE, ReactionKind::Dislike))
            .then_state(|state| assert_eq!(ratings(state), (1, 1)))
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn retract_reverses_the_stored_kind() {
        let mut state = participants();
        run(&mut state, add(ALICE, ReactionKind::Dislike));
        let mut event = state.event(EVENT).unwrap().clone();

        let retraction = retract(&state, &mut event, ALICE).unwrap().unwrap();

        assert_eq!(event.rating, 0);
        assert_eq!(retraction.initiator.rating, 0);
        assert_eq!(retraction.reaction.kind, ReactionKind::Dislike);
        assert!(retract(&state, &mut event, BOB).unwrap().is_none());
    }

    #[test]
    fn removing_a_missing_reaction_is_not_found() {
        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(participants())
            .when_action(remove(ALICE))
            .then_actions(refused_with(ErrorCategory::NotFound))
            .run();
    }

    #[test]
    fn missing_initiator_is_not_found() {
        let mut state = participants();
        state.users.remove(&ORGANIZER);

        ReducerTest::new(RatingReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(add(ALICE, ReactionKind::Like))
            .then_state(|state| assert!(state.reactions.is_empty()))
            .then_actions(refused_with(ErrorCategory::NotFound))
            .run();
    }

    proptest! {
        #[test]
        fn add_then_remove_restores_ratings(
            start in -50_i64..50,
            kinds in proptest::collection::vec(any::<bool>(), 0..6),
            last in any::<bool>(),
        ) {
            let kind_of = |like: bool| if like { ReactionKind::Like } else { ReactionKind::Dislike };

            let mut state = participants();
            let mut event = state.event(EVENT).unwrap().clone();
            event.rating = start;
            let mut organizer = state.user(ORGANIZER).unwrap().clone();
            organizer.rating = start * 2;
            state.events.insert(EVENT, event);
            state.users.insert(ORGANIZER, organizer);
            let before = ratings(&state);

            run(&mut state, add(ALICE, kind_of(last)));
            for like in kinds {
                run(&mut state, change(ALICE, kind_of(like)));
            }
            run(&mut state, remove(ALICE));

            prop_assert_eq!(ratings(&state), before);
            prop_assert!(state.reactions.is_empty());
        }
    }
}
