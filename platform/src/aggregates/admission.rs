//! Admission controller for participation requests.
//!
//! A submission to an unlimited or unmoderated event is confirmed on the
//! spot and takes a seat in the same reduction that checked for one. A
//! submission to a moderated, limited event waits as PENDING until the
//! initiator (or an administrator) confirms or rejects it in a batch. Batches
//! are all-or-nothing: one bad id refuses the whole batch.

use super::{PlatformEffects, PlatformEnvironment, capacity, commit, rating, refuse};
use crate::actions::PlatformAction;
use crate::error::{DomainError, Entity};
use crate::facts::{PlatformFact, Retraction};
use crate::metrics::names;
use crate::state::PlatformState;
use crate::types::{
    Actor, Event, EventId, EventState, ModerationDecision, ParticipationRequest, RequestId,
    RequestStatus, UserId,
};
use convene_core::{SmallVec, reducer::Reducer};
use std::collections::BTreeSet;

/// Reducer for participation requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdmissionReducer;

impl AdmissionReducer {
    // ========================================================================
    // Validation
    // ========================================================================

    fn validate_submit(
        state: &PlatformState,
        event_id: EventId,
        requester: UserId,
    ) -> Result<Event, DomainError> {
        state.user(requester)?;
        let event = state.event(event_id)?;

        if state.active_request(event_id, requester).is_some() {
            return Err(DomainError::IntegrityViolation(format!(
                "User {requester} already has an active request for event {event_id}"
            )));
        }
        if event.initiator == requester {
            return Err(DomainError::IntegrityViolation(
                "The initiator cannot request participation in their own event".to_string(),
            ));
        }
        if event.state != EventState::Published {
            return Err(DomainError::IntegrityViolation(format!(
                "Cannot participate in event {event_id} because it is {}",
                event.state
            )));
        }
        if capacity::is_exhausted(event) {
            return Err(DomainError::IntegrityViolation(format!(
                "The participant limit of {} has been reached",
                event.participant_limit
            )));
        }

        Ok(event.clone())
    }

    /// The updated requests and event a moderation batch would produce.
    fn validate_moderation(
        state: &PlatformState,
        event_id: EventId,
        actor: Actor,
        request_ids: &[RequestId],
        decision: ModerationDecision,
    ) -> Result<(Vec<ParticipationRequest>, Event), DomainError> {
        if request_ids.is_empty() {
            return Err(DomainError::InvalidInput(
                "At least one request id is required".to_string(),
            ));
        }

        let event = state.event(event_id)?;
        if let Actor::Initiator(user) = actor {
            state.user(user)?;
            if event.initiator != user {
                return Err(DomainError::not_found(Entity::Event, event_id));
            }
        }

        if capacity::is_exhausted(event) {
            return Err(DomainError::RestrictionViolation(format!(
                "The participant limit of {} has been reached",
                event.participant_limit
            )));
        }

        let mut seen = BTreeSet::new();
        let mut batch = Vec::with_capacity(request_ids.len());
        for &id in request_ids {
            if !seen.insert(id) {
                continue;
            }
            let request = state.request(id)?;
            if request.event != event_id {
                return Err(DomainError::not_found(Entity::Request, id));
            }
            if request.status != RequestStatus::Pending {
                return Err(DomainError::RestrictionViolation(format!(
                    "Request {id} must have status PENDING but is {}",
                    request.status
                )));
            }
            batch.push(ParticipationRequest {
                status: decision.target(),
                ..request.clone()
            });
        }

        let seats = u32::try_from(batch.len()).unwrap_or(u32::MAX);
        let mut event = event.clone();
        if decision == ModerationDecision::Confirm {
            if !capacity::has_room_for(&event, seats) {
                return Err(DomainError::RestrictionViolation(format!(
                    "Confirming {seats} requests would exceed the participant limit of {}",
                    event.participant_limit
                )));
            }
            capacity::reserve(&mut event, seats);
        }

        Ok((batch, event))
    }

    /// A confirmed requester also loses the reaction their seat allowed.
    fn validate_cancel(
        state: &PlatformState,
        requester: UserId,
        request_id: RequestId,
    ) -> Result<(ParticipationRequest, Event, Option<Retraction>), DomainError> {
        state.user(requester)?;
        let request = state.request(request_id)?;
        if request.requester != requester {
            return Err(DomainError::not_found(Entity::Request, request_id));
        }

        let mut event = state.event(request.event)?.clone();
        let mut retracted = None;
        if request.status == RequestStatus::Confirmed {
            capacity::release(&mut event);
            retracted = rating::retract(state, &mut event, requester)?;
        }

        Ok((
            ParticipationRequest {
                status: RequestStatus::Canceled,
                ..request.clone()
            },
            event,
            retracted,
        ))
    }
}

impl Reducer for AdmissionReducer {
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
            PlatformAction::SubmitRequest {
                correlation_id,
                event_id,
                requester,
            } => {
                let mut event = match Self::validate_submit(state, event_id, requester) {
                    Ok(event) => event,
                    Err(error) => return refuse(correlation_id, error, env),
                };

                let status = if capacity::is_unlimited(&event) || !event.request_moderation {
                    capacity::reserve(&mut event, 1);
                    RequestStatus::Confirmed
                } else {
                    RequestStatus::Pending
                };

                let request = ParticipationRequest {
                    id: state.next_request_id(),
                    event: event_id,
                    requester,
                    status,
                    created: env.clock.now(),
                };

                tracing::info!(
                    request_id = %request.id,
                    event_id = %event_id,
                    %status,
                    confirmed = event.confirmed_requests,
                    "Participation request submitted"
                );
                metrics::counter!(names::REQUESTS_SUBMITTED, "status" => status_label(status))
                    .increment(1);

                commit(
                    state,
                    correlation_id,
                    PlatformFact::RequestSubmitted { request, event },
                    env,
                )
            },

            PlatformAction::ModerateRequests {
                correlation_id,
                event_id,
                actor,
                request_ids,
                decision,
            } => match Self::validate_moderation(state, event_id, actor, &request_ids, decision) {
                Ok((requests, event)) => {
                    tracing::info!(
                        event_id = %event_id,
                        decision = decision.as_str(),
                        count = requests.len(),
                        confirmed = event.confirmed_requests,
                        "Requests moderated"
                    );
                    metrics::counter!(names::REQUESTS_MODERATED, "decision" => decision.as_str())
                        .increment(requests.len() as u64);

                    commit(
                        state,
                        correlation_id,
                        PlatformFact::RequestsModerated { requests, event },
                        env,
                    )
                },
                Err(error) => refuse(correlation_id, error, env),
            },

            PlatformAction::CancelRequest {
                correlation_id,
                requester,
                request_id,
            } => match Self::validate_cancel(state, requester, request_id) {
                Ok((request, event, retracted)) => {
                    tracing::info!(
                        request_id = %request_id,
                        event_id = %event.id,
                        reaction_retracted = retracted.is_some(),
                        "Participation request canceled"
                    );
                    commit(
                        state,
                        correlation_id,
                        PlatformFact::RequestCanceled {
                            request,
                            event,
                            retracted,
                        },
                        env,
                    )
                },
                Err(error) => refuse(correlation_id, error, env),
            },

            _ => SmallVec::new(),
        }
    }
}

const fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Confirmed => "confirmed",
        RequestStatus::Rejected => "rejected",
        RequestStatus::Canceled => "canceled",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::aggregates::fixtures::{self, ALICE, BOB, EVENT, ORGANIZER};
    use crate::error::ErrorCategory;
    use crate::types::{Reaction, ReactionId, ReactionKind};
    use convene_testing::{ReducerTest, test_time};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn submit(requester: UserId) -> PlatformAction {
        PlatformAction::SubmitRequest {
            correlation_id: Uuid::new_v4(),
            event_id: EVENT,
            requester,
        }
    }

    fn moderate(ids: &[u64], decision: ModerationDecision) -> PlatformAction {
        PlatformAction::ModerateRequests {
            correlation_id: Uuid::new_v4(),
            event_id: EVENT,
            actor: Actor::Initiator(ORGANIZER),
            request_ids: ids.iter().copied().map(RequestId::new).collect(),
            decision,
        }
    }

    fn refused_with(category: ErrorCategory) -> impl FnOnce(&[PlatformAction]) {
        move |actions| match actions {
            [PlatformAction::Refused { error, .. }] => assert_eq!(error.category(), category),
            other => panic!("expected {category:?} refusal, got {other:?}"),
        }
    }

    fn published(limit: u32, moderation: bool) -> PlatformState {
        fixtures::state_with(fixtures::event(EventState::Published, limit, moderation))
    }

    fn status_of(state: &PlatformState, id: u64) -> RequestStatus {
        state.request(RequestId::new(id)).unwrap().status
    }

    // ========== Submission ==========

    #[test]
    fn unlimited_event_auto_confirms_even_when_moderated() {
        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(published(0, true))
            .when_action(submit(ALICE))
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Confirmed);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 1);
            })
            .then_actions(|actions| {
                assert!(matches!(
                    actions,
                    [PlatformAction::Committed {
                        fact: PlatformFact::RequestSubmitted { .. },
                        ..
                    }]
                ));
            })
            .run();
    }

    #[test]
    fn unmoderated_limited_event_auto_confirms() {
        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(published(2, false))
            .when_action(submit(ALICE))
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Confirmed);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 1);
            })
            .run();
    }

    #[test]
    fn moderated_limited_event_queues_request() {
        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(published(1, true))
            .when_action(submit(ALICE))
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Pending);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 0);
            })
            .run();
    }

    #[test]
    fn duplicate_active_request_is_refused() {
        let state = fixtures::with_request(published(0, true), 1, ALICE, RequestStatus::Pending);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(submit(ALICE))
            .then_state(|state| assert_eq!(state.requests.len(), 1))
            .then_actions(refused_with(ErrorCategory::IntegrityViolation))
            .run();
    }

    #[test]
    fn resubmission_after_cancel_creates_new_row() {
        let state = fixtures::with_request(published(0, true), 1, ALICE, RequestStatus::Canceled);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(submit(ALICE))
            .then_state(|state| {
                assert_eq!(state.requests.len(), 2);
                assert_eq!(status_of(state, 2), RequestStatus::Confirmed);
            })
            .run();
    }

    #[test]
    fn initiator_cannot_request_own_event() {
        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(published(0, true))
            .when_action(submit(ORGANIZER))
            .then_actions(refused_with(ErrorCategory::IntegrityViolation))
            .run();
    }

    #[test]
    fn unpublished_event_refuses_requests() {
        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(fixtures::state_with(fixtures::event(EventState::Pending, 0, true)))
            .when_action(submit(ALICE))
            .then_actions(refused_with(ErrorCategory::IntegrityViolation))
            .run();
    }

    #[test]
    fn full_event_refuses_requests() {
        let state = fixtures::with_request(published(1, false), 1, ALICE, RequestStatus::Confirmed);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(submit(BOB))
            .then_state(|state| assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 1))
            .then_actions(refused_with(ErrorCategory::IntegrityViolation))
            .run();
    }

    #[test]
    fn unknown_user_is_not_found() {
        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(published(0, true))
            .when_action(submit(UserId::new(42)))
            .then_actions(refused_with(ErrorCategory::NotFound))
            .run();
    }

    // ========== Moderation ==========

    #[test]
    fn confirm_batch_takes_seats() {
        let state = fixtures::with_request(published(2, true), 1, ALICE, RequestStatus::Pending);
        let state = fixtures::with_request(state, 2, BOB, RequestStatus::Pending);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(moderate(&[1, 2, 2], ModerationDecision::Confirm))
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Confirmed);
                assert_eq!(status_of(state, 2), RequestStatus::Confirmed);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 2);
            })
            .run();
    }

    #[test]
    fn overshooting_batch_changes_nothing() {
        let state = fixtures::with_request(published(1, true), 1, ALICE, RequestStatus::Pending);
        let state = fixtures::with_request(state, 2, BOB, RequestStatus::Pending);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(moderate(&[1, 2], ModerationDecision::Confirm))
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Pending);
                assert_eq!(status_of(state, 2), RequestStatus::Pending);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 0);
            })
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn non_pending_request_rejects_whole_batch() {
        let state = fixtures::with_request(published(5, true), 1, ALICE, RequestStatus::Pending);
        let state = fixtures::with_request(state, 2, BOB, RequestStatus::Rejected);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(moderate(&[1, 2], ModerationDecision::Reject))
            .then_state(|state| assert_eq!(status_of(state, 1), RequestStatus::Pending))
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn reject_leaves_counter_alone() {
        let state = fixtures::with_request(published(3, true), 1, ALICE, RequestStatus::Pending);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(moderate(&[1], ModerationDecision::Reject))
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Rejected);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 0);
                assert!(state.active_request(EVENT, ALICE).is_none());
            })
            .run();
    }

    #[test]
    fn exhausted_event_refuses_any_batch() {
        let state = fixtures::with_request(published(1, true), 1, ALICE, RequestStatus::Confirmed);
        let state = fixtures::with_request(state, 2, BOB, RequestStatus::Pending);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(moderate(&[2], ModerationDecision::Reject))
            .then_actions(refused_with(ErrorCategory::RestrictionViolation))
            .run();
    }

    #[test]
    fn empty_batch_is_invalid() {
        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(published(1, true))
            .when_action(moderate(&[], ModerationDecision::Confirm))
            .then_actions(refused_with(ErrorCategory::InvalidInput))
            .run();
    }

    #[test]
    fn only_the_initiator_moderates() {
        let state = fixtures::with_request(published(2, true), 1, ALICE, RequestStatus::Pending);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(PlatformAction::ModerateRequests {
                correlation_id: Uuid::new_v4(),
                event_id: EVENT,
                actor: Actor::Initiator(BOB),
                request_ids: vec![RequestId::new(1)],
                decision: ModerationDecision::Confirm,
            })
            .then_actions(refused_with(ErrorCategory::NotFound))
            .run();
    }

    // ========== Self-cancel ==========

    #[test]
    fn canceling_confirmed_request_releases_seat() {
        let state = fixtures::with_request(published(1, false), 1, ALICE, RequestStatus::Confirmed);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(PlatformAction::CancelRequest {
                correlation_id: Uuid::new_v4(),
                requester: ALICE,
                request_id: RequestId::new(1),
            })
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Canceled);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 0);
            })
            .run();
    }

    #[test]
    fn canceling_a_seat_retracts_its_reaction() {
        let mut state = fixtures::with_request(published(0, false), 1, ALICE, RequestStatus::Confirmed);
        let mut event = state.event(EVENT).unwrap().clone();
        let mut organizer = state.user(ORGANIZER).unwrap().clone();
        event.rating = 1;
        organizer.rating = 1;
        state.apply(&PlatformFact::ReactionAdded {
            reaction: Reaction {
                id: ReactionId::new(1),
                event: EVENT,
                user: ALICE,
                kind: ReactionKind::Like,
                created_on: test_time(),
                updated_on: None,
            },
            event,
            initiator: organizer,
        });

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(PlatformAction::CancelRequest {
                correlation_id: Uuid::new_v4(),
                requester: ALICE,
                request_id: RequestId::new(1),
            })
            .then_state(|state| {
                assert!(state.reaction(EVENT, ALICE).is_err());
                assert_eq!(state.event(EVENT).unwrap().rating, 0);
                assert_eq!(state.user(ORGANIZER).unwrap().rating, 0);
            })
            .then_actions(|actions| match actions {
                [PlatformAction::Committed {
                    fact: PlatformFact::RequestCanceled { retracted: Some(retraction), .. },
                    ..
                }] => {
                    assert_eq!(retraction.reaction.user, ALICE);
                    assert_eq!(retraction.initiator.rating, 0);
                },
                other => panic!("expected a retraction, got {other:?}"),
            })
            .run();
    }

    #[test]
    fn canceling_twice_is_harmless() {
        let state = fixtures::with_request(published(1, false), 1, ALICE, RequestStatus::Canceled);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(PlatformAction::CancelRequest {
                correlation_id: Uuid::new_v4(),
                requester: ALICE,
                request_id: RequestId::new(1),
            })
            .then_state(|state| {
                assert_eq!(status_of(state, 1), RequestStatus::Canceled);
                assert_eq!(state.event(EVENT).unwrap().confirmed_requests, 0);
            })
            .then_actions(|actions| {
                assert!(matches!(actions, [PlatformAction::Committed { .. }]));
            })
            .run();
    }

    #[test]
    fn cannot_cancel_someone_elses_request() {
        let state = fixtures::with_request(published(0, true), 1, ALICE, RequestStatus::Confirmed);

        ReducerTest::new(AdmissionReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(PlatformAction::CancelRequest {
                correlation_id: Uuid::new_v4(),
                requester: BOB,
                request_id: RequestId::new(1),
            })
            .then_state(|state| assert_eq!(status_of(state, 1), RequestStatus::Confirmed))
            .then_actions(refused_with(ErrorCategory::NotFound))
            .run();
    }

    // ========== Capacity invariant ==========

    #[derive(Clone, Debug)]
    enum Op {
        Submit(u64),
        Confirm(Vec<u64>),
        Reject(u64),
        Cancel(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (2_u64..12).prop_map(Op::Submit),
            proptest::collection::vec(1_u64..24, 1..4).prop_map(Op::Confirm),
            (1_u64..24).prop_map(Op::Reject),
            (1_u64..24).prop_map(Op::Cancel),
        ]
    }

    fn action_for(state: &PlatformState, op: Op) -> Option<PlatformAction> {
        match op {
            Op::Submit(user) => Some(submit(UserId::new(user))),
            Op::Confirm(ids) => Some(moderate(&ids, ModerationDecision::Confirm)),
            Op::Reject(id) => Some(moderate(&[id], ModerationDecision::Reject)),
            Op::Cancel(id) => state.request(RequestId::new(id)).ok().map(|request| {
                PlatformAction::CancelRequest {
                    correlation_id: Uuid::new_v4(),
                    requester: request.requester,
                    request_id: request.id,
                }
            }),
        }
    }

    proptest! {
        #[test]
        fn confirmed_never_exceeds_limit(
            limit in 1_u32..5,
            moderation in any::<bool>(),
            ops in proptest::collection::vec(op(), 1..40),
        ) {
            let mut state = published(limit, moderation);
            for id in 4..12 {
                state.apply(&PlatformFact::UserRegistered {
                    user: fixtures::user(UserId::new(id)),
                });
            }
            let env = fixtures::env();

            for op in ops {
                if let Some(action) = action_for(&state, op) {
                    let _ = AdmissionReducer.reduce(&mut state, action, &env);
                }

                let event = state.event(EVENT).unwrap();
                prop_assert!(event.confirmed_requests <= limit);
                prop_assert_eq!(event.confirmed_requests, state.count_confirmed(EVENT));
            }
        }
    }
}
