//! Facts committed by the platform reducers.
//!
//! Each fact carries full snapshots of the records it touched, so applying a
//! fact is an upsert and replaying the journal in sequence order rebuilds the
//! exact state.

use crate::types::{Category, Compilation, Event, ParticipationRequest, Reaction, User};
use convene_core::journal::Fact;
use serde::{Deserialize, Serialize};

/// A reaction removed because its author gave up their seat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Retraction {
    /// The reaction as it was before removal
    pub reaction: Reaction,
    /// The event's initiator with their rating restored
    pub initiator: User,
}

/// A state change that has been committed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlatformFact {
    /// A user registered.
    UserRegistered {
        /// The new user
        user: User,
    },

    /// A category was added.
    CategoryAdded {
        /// The new category
        category: Category,
    },

    /// An event was created in PENDING.
    EventCreated {
        /// The new event
        event: Event,
    },

    /// An event's fields or state changed.
    EventRevised {
        /// The event after the change
        event: Event,
    },

    /// A participation request was accepted.
    RequestSubmitted {
        /// The new request (PENDING or CONFIRMED)
        request: ParticipationRequest,
        /// The event, with its confirmed count after the submission
        event: Event,
    },

    /// A batch of pending requests was confirmed or rejected.
    RequestsModerated {
        /// The requests after the decision
        requests: Vec<ParticipationRequest>,
        /// The event, with its confirmed count after the decision
        event: Event,
    },

    /// A requester withdrew their request.
    RequestCanceled {
        /// The request, now CANCELED
        request: ParticipationRequest,
        /// The event, with any released seat and retracted reaction
        event: Event,
        /// The requester's reaction, dropped with their seat
        retracted: Option<Retraction>,
    },

    /// A participant reacted to an event.
    ReactionAdded {
        /// The new reaction
        reaction: Reaction,
        /// The event with its new rating
        event: Event,
        /// The event's initiator with their new rating
        initiator: User,
    },

    /// A participant reversed their reaction.
    ReactionChanged {
        /// The reaction with its new kind
        reaction: Reaction,
        /// The event with its new rating
        event: Event,
        /// The event's initiator with their new rating
        initiator: User,
    },

    /// A participant withdrew their reaction.
    ReactionRemoved {
        /// The reaction as it was before removal
        reaction: Reaction,
        /// The event with its new rating
        event: Event,
        /// The event's initiator with their new rating
        initiator: User,
    },

    /// An administrator created a compilation.
    CompilationAdded {
        /// The new compilation
        compilation: Compilation,
    },

    /// An administrator changed a compilation.
    CompilationUpdated {
        /// The compilation after the change
        compilation: Compilation,
    },

    /// An administrator deleted a compilation.
    CompilationDeleted {
        /// The compilation as it was before deletion
        compilation: Compilation,
    },
}

impl PlatformFact {
    /// The event this fact touched, if any.
    #[must_use]
    pub const fn event(&self) -> Option<&Event> {
        match self {
            Self::UserRegistered { .. }
            | Self::CategoryAdded { .. }
            | Self::CompilationAdded { .. }
            | Self::CompilationUpdated { .. }
            | Self::CompilationDeleted { .. } => None,
            Self::EventCreated { event }
            | Self::EventRevised { event }
            | Self::RequestSubmitted { event, .. }
            | Self::RequestsModerated { event, .. }
            | Self::RequestCanceled { event, .. }
            | Self::ReactionAdded { event, .. }
            | Self::ReactionChanged { event, .. }
            | Self::ReactionRemoved { event, .. } => Some(event),
        }
    }
}

impl Fact for PlatformFact {
    fn fact_type(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "UserRegistered.v1",
            Self::CategoryAdded { .. } => "CategoryAdded.v1",
            Self::EventCreated { .. } => "EventCreated.v1",
            Self::EventRevised { .. } => "EventRevised.v1",
            Self::RequestSubmitted { .. } => "RequestSubmitted.v1",
            Self::RequestsModerated { .. } => "RequestsModerated.v1",
            Self::RequestCanceled { .. } => "RequestCanceled.v1",
            Self::ReactionAdded { .. } => "ReactionAdded.v1",
            Self::ReactionChanged { .. } => "ReactionChanged.v1",
            Self::ReactionRemoved { .. } => "ReactionRemoved.v1",
            Self::CompilationAdded { .. } => "CompilationAdded.v1",
            Self::CompilationUpdated { .. } => "CompilationUpdated.v1",
            Self::CompilationDeleted { .. } => "CompilationDeleted.v1",
        }
    }
}
