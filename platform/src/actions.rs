//! Actions accepted by the platform reducers.
//!
//! Commands carry a correlation id chosen by the caller. Every command ends in
//! exactly one outcome action with the same id: [`PlatformAction::Committed`]
//! when a fact was applied, [`PlatformAction::Refused`] when a rule said no.

use crate::error::DomainError;
use crate::facts::PlatformFact;
use crate::types::{
    Actor, CompilationId, CompilationPatch, EventId, EventPatch, ModerationDecision,
    NewCompilation, NewEvent, ReactionKind, RequestId, UserId,
};
use uuid::Uuid;

/// Input to the platform reducer.
#[derive(Clone, Debug, PartialEq)]
pub enum PlatformAction {
    // ========== Directory ==========
    /// Register a user with a unique e-mail.
    RegisterUser {
        /// Correlation id
        correlation_id: Uuid,
        /// Display name
        name: String,
        /// E-mail address
        email: String,
    },

    /// Add a category with a unique name.
    AddCategory {
        /// Correlation id
        correlation_id: Uuid,
        /// Category name
        name: String,
    },

    // ========== Event lifecycle ==========
    /// Create an event in PENDING.
    CreateEvent {
        /// Correlation id
        correlation_id: Uuid,
        /// Creating user
        initiator: UserId,
        /// Event fields
        new_event: NewEvent,
    },

    /// Edit fields and optionally change state.
    EditEvent {
        /// Correlation id
        correlation_id: Uuid,
        /// Event to edit
        event_id: EventId,
        /// Initiator or administrator
        actor: Actor,
        /// Changes
        patch: EventPatch,
    },

    /// Administrator publishes a pending event.
    PublishEvent {
        /// Correlation id
        correlation_id: Uuid,
        /// Event to publish
        event_id: EventId,
    },

    /// Initiator withdraws or administrator rejects an event.
    CancelEvent {
        /// Correlation id
        correlation_id: Uuid,
        /// Event to cancel
        event_id: EventId,
        /// Initiator or administrator
        actor: Actor,
    },

    // ========== Admission ==========
    /// A user asks to attend an event.
    SubmitRequest {
        /// Correlation id
        correlation_id: Uuid,
        /// Requested event
        event_id: EventId,
        /// Requesting user
        requester: UserId,
    },

    /// Confirm or reject a batch of pending requests.
    ModerateRequests {
        /// Correlation id
        correlation_id: Uuid,
        /// Event the requests belong to
        event_id: EventId,
        /// Initiator or administrator
        actor: Actor,
        /// Requests in the batch
        request_ids: Vec<RequestId>,
        /// Confirm or reject
        decision: ModerationDecision,
    },

    /// A requester withdraws their own request.
    CancelRequest {
        /// Correlation id
        correlation_id: Uuid,
        /// Requesting user
        requester: UserId,
        /// Request to withdraw
        request_id: RequestId,
    },

    // ========== Rating ==========
    /// A confirmed participant likes or dislikes an event.
    AddReaction {
        /// Correlation id
        correlation_id: Uuid,
        /// Rated event
        event_id: EventId,
        /// Rating user
        user: UserId,
        /// Like or dislike
        kind: ReactionKind,
    },

    /// A participant reverses their reaction.
    ChangeReaction {
        /// Correlation id
        correlation_id: Uuid,
        /// Rated event
        event_id: EventId,
        /// Rating user
        user: UserId,
        /// New kind, different from the stored one
        kind: ReactionKind,
    },

    /// A participant withdraws their reaction.
    RemoveReaction {
        /// Correlation id
        correlation_id: Uuid,
        /// Rated event
        event_id: EventId,
        /// Rating user
        user: UserId,
    },

    // ========== Compilations ==========
    /// Administrator creates a compilation.
    AddCompilation {
        /// Correlation id
        correlation_id: Uuid,
        /// Compilation fields
        new_compilation: NewCompilation,
    },

    /// Administrator changes a compilation.
    UpdateCompilation {
        /// Correlation id
        correlation_id: Uuid,
        /// Compilation to change
        compilation_id: CompilationId,
        /// Changes
        patch: CompilationPatch,
    },

    /// Administrator deletes a compilation.
    DeleteCompilation {
        /// Correlation id
        correlation_id: Uuid,
        /// Compilation to delete
        compilation_id: CompilationId,
    },

    // ========== Outcomes ==========
    /// The command's fact was applied and scheduled for the journal.
    Committed {
        /// Correlation id of the command
        correlation_id: Uuid,
        /// Sequence number of the fact
        sequence: u64,
        /// The fact
        fact: PlatformFact,
    },

    /// The command was refused; nothing changed.
    Refused {
        /// Correlation id of the command
        correlation_id: Uuid,
        /// Why
        error: DomainError,
    },
}

impl PlatformAction {
    /// Correlation id carried by this action.
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        match self {
            Self::RegisterUser { correlation_id, .. }
            | Self::AddCategory { correlation_id, .. }
            | Self::CreateEvent { correlation_id, .. }
            | Self::EditEvent { correlation_id, .. }
            | Self::PublishEvent { correlation_id, .. }
            | Self::CancelEvent { correlation_id, .. }
            | Self::SubmitRequest { correlation_id, .. }
            | Self::ModerateRequests { correlation_id, .. }
            | Self::CancelRequest { correlation_id, .. }
            | Self::AddReaction { correlation_id, .. }
            | Self::ChangeReaction { correlation_id, .. }
            | Self::RemoveReaction { correlation_id, .. }
            | Self::AddCompilation { correlation_id, .. }
            | Self::UpdateCompilation { correlation_id, .. }
            | Self::DeleteCompilation { correlation_id, .. }
            | Self::Committed { correlation_id, .. }
            | Self::Refused { correlation_id, .. } => *correlation_id,
        }
    }

    /// True for [`PlatformAction::Committed`] and [`PlatformAction::Refused`].
    #[must_use]
    pub const fn is_outcome(&self) -> bool {
        matches!(self, Self::Committed { .. } | Self::Refused { .. })
    }

    /// True for the outcome of the command with `correlation_id`.
    #[must_use]
    pub fn is_outcome_of(&self, correlation_id: Uuid) -> bool {
        self.is_outcome() && self.correlation_id() == correlation_id
    }
}
