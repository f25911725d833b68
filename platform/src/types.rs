//! Domain types for the Convene event platform.
//!
//! Entities (events, participation requests, reactions, users, categories),
//! their identifiers, and the inputs the platform's commands accept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw identifier
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw identifier
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }

            /// The identifier that follows this one
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of an event
    EventId
);
numeric_id!(
    /// Identifier of a registered user
    UserId
);
numeric_id!(
    /// Identifier of an event category
    CategoryId
);
numeric_id!(
    /// Identifier of a participation request
    RequestId
);
numeric_id!(
    /// Identifier of a reaction
    ReactionId
);
numeric_id!(
    /// Identifier of an event compilation
    CompilationId
);

impl EventId {
    /// Canonical resource path used when counting views
    #[must_use]
    pub fn path(self) -> String {
        format!("/events/{}", self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Publication state of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    /// Awaiting moderation (initial)
    Pending,
    /// Visible to the public and open for requests
    Published,
    /// Withdrawn by the initiator or rejected by an administrator (terminal)
    Canceled,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Published => write!(f, "PUBLISHED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// Status of a participation request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Waiting for the initiator's decision
    Pending,
    /// Holds a seat
    Confirmed,
    /// Turned down by moderation
    Rejected,
    /// Withdrawn by the requester
    Canceled,
}

impl RequestStatus {
    /// Pending and confirmed requests block a new submission for the same pair.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// A participant's opinion of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionKind {
    /// +1
    Like,
    /// -1
    Dislike,
}

impl ReactionKind {
    /// Contribution of one reaction of this kind to a rating
    #[must_use]
    pub const fn weight(self) -> i64 {
        match self {
            Self::Like => 1,
            Self::Dislike => -1,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Like => write!(f, "LIKE"),
            Self::Dislike => write!(f, "DISLIKE"),
        }
    }
}

/// Who is performing a command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// A registered user acting on their own events
    Initiator(UserId),
    /// A platform administrator
    Admin,
}

/// State change requested together with an edit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateAction {
    /// Initiator: keep the event in review
    SendToReview,
    /// Initiator: withdraw the event
    CancelReview,
    /// Administrator: make the event public
    PublishEvent,
    /// Administrator: reject the event
    RejectEvent,
}

/// Outcome applied to a batch of pending requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationDecision {
    /// Move every request to CONFIRMED
    Confirm,
    /// Move every request to REJECTED
    Reject,
}

impl ModerationDecision {
    /// Status the requests end up in
    #[must_use]
    pub const fn target(self) -> RequestStatus {
        match self {
            Self::Confirm => RequestStatus::Confirmed,
            Self::Reject => RequestStatus::Rejected,
        }
    }

    /// Label used in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Reject => "reject",
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Geographic position of an event
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude
    pub lat: f32,
    /// Longitude
    pub lon: f32,
}

/// A registered user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Unique e-mail address
    pub email: String,
    /// Sum of reaction weights across every event this user initiated
    pub rating: i64,
}

/// An event category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identifier
    pub id: CategoryId,
    /// Unique name
    pub name: String,
}

/// A scheduled gathering
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier
    pub id: EventId,
    /// Title (3..=120 characters)
    pub title: String,
    /// Short summary (20..=2000 characters)
    pub annotation: String,
    /// Full description (20..=7000 characters)
    pub description: String,
    /// Category
    pub category: CategoryId,
    /// User who created the event
    pub initiator: UserId,
    /// Where it happens
    pub location: Location,
    /// Whether participation costs money
    pub paid: bool,
    /// Maximum confirmed participants; zero means unlimited
    pub participant_limit: u32,
    /// Whether requests wait for the initiator's decision
    pub request_moderation: bool,
    /// Publication state
    pub state: EventState,
    /// When the event was created
    pub created_on: DateTime<Utc>,
    /// When the event was published
    pub published_on: Option<DateTime<Utc>>,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Number of CONFIRMED requests
    pub confirmed_requests: u32,
    /// Sum of reaction weights
    pub rating: i64,
}

/// A user's request to attend an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRequest {
    /// Identifier
    pub id: RequestId,
    /// Requested event
    pub event: EventId,
    /// Requesting user
    pub requester: UserId,
    /// Current status
    pub status: RequestStatus,
    /// When the request was submitted
    pub created: DateTime<Utc>,
}

/// A participant's like or dislike of an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Identifier
    pub id: ReactionId,
    /// Rated event
    pub event: EventId,
    /// Rating user
    pub user: UserId,
    /// Like or dislike
    pub kind: ReactionKind,
    /// When the reaction was first given
    pub created_on: DateTime<Utc>,
    /// When the reaction last changed kind
    pub updated_on: Option<DateTime<Utc>>,
}

/// An administrator-curated collection of events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compilation {
    /// Identifier
    pub id: CompilationId,
    /// Title, unique ignoring case
    pub title: String,
    /// Shown on the front page
    pub pinned: bool,
    /// Member events, ascending by id
    pub events: Vec<EventId>,
}

// ============================================================================
// Command inputs
// ============================================================================

/// Fields of a new event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Title
    pub title: String,
    /// Short summary
    pub annotation: String,
    /// Full description
    pub description: String,
    /// Category
    pub category: CategoryId,
    /// Where it happens
    pub location: Location,
    /// When it happens; at least two hours from now
    pub event_date: DateTime<Utc>,
    /// Defaults to `false`
    pub paid: Option<bool>,
    /// Defaults to `0` (unlimited)
    pub participant_limit: Option<u32>,
    /// Defaults to `true`
    pub request_moderation: Option<bool>,
}

/// Partial update of an event, optionally with a state change.
///
/// `None` and blank strings leave the field untouched. The acting role is
/// passed alongside the patch and decides which state actions are legal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    /// New title
    pub title: Option<String>,
    /// New summary
    pub annotation: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<CategoryId>,
    /// New location
    pub location: Option<Location>,
    /// New date; at least two hours from now
    pub event_date: Option<DateTime<Utc>>,
    /// New paid flag
    pub paid: Option<bool>,
    /// New participant limit; not below the confirmed count
    pub participant_limit: Option<u32>,
    /// New moderation flag
    pub request_moderation: Option<bool>,
    /// State change applied after the field edits
    pub state_action: Option<StateAction>,
}

impl EventPatch {
    /// A patch that only changes state.
    #[must_use]
    pub fn state_only(action: StateAction) -> Self {
        Self {
            state_action: Some(action),
            ..Self::default()
        }
    }
}

/// Fields of a new compilation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompilation {
    /// Title, 1 to 50 characters
    pub title: String,
    /// Defaults to `false`
    pub pinned: Option<bool>,
    /// Member events; unknown ids are skipped
    pub events: Vec<EventId>,
}

/// Partial update of a compilation.
///
/// `None` leaves a field untouched, and so does an empty event list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationPatch {
    /// New title
    pub title: Option<String>,
    /// New pinned flag
    pub pinned: Option<bool>,
    /// Replacement member events; unknown ids are skipped
    pub events: Option<Vec<EventId>>,
}

/// Requests changed by one moderation batch, split by outcome
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationResult {
    /// Requests now CONFIRMED
    pub confirmed: Vec<ParticipationRequest>,
    /// Requests now REJECTED
    pub rejected: Vec<ParticipationRequest>,
}
