//! In-memory platform state.
//!
//! Records live in ordered maps keyed by identifier and refer to each other
//! by id only. Secondary indexes answer the uniqueness questions the
//! reducers ask on every command (active request per pair, e-mail, category
//! name, compilation title). State only changes through [`PlatformState::apply`].

use crate::error::{DomainError, Entity};
use crate::facts::PlatformFact;
use crate::types::{
    Category, CategoryId, Compilation, CompilationId, Event, EventId, ParticipationRequest,
    Reaction, ReactionId, RequestId, RequestStatus, User, UserId,
};
use convene_core::journal::{JournalEntry, JournalError};
use std::collections::BTreeMap;

/// Everything the platform knows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlatformState {
    /// Events by id
    pub events: BTreeMap<EventId, Event>,
    /// Participation requests by id
    pub requests: BTreeMap<RequestId, ParticipationRequest>,
    /// Reactions by (event, user)
    pub reactions: BTreeMap<(EventId, UserId), Reaction>,
    /// Users by id
    pub users: BTreeMap<UserId, User>,
    /// Categories by id
    pub categories: BTreeMap<CategoryId, Category>,
    /// Compilations by id
    pub compilations: BTreeMap<CompilationId, Compilation>,
    active_requests: BTreeMap<(EventId, UserId), RequestId>,
    emails: BTreeMap<String, UserId>,
    category_names: BTreeMap<String, CategoryId>,
    compilation_titles: BTreeMap<String, CompilationId>,
    last_event_id: u64,
    last_user_id: u64,
    last_category_id: u64,
    last_request_id: u64,
    last_reaction_id: u64,
    last_compilation_id: u64,
    version: u64,
}

impl PlatformState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state by applying journal entries in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Decode`] if an entry does not hold a
    /// [`PlatformFact`].
    pub fn replay(entries: &[JournalEntry]) -> Result<Self, JournalError> {
        let mut ordered: Vec<&JournalEntry> = entries.iter().collect();
        ordered.sort_by_key(|entry| entry.sequence);

        let mut state = Self::new();
        for entry in ordered {
            let fact: PlatformFact = entry.decode()?;
            state.apply(&fact);
            // Sequences skipped by failed appends stay skipped.
            state.version = state.version.max(entry.sequence);
        }
        Ok(state)
    }

    /// Sequence number of the last applied fact.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Apply a committed fact and return its sequence number.
    pub fn apply(&mut self, fact: &PlatformFact) -> u64 {
        match fact {
            PlatformFact::UserRegistered { user } => self.upsert_user(user),
            PlatformFact::CategoryAdded { category } => {
                self.last_category_id = self.last_category_id.max(category.id.value());
                self.category_names
                    .insert(normalize(&category.name), category.id);
                self.categories.insert(category.id, category.clone());
            },
            PlatformFact::EventCreated { event } | PlatformFact::EventRevised { event } => {
                self.upsert_event(event);
            },
            PlatformFact::RequestSubmitted { request, event } => {
                self.upsert_request(request);
                self.upsert_event(event);
            },
            PlatformFact::RequestCanceled {
                request,
                event,
                retracted,
            } => {
                self.upsert_request(request);
                self.upsert_event(event);
                if let Some(retraction) = retracted {
                    self.reactions
                        .remove(&(retraction.reaction.event, retraction.reaction.user));
                    self.upsert_user(&retraction.initiator);
                }
            },
            PlatformFact::RequestsModerated { requests, event } => {
                for request in requests {
                    self.upsert_request(request);
                }
                self.upsert_event(event);
            },
            PlatformFact::ReactionAdded {
                reaction,
                event,
                initiator,
            }
            | PlatformFact::ReactionChanged {
                reaction,
                event,
                initiator,
            } => {
                self.last_reaction_id = self.last_reaction_id.max(reaction.id.value());
                self.reactions
                    .insert((reaction.event, reaction.user), reaction.clone());
                self.upsert_event(event);
                self.upsert_user(initiator);
            },
            PlatformFact::ReactionRemoved {
                reaction,
                event,
                initiator,
            } => {
                self.reactions.remove(&(reaction.event, reaction.user));
                self.upsert_event(event);
                self.upsert_user(initiator);
            },
            PlatformFact::CompilationAdded { compilation }
            | PlatformFact::CompilationUpdated { compilation } => {
                self.upsert_compilation(compilation);
            },
            PlatformFact::CompilationDeleted { compilation } => {
                self.compilation_titles.remove(&normalize(&compilation.title));
                self.compilations.remove(&compilation.id);
            },
        }

        self.version += 1;
        self.version
    }

    fn upsert_user(&mut self, user: &User) {
        self.last_user_id = self.last_user_id.max(user.id.value());
        self.emails.insert(normalize(&user.email), user.id);
        self.users.insert(user.id, user.clone());
    }

    fn upsert_event(&mut self, event: &Event) {
        self.last_event_id = self.last_event_id.max(event.id.value());
        self.events.insert(event.id, event.clone());
    }

    fn upsert_compilation(&mut self, compilation: &Compilation) {
        self.last_compilation_id = self.last_compilation_id.max(compilation.id.value());
        if let Some(previous) = self.compilations.get(&compilation.id) {
            self.compilation_titles.remove(&normalize(&previous.title));
        }
        self.compilation_titles
            .insert(normalize(&compilation.title), compilation.id);
        self.compilations.insert(compilation.id, compilation.clone());
    }

    fn upsert_request(&mut self, request: &ParticipationRequest) {
        self.last_request_id = self.last_request_id.max(request.id.value());
        let pair = (request.event, request.requester);
        if request.status.is_active() {
            self.active_requests.insert(pair, request.id);
        } else if self.active_requests.get(&pair) == Some(&request.id) {
            self.active_requests.remove(&pair);
        }
        self.requests.insert(request.id, request.clone());
    }

    // ========================================================================
    // Identifier allocation
    // ========================================================================

    /// Identifier the next created event receives.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        EventId::new(self.last_event_id + 1)
    }

    /// Identifier the next registered user receives.
    #[must_use]
    pub const fn next_user_id(&self) -> UserId {
        UserId::new(self.last_user_id + 1)
    }

    /// Identifier the next category receives.
    #[must_use]
    pub const fn next_category_id(&self) -> CategoryId {
        CategoryId::new(self.last_category_id + 1)
    }

    /// Identifier the next participation request receives.
    #[must_use]
    pub const fn next_request_id(&self) -> RequestId {
        RequestId::new(self.last_request_id + 1)
    }

    /// Identifier the next reaction receives.
    #[must_use]
    pub const fn next_reaction_id(&self) -> ReactionId {
        ReactionId::new(self.last_reaction_id + 1)
    }

    /// Identifier the next compilation receives.
    #[must_use]
    pub const fn next_compilation_id(&self) -> CompilationId {
        CompilationId::new(self.last_compilation_id + 1)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Event by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if there is no such event.
    pub fn event(&self, id: EventId) -> Result<&Event, DomainError> {
        self.events
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::Event, id))
    }

    /// User by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if there is no such user.
    pub fn user(&self, id: UserId) -> Result<&User, DomainError> {
        self.users
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::User, id))
    }

    /// Category by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if there is no such category.
    pub fn category(&self, id: CategoryId) -> Result<&Category, DomainError> {
        self.categories
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::Category, id))
    }

    /// Compilation by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if there is no such compilation.
    pub fn compilation(&self, id: CompilationId) -> Result<&Compilation, DomainError> {
        self.compilations
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::Compilation, id))
    }

    /// Participation request by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if there is no such request.
    pub fn request(&self, id: RequestId) -> Result<&ParticipationRequest, DomainError> {
        self.requests
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::Request, id))
    }

    /// Reaction of `user` on `event`.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] if the user has not reacted.
    pub fn reaction(&self, event: EventId, user: UserId) -> Result<&Reaction, DomainError> {
        self.reactions
            .get(&(event, user))
            .ok_or_else(|| DomainError::reaction_not_found(event, user))
    }

    /// The PENDING or CONFIRMED request of `user` for `event`, if any.
    #[must_use]
    pub fn active_request(&self, event: EventId, user: UserId) -> Option<&ParticipationRequest> {
        self.active_requests
            .get(&(event, user))
            .and_then(|id| self.requests.get(id))
    }

    /// Whether `user` holds a seat at `event`.
    #[must_use]
    pub fn is_confirmed_participant(&self, event: EventId, user: UserId) -> bool {
        self.active_request(event, user)
            .is_some_and(|request| request.status == RequestStatus::Confirmed)
    }

    /// Whether a user with this e-mail exists (case-insensitive).
    #[must_use]
    pub fn email_taken(&self, email: &str) -> bool {
        self.emails.contains_key(&normalize(email))
    }

    /// Whether a category with this name exists (case-insensitive).
    #[must_use]
    pub fn category_name_taken(&self, name: &str) -> bool {
        self.category_names.contains_key(&normalize(name))
    }

    /// The compilation holding this title (case-insensitive), if any.
    #[must_use]
    pub fn compilation_titled(&self, title: &str) -> Option<CompilationId> {
        self.compilation_titles.get(&normalize(title)).copied()
    }

    /// Snapshots of a compilation's member events. Ids that no longer
    /// resolve are skipped.
    #[must_use]
    pub fn compilation_events(&self, compilation: &Compilation) -> Vec<Event> {
        compilation
            .events
            .iter()
            .filter_map(|id| self.events.get(id))
            .cloned()
            .collect()
    }

    /// Every request for `event`, oldest first.
    #[must_use]
    pub fn requests_for_event(&self, event: EventId) -> Vec<ParticipationRequest> {
        self.requests
            .values()
            .filter(|request| request.event == event)
            .cloned()
            .collect()
    }

    /// Every request submitted by `user`, oldest first.
    #[must_use]
    pub fn requests_by_user(&self, user: UserId) -> Vec<ParticipationRequest> {
        self.requests
            .values()
            .filter(|request| request.requester == user)
            .cloned()
            .collect()
    }

    /// Number of CONFIRMED requests stored for `event`.
    ///
    /// Always equals the event's `confirmed_requests` counter.
    #[must_use]
    pub fn count_confirmed(&self, event: EventId) -> u32 {
        let count = self
            .requests
            .values()
            .filter(|request| request.event == event && request.status == RequestStatus::Confirmed)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
