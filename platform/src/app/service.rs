//! The platform facade.
//!
//! Commands go through the store: each one is tagged with a fresh
//! correlation id, reduced under the store's write lock, and answered by the
//! outcome action carrying the same id. Reads take the read lock, then
//! enrich the result with view counts outside of it.

use crate::actions::PlatformAction;
use crate::aggregates::{PlatformEnvironment, PlatformStore, platform_reducer};
use crate::config::Config;
use crate::error::{DomainError, Entity, ServiceError};
use crate::facts::PlatformFact;
use crate::queries::{AdminEventFilter, EventSort, Page, PublicEventFilter, sort_by_views};
use crate::state::PlatformState;
use crate::types::{
    Actor, Category, Compilation, CompilationId, CompilationPatch, Event, EventId, EventPatch,
    EventState, ModerationDecision, ModerationResult, NewCompilation, NewEvent,
    ParticipationRequest, Reaction, ReactionKind, RequestId, RequestStatus, User, UserId,
};
use crate::views::{CompilationView, EventView, HitRecorder, ViewEnricher};
use convene_core::environment::{Clock, SystemClock};
use convene_core::journal::{InMemoryJournal, Journal};
use convene_runtime::{Store, StoreError};
use convene_stats::{HttpStatsClient, StatsClient, StatsError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Path recorded for public searches.
const SEARCH_PATH: &str = "/events";

/// Entry point for every platform operation.
#[derive(Clone)]
pub struct Platform {
    store: PlatformStore,
    views: ViewEnricher,
    hits: HitRecorder,
    clock: Arc<dyn Clock>,
    command_timeout: Duration,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("views", &self.views)
            .field("hits", &self.hits)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl Platform {
    /// Wire the platform against the configured analytics service, with the
    /// wall clock and an in-memory journal.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidConfiguration`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, StatsError> {
        let stats = HttpStatsClient::shared(config.stats.url.clone(), config.stats_timeout())?;
        Ok(Self::with_parts(
            config,
            Arc::new(SystemClock),
            stats,
            Arc::new(InMemoryJournal::new()),
        ))
    }

    /// Wire the platform from explicit collaborators, starting empty.
    #[must_use]
    pub fn with_parts(
        config: &Config,
        clock: Arc<dyn Clock>,
        stats: Arc<dyn StatsClient>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        Self::from_state(config, PlatformState::new(), clock, stats, journal)
    }

    /// Rebuild state from `journal`, then keep appending to it.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Journal`] if the journal cannot be read or decoded.
    pub async fn restore(
        config: &Config,
        clock: Arc<dyn Clock>,
        stats: Arc<dyn StatsClient>,
        journal: Arc<dyn Journal>,
    ) -> Result<Self, ServiceError> {
        let entries = journal.load().await?;
        let state = PlatformState::replay(&entries)?;
        tracing::info!(entries = entries.len(), version = state.version(), "State restored from journal");
        Ok(Self::from_state(config, state, clock, stats, journal))
    }

    fn from_state(
        config: &Config,
        state: PlatformState,
        clock: Arc<dyn Clock>,
        stats: Arc<dyn StatsClient>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        let env = PlatformEnvironment::new(Arc::clone(&clock), journal);
        let store = Store::with_broadcast_capacity(
            state,
            platform_reducer(),
            env,
            config.store.broadcast_capacity,
        );
        let views = ViewEnricher::new(
            Arc::clone(&stats),
            Arc::clone(&clock),
            config.stats_timeout(),
            config.stats_lookback(),
        );
        let hits = HitRecorder::new(stats, Arc::clone(&clock), config.app.name.clone(), config.stats_timeout());

        Self {
            store,
            views,
            hits,
            clock,
            command_timeout: config.command_timeout(),
        }
    }

    /// Send a command and wait for its outcome.
    ///
    /// The outcome normally arrives on the action broadcast. If the wait
    /// lags or times out after the reducer ran, the outcome ledger still
    /// holds it, so a committed command is never reported as failed.
    async fn execute(&self, action: PlatformAction) -> Result<PlatformFact, ServiceError> {
        let correlation_id = action.correlation_id();
        let outcomes = &self.store.environment().outcomes;
        let waited = self
            .store
            .send_and_wait_for(
                action,
                move |candidate| candidate.is_outcome_of(correlation_id),
                self.command_timeout,
            )
            .await;

        let outcome = match waited {
            Ok(outcome) => {
                outcomes.take(correlation_id);
                outcome
            },
            Err(error @ (StoreError::Timeout | StoreError::Lagged(_) | StoreError::ChannelClosed)) => {
                let Some(outcome) = outcomes.take(correlation_id) else {
                    return Err(error.into());
                };
                tracing::warn!(%correlation_id, %error, "Outcome recovered from the ledger");
                outcome
            },
            Err(error) => return Err(error.into()),
        };

        match outcome {
            PlatformAction::Committed { fact, .. } => Ok(fact),
            PlatformAction::Refused { error, .. } => Err(error.into()),
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    async fn execute_for_event(&self, action: PlatformAction) -> Result<EventView, ServiceError> {
        let correlation_id = action.correlation_id();
        let fact = self.execute(action).await?;
        let event = fact
            .event()
            .cloned()
            .ok_or(ServiceError::UnexpectedOutcome(correlation_id))?;
        Ok(self.views.enrich_one(event).await)
    }

    async fn read<T>(&self, f: impl FnOnce(&PlatformState) -> Result<T, DomainError>) -> Result<T, ServiceError> {
        Ok(self.store.state(f).await?)
    }

    // ========================================================================
    // Directory
    // ========================================================================

    /// Register a user.
    ///
    /// # Errors
    ///
    /// `IntegrityViolation` for a taken e-mail, `InvalidInput` for malformed fields.
    #[tracing::instrument(skip(self, email))]
    pub async fn register_user(&self, name: &str, email: &str) -> Result<User, ServiceError> {
        let correlation_id = Uuid::new_v4();
        match self
            .execute(PlatformAction::RegisterUser {
                correlation_id,
                name: name.to_string(),
                email: email.to_string(),
            })
            .await?
        {
            PlatformFact::UserRegistered { user } => Ok(user),
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    /// Add a category.
    ///
    /// # Errors
    ///
    /// `IntegrityViolation` for a taken name, `InvalidInput` for a blank one.
    #[tracing::instrument(skip(self))]
    pub async fn add_category(&self, name: &str) -> Result<Category, ServiceError> {
        let correlation_id = Uuid::new_v4();
        match self
            .execute(PlatformAction::AddCategory {
                correlation_id,
                name: name.to_string(),
            })
            .await?
        {
            PlatformFact::CategoryAdded { category } => Ok(category),
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    /// A user by id.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no such user.
    pub async fn get_user(&self, user: UserId) -> Result<User, ServiceError> {
        self.read(|state| state.user(user).cloned()).await
    }

    // ========================================================================
    // Event lifecycle
    // ========================================================================

    /// Create an event in PENDING. A new event has no views.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user or category, `DateTimeViolation` for a
    /// date less than two hours ahead, `InvalidInput` for bad text lengths.
    #[tracing::instrument(skip(self, new_event), fields(category = %new_event.category))]
    pub async fn create_event(&self, initiator: UserId, new_event: NewEvent) -> Result<EventView, ServiceError> {
        let correlation_id = Uuid::new_v4();
        match self
            .execute(PlatformAction::CreateEvent {
                correlation_id,
                initiator,
                new_event,
            })
            .await?
        {
            PlatformFact::EventCreated { event } => Ok(EventView { event, views: 0 }),
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    /// Edit fields and optionally apply a state action.
    ///
    /// # Errors
    ///
    /// `NotFound`, `RestrictionViolation` or `DateTimeViolation` as decided by
    /// the lifecycle rules.
    #[tracing::instrument(skip(self, patch))]
    pub async fn edit_event(&self, event_id: EventId, actor: Actor, patch: EventPatch) -> Result<EventView, ServiceError> {
        self.execute_for_event(PlatformAction::EditEvent {
            correlation_id: Uuid::new_v4(),
            event_id,
            actor,
            patch,
        })
        .await
    }

    /// Administrator publishes a pending event.
    ///
    /// # Errors
    ///
    /// `NotFound`, `DateTimeViolation` when the event starts within the hour,
    /// `RestrictionViolation` when it is not PENDING.
    #[tracing::instrument(skip(self))]
    pub async fn publish_event(&self, event_id: EventId) -> Result<EventView, ServiceError> {
        self.execute_for_event(PlatformAction::PublishEvent {
            correlation_id: Uuid::new_v4(),
            event_id,
        })
        .await
    }

    /// Initiator withdraws or administrator rejects a pending event.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `RestrictionViolation` when the event is not PENDING.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_event(&self, event_id: EventId, actor: Actor) -> Result<EventView, ServiceError> {
        self.execute_for_event(PlatformAction::CancelEvent {
            correlation_id: Uuid::new_v4(),
            event_id,
            actor,
        })
        .await
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Ask to attend an event.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user or event; `IntegrityViolation` for a
    /// duplicate, a self-request, an unpublished event or a full event.
    #[tracing::instrument(skip(self))]
    pub async fn submit_request(&self, event_id: EventId, requester: UserId) -> Result<ParticipationRequest, ServiceError> {
        let correlation_id = Uuid::new_v4();
        match self
            .execute(PlatformAction::SubmitRequest {
                correlation_id,
                event_id,
                requester,
            })
            .await?
        {
            PlatformFact::RequestSubmitted { request, .. } => Ok(request),
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    /// Confirm or reject a batch of pending requests.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or foreign ids; `RestrictionViolation` when the
    /// event is full, a request is not PENDING or the batch would overshoot.
    #[tracing::instrument(skip(self, request_ids), fields(batch = request_ids.len()))]
    pub async fn moderate_requests(
        &self,
        event_id: EventId,
        actor: Actor,
        request_ids: Vec<RequestId>,
        decision: ModerationDecision,
    ) -> Result<ModerationResult, ServiceError> {
        let correlation_id = Uuid::new_v4();
        match self
            .execute(PlatformAction::ModerateRequests {
                correlation_id,
                event_id,
                actor,
                request_ids,
                decision,
            })
            .await?
        {
            PlatformFact::RequestsModerated { requests, .. } => {
                let (confirmed, rejected) = requests
                    .into_iter()
                    .partition(|request| request.status == RequestStatus::Confirmed);
                Ok(ModerationResult { confirmed, rejected })
            },
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    /// Withdraw one's own request, releasing its seat if it held one.
    ///
    /// # Errors
    ///
    /// `NotFound` if the request does not exist or belongs to someone else.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_request(&self, requester: UserId, request_id: RequestId) -> Result<ParticipationRequest, ServiceError> {
        let correlation_id = Uuid::new_v4();
        match self
            .execute(PlatformAction::CancelRequest {
                correlation_id,
                requester,
                request_id,
            })
            .await?
        {
            PlatformFact::RequestCanceled { request, .. } => Ok(request),
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    /// Requests for an event, as seen by its initiator.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user, or an event the user did not initiate.
    pub async fn list_event_requests(&self, initiator: UserId, event_id: EventId) -> Result<Vec<ParticipationRequest>, ServiceError> {
        self.read(|state| {
            state.user(initiator)?;
            let event = state.event(event_id)?;
            if event.initiator != initiator {
                return Err(DomainError::not_found(Entity::Event, event_id));
            }
            Ok(state.requests_for_event(event_id))
        })
        .await
    }

    /// Requests submitted by a user.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn list_user_requests(&self, user: UserId) -> Result<Vec<ParticipationRequest>, ServiceError> {
        self.read(|state| {
            state.user(user)?;
            Ok(state.requests_by_user(user))
        })
        .await
    }

    // ========================================================================
    // Rating
    // ========================================================================

    /// React to an event as a confirmed participant.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown records; `RestrictionViolation` for the
    /// initiator, a non-participant or a second reaction.
    #[tracing::instrument(skip(self))]
    pub async fn add_reaction(&self, event_id: EventId, user: UserId, kind: ReactionKind) -> Result<EventView, ServiceError> {
        self.execute_for_event(PlatformAction::AddReaction {
            correlation_id: Uuid::new_v4(),
            event_id,
            user,
            kind,
        })
        .await
    }

    /// Reverse an existing reaction.
    ///
    /// # Errors
    ///
    /// `NotFound` without a reaction; `RestrictionViolation` for the same kind.
    #[tracing::instrument(skip(self))]
    pub async fn change_reaction(&self, event_id: EventId, user: UserId, kind: ReactionKind) -> Result<EventView, ServiceError> {
        self.execute_for_event(PlatformAction::ChangeReaction {
            correlation_id: Uuid::new_v4(),
            event_id,
            user,
            kind,
        })
        .await
    }

    /// Withdraw a reaction.
    ///
    /// # Errors
    ///
    /// `NotFound` without a reaction.
    #[tracing::instrument(skip(self))]
    pub async fn remove_reaction(&self, event_id: EventId, user: UserId) -> Result<EventView, ServiceError> {
        self.execute_for_event(PlatformAction::RemoveReaction {
            correlation_id: Uuid::new_v4(),
            event_id,
            user,
        })
        .await
    }

    /// A user's reaction to an event.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user has not reacted.
    pub async fn get_reaction(&self, event_id: EventId, user: UserId) -> Result<Reaction, ServiceError> {
        self.read(|state| {
            state.event(event_id)?;
            state.user(user)?;
            state.reaction(event_id, user).cloned()
        })
        .await
    }

    // ========================================================================
    // Compilations
    // ========================================================================

    async fn execute_for_compilation(&self, action: PlatformAction) -> Result<CompilationView, ServiceError> {
        let correlation_id = action.correlation_id();
        let compilation = match self.execute(action).await? {
            PlatformFact::CompilationAdded { compilation }
            | PlatformFact::CompilationUpdated { compilation } => compilation,
            _ => return Err(ServiceError::UnexpectedOutcome(correlation_id)),
        };
        let events = self.store.state(|state| state.compilation_events(&compilation)).await;
        Ok(self.views.enrich_compilation(compilation, events).await)
    }

    /// Create a compilation.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank or overlong title, `IntegrityViolation` for a taken one.
    #[tracing::instrument(skip(self))]
    pub async fn add_compilation(&self, new_compilation: NewCompilation) -> Result<CompilationView, ServiceError> {
        self.execute_for_compilation(PlatformAction::AddCompilation {
            correlation_id: Uuid::new_v4(),
            new_compilation,
        })
        .await
    }

    /// Change a compilation's title, pinned flag or members.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown compilation; title rules as for [`Platform::add_compilation`].
    #[tracing::instrument(skip(self))]
    pub async fn update_compilation(
        &self,
        compilation_id: CompilationId,
        patch: CompilationPatch,
    ) -> Result<CompilationView, ServiceError> {
        self.execute_for_compilation(PlatformAction::UpdateCompilation {
            correlation_id: Uuid::new_v4(),
            compilation_id,
            patch,
        })
        .await
    }

    /// Delete a compilation. Its events are untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown compilation.
    #[tracing::instrument(skip(self))]
    pub async fn delete_compilation(&self, compilation_id: CompilationId) -> Result<(), ServiceError> {
        let correlation_id = Uuid::new_v4();
        match self
            .execute(PlatformAction::DeleteCompilation {
                correlation_id,
                compilation_id,
            })
            .await?
        {
            PlatformFact::CompilationDeleted { .. } => Ok(()),
            _ => Err(ServiceError::UnexpectedOutcome(correlation_id)),
        }
    }

    /// One compilation with view counts on its events.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown compilation.
    pub async fn get_compilation(&self, compilation_id: CompilationId) -> Result<CompilationView, ServiceError> {
        let (compilation, events) = self
            .read(|state| {
                let compilation = state.compilation(compilation_id)?;
                Ok((compilation.clone(), state.compilation_events(compilation)))
            })
            .await?;
        Ok(self.views.enrich_compilation(compilation, events).await)
    }

    /// A page of compilations in id order, optionally only pinned or only
    /// unpinned ones.
    pub async fn list_compilations(&self, pinned: Option<bool>, page: Page) -> Vec<CompilationView> {
        let entries: Vec<(Compilation, Vec<Event>)> = self
            .store
            .state(|state| {
                let selected: Vec<&Compilation> = state
                    .compilations
                    .values()
                    .filter(|compilation| pinned.is_none_or(|pinned| compilation.pinned == pinned))
                    .collect();
                page.slice(selected)
                    .into_iter()
                    .map(|compilation| (compilation.clone(), state.compilation_events(compilation)))
                    .collect()
            })
            .await;
        self.views.enrich_compilations(entries).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// A published event, recording the read as a hit.
    ///
    /// # Errors
    ///
    /// `NotFound` if the event does not exist or is not published.
    #[tracing::instrument(skip(self))]
    pub async fn get_public_event(&self, event_id: EventId, client_ip: &str) -> Result<EventView, ServiceError> {
        let event = self
            .read(|state| {
                state
                    .event(event_id)
                    .ok()
                    .filter(|event| event.state == EventState::Published)
                    .cloned()
                    .ok_or_else(|| DomainError::not_found(Entity::Event, event_id))
            })
            .await?;

        self.hits.record(event_id.path(), client_ip);
        Ok(self.views.enrich_one(event).await)
    }

    /// Search published events, recording the search as a hit.
    ///
    /// # Errors
    ///
    /// `DateTimeViolation` for an inverted range.
    #[tracing::instrument(skip(self, filter))]
    pub async fn search_public_events(&self, filter: &PublicEventFilter, client_ip: &str) -> Result<Vec<EventView>, ServiceError> {
        filter.validate()?;
        let now = self.clock.now();
        let matching = self.store.state(|state| filter.select(state, now)).await;

        self.hits.record(SEARCH_PATH, client_ip);

        if filter.sort == Some(EventSort::Views) {
            let mut views = self.views.enrich(matching).await;
            sort_by_views(&mut views);
            Ok(filter.page.slice(views))
        } else {
            Ok(self.views.enrich(filter.page.slice(matching)).await)
        }
    }

    /// Administrative search over every event.
    ///
    /// # Errors
    ///
    /// `DateTimeViolation` for an inverted range.
    #[tracing::instrument(skip(self, filter))]
    pub async fn search_admin_events(&self, filter: &AdminEventFilter) -> Result<Vec<EventView>, ServiceError> {
        filter.validate()?;
        let page = self.store.state(|state| filter.select(state)).await;
        Ok(self.views.enrich(page).await)
    }

    /// One of the initiator's own events, in any state.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user, or an event the user did not initiate.
    pub async fn get_own_event(&self, initiator: UserId, event_id: EventId) -> Result<EventView, ServiceError> {
        let event = self
            .read(|state| {
                state.user(initiator)?;
                let event = state.event(event_id)?;
                if event.initiator != initiator {
                    return Err(DomainError::not_found(Entity::Event, event_id));
                }
                Ok(event.clone())
            })
            .await?;
        Ok(self.views.enrich_one(event).await)
    }

    /// A page of the initiator's own events, in id order.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn list_own_events(&self, initiator: UserId, page: Page) -> Result<Vec<EventView>, ServiceError> {
        let events = self
            .read(|state| {
                state.user(initiator)?;
                let own: Vec<Event> = state
                    .events
                    .values()
                    .filter(|event| event.initiator == initiator)
                    .cloned()
                    .collect();
                Ok(page.slice(own))
            })
            .await?;
        Ok(self.views.enrich(events).await)
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> PlatformState {
        self.store.state(Clone::clone).await
    }

    /// Stop accepting commands and wait for journal writes to finish.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Store`] if effects are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ServiceError> {
        Ok(self.store.shutdown(timeout).await?)
    }
}
