//! Event compilations.
//!
//! Administrators curate named, optionally pinned collections of events.
//! Member ids are kept ascending and unique; ids that name no event are
//! skipped rather than refused.

use super::{PlatformEffects, PlatformEnvironment, commit, refuse};
use crate::actions::PlatformAction;
use crate::error::DomainError;
use crate::facts::PlatformFact;
use crate::metrics::names;
use crate::state::PlatformState;
use crate::types::{Compilation, CompilationId, CompilationPatch, EventId, NewCompilation};
use convene_core::{SmallVec, reducer::Reducer};
use std::collections::BTreeSet;

const MAX_TITLE_LEN: usize = 50;

/// Reducer for compilations.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompilationReducer;

impl CompilationReducer {
    fn validate_title(
        state: &PlatformState,
        title: &str,
        owner: Option<CompilationId>,
    ) -> Result<String, DomainError> {
        let title = title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::InvalidInput(format!(
                "Compilation title must be between 1 and {MAX_TITLE_LEN} characters"
            )));
        }

        match state.compilation_titled(title) {
            Some(holder) if Some(holder) != owner => Err(DomainError::IntegrityViolation(format!(
                "Compilation {title} already exists"
            ))),
            _ => Ok(title.to_string()),
        }
    }

    fn members(state: &PlatformState, ids: &[EventId]) -> Vec<EventId> {
        let known: BTreeSet<EventId> = ids
            .iter()
            .copied()
            .filter(|id| state.events.contains_key(id))
            .collect();
        if known.len() < ids.len() {
            tracing::debug!(requested = ids.len(), kept = known.len(), "Compilation members filtered");
        }
        known.into_iter().collect()
    }

    fn validate_add(
        state: &PlatformState,
        new_compilation: &NewCompilation,
    ) -> Result<Compilation, DomainError> {
        let title = Self::validate_title(state, &new_compilation.title, None)?;
        Ok(Compilation {
            id: state.next_compilation_id(),
            title,
            pinned: new_compilation.pinned.unwrap_or(false),
            events: Self::members(state, &new_compilation.events),
        })
    }

    fn validate_update(
        state: &PlatformState,
        compilation_id: CompilationId,
        patch: &CompilationPatch,
    ) -> Result<Compilation, DomainError> {
        let mut compilation = state.compilation(compilation_id)?.clone();

        if let Some(title) = &patch.title {
            compilation.title = Self::validate_title(state, title, Some(compilation_id))?;
        }
        if let Some(pinned) = patch.pinned {
            compilation.pinned = pinned;
        }
        if let Some(events) = patch.events.as_deref().filter(|events| !events.is_empty()) {
            compilation.events = Self::members(state, events);
        }

        Ok(compilation)
    }

    fn record(
        state: &mut PlatformState,
        correlation_id: uuid::Uuid,
        op: &'static str,
        validated: Result<Compilation, DomainError>,
        into_fact: fn(Compilation) -> PlatformFact,
        env: &PlatformEnvironment,
    ) -> PlatformEffects {
        match validated {
            Ok(compilation) => {
                tracing::info!(
                    compilation_id = %compilation.id,
                    pinned = compilation.pinned,
                    events = compilation.events.len(),
                    op,
                    "Compilation changed"
                );
                metrics::counter!(names::COMPILATIONS_CHANGED, "op" => op).increment(1);
                commit(state, correlation_id, into_fact(compilation), env)
            },
            Err(error) => refuse(correlation_id, error, env),
        }
    }
}

impl Reducer for CompilationReducer {
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
            PlatformAction::AddCompilation {
                correlation_id,
                new_compilation,
            } => {
                let validated = Self::validate_add(state, &new_compilation);
                Self::record(state, correlation_id, "add", validated, added, env)
            },

            PlatformAction::UpdateCompilation {
                correlation_id,
                compilation_id,
                patch,
            } => {
                let validated = Self::validate_update(state, compilation_id, &patch);
                Self::record(state, correlation_id, "update", validated, updated, env)
            },

            PlatformAction::DeleteCompilation {
                correlation_id,
                compilation_id,
            } => {
                let validated = state.compilation(compilation_id).cloned();
                Self::record(state, correlation_id, "delete", validated, deleted, env)
            },

            _ => SmallVec::new(),
        }
    }
}

fn added(compilation: Compilation) -> PlatformFact {
    PlatformFact::CompilationAdded { compilation }
}

fn updated(compilation: Compilation) -> PlatformFact {
    PlatformFact::CompilationUpdated { compilation }
}

fn deleted(compilation: Compilation) -> PlatformFact {
    PlatformFact::CompilationDeleted { compilation }
}
