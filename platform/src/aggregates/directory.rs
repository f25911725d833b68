//! Users and categories.
//!
//! Thin registry: unique e-mail per user, unique name per category.

use super::{PlatformEffects, PlatformEnvironment, commit, refuse};
use crate::actions::PlatformAction;
use crate::error::DomainError;
use crate::facts::PlatformFact;
use crate::state::PlatformState;
use crate::types::{Category, User};
use convene_core::{SmallVec, reducer::Reducer};

const MAX_NAME_LEN: usize = 250;
const MAX_EMAIL_LEN: usize = 254;
const MAX_CATEGORY_LEN: usize = 50;

/// Reducer for the user and category registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectoryReducer;

impl DirectoryReducer {
    fn validate_register_user(
        state: &PlatformState,
        name: &str,
        email: &str,
    ) -> Result<(), DomainError> {
        let name = name.trim();
        if name.len() < 2 || name.len() > MAX_NAME_LEN {
            return Err(DomainError::InvalidInput(format!(
                "Name must be between 2 and {MAX_NAME_LEN} characters"
            )));
        }

        let email = email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed || email.len() > MAX_EMAIL_LEN {
            return Err(DomainError::InvalidInput(format!(
                "Email '{email}' is not a valid address"
            )));
        }

        if state.email_taken(email) {
            return Err(DomainError::IntegrityViolation(format!(
                "User with email {email} already exists"
            )));
        }

        Ok(())
    }

    fn validate_add_category(state: &PlatformState, name: &str) -> Result<(), DomainError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_CATEGORY_LEN {
            return Err(DomainError::InvalidInput(format!(
                "Category name must be between 1 and {MAX_CATEGORY_LEN} characters"
            )));
        }

        if state.category_name_taken(name) {
            return Err(DomainError::IntegrityViolation(format!(
                "Category {name} already exists"
            )));
        }

        Ok(())
    }
}

impl Reducer for DirectoryReducer {
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
            PlatformAction::RegisterUser {
                correlation_id,
                name,
                email,
            } => {
                if let Err(error) = Self::validate_register_user(state, &name, &email) {
                    return refuse(correlation_id, error, env);
                }

                let user = User {
                    id: state.next_user_id(),
                    name: name.trim().to_string(),
                    email: email.trim().to_string(),
                    rating: 0,
                };
                tracing::info!(user_id = %user.id, "User registered");
                commit(state, correlation_id, PlatformFact::UserRegistered { user }, env)
            },

            PlatformAction::AddCategory {
                correlation_id,
                name,
            } => {
                if let Err(error) = Self::validate_add_category(state, &name) {
                    return refuse(correlation_id, error, env);
                }

                let category = Category {
                    id: state.next_category_id(),
                    name: name.trim().to_string(),
                };
                commit(state, correlation_id, PlatformFact::CategoryAdded { category }, env)
            },

            _ => SmallVec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::aggregates::fixtures;
    use crate::error::ErrorCategory;
    use convene_testing::ReducerTest;
    use uuid::Uuid;

    fn register(name: &str, email: &str) -> PlatformAction {
        PlatformAction::RegisterUser {
            correlation_id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn register_user_allocates_next_id() {
        ReducerTest::new(DirectoryReducer)
            .with_env(fixtures::env())
            .given_state(PlatformState::new())
            .when_action(register("Ana", " ana@example.com "))
            .then_state(|state| {
                let user = state.users.values().next().unwrap();
                assert_eq!(user.id.value(), 1);
                assert_eq!(user.email, "ana@example.com");
                assert_eq!(user.rating, 0);
            })
            .then_actions(|actions| {
                assert!(matches!(
                    actions,
                    [PlatformAction::Committed { sequence: 1, .. }]
                ));
            })
            .run();
    }

    #[test]
    fn duplicate_email_is_an_integrity_violation() {
        let state = fixtures::state_with(fixtures::event(
            crate::types::EventState::Pending,
            0,
            true,
        ));

        ReducerTest::new(DirectoryReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(register("Copycat", "USER2@example.com"))
            .then_state(|state| assert_eq!(state.users.len(), 3))
            .then_actions(|actions| match actions {
                [PlatformAction::Refused { error, .. }] => {
                    assert_eq!(error.category(), ErrorCategory::IntegrityViolation);
                },
                other => panic!("expected refusal, got {other:?}"),
            })
            .run();
    }

    #[test]
    fn malformed_email_is_invalid_input() {
        ReducerTest::new(DirectoryReducer)
            .with_env(fixtures::env())
            .given_state(PlatformState::new())
            .when_action(register("Ana", "not-an-address"))
            .then_state(|state| assert!(state.users.is_empty()))
            .then_actions(|actions| {
                assert!(matches!(
                    actions,
                    [PlatformAction::Refused {
                        error: DomainError::InvalidInput(_),
                        ..
                    }]
                ));
            })
            .run();
    }

    #[test]
    fn category_names_are_unique_ignoring_case() {
        let mut state = PlatformState::new();
        state.apply(&PlatformFact::CategoryAdded {
            category: Category {
                id: crate::types::CategoryId::new(1),
                name: "Concerts".to_string(),
            },
        });

        ReducerTest::new(DirectoryReducer)
            .with_env(fixtures::env())
            .given_state(state)
            .when_action(PlatformAction::AddCategory {
                correlation_id: Uuid::new_v4(),
                name: "concerts".to_string(),
            })
            .then_state(|state| assert_eq!(state.categories.len(), 1))
            .then_actions(|actions| {
                assert!(matches!(
                    actions,
                    [PlatformAction::Refused {
                        error: DomainError::IntegrityViolation(_),
                        ..
                    }]
                ));
            })
            .run();
    }
}
