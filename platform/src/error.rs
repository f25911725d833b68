//! Error types for the platform.
//!
//! [`DomainError`] is what a reducer refuses a command with. [`ServiceError`]
//! adds the infrastructure failures the facade can hit while waiting for an
//! outcome. [`ApiError`] is the body a caller sees.

use crate::types::{EventId, UserId};
use chrono::Utc;
use convene_core::journal::JournalError;
use convene_runtime::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Kind of record a lookup failed for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    /// An event
    Event,
    /// A user
    User,
    /// A category
    Category,
    /// A participation request
    Request,
    /// A reaction
    Reaction,
    /// An event compilation
    Compilation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Event => "Event",
            Self::User => "User",
            Self::Category => "Category",
            Self::Request => "Request",
            Self::Reaction => "Reaction",
            Self::Compilation => "Compilation",
        };
        write!(f, "{name}")
    }
}

/// A business rule refused the command. Nothing was changed.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainError {
    /// A referenced record does not exist (or is not visible to the caller).
    #[error("{entity} {key} was not found")]
    NotFound {
        /// Kind of record
        entity: Entity,
        /// How it was looked up, e.g. `with id=7`
        key: String,
    },

    /// Uniqueness or referential rule (duplicate request, capacity at submission).
    #[error("{0}")]
    IntegrityViolation(String),

    /// The operation is not allowed in the current state.
    #[error("{0}")]
    RestrictionViolation(String),

    /// A temporal precondition failed.
    #[error("{0}")]
    DateTimeViolation(String),

    /// Malformed input (lengths, empty batches, blank names).
    #[error("{0}")]
    InvalidInput(String),
}

impl DomainError {
    /// Lookup by identifier failed.
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: format!("with id={id}"),
        }
    }

    /// No reaction by `user` on `event`.
    #[must_use]
    pub fn reaction_not_found(event: EventId, user: UserId) -> Self {
        Self::NotFound {
            entity: Entity::Reaction,
            key: format!("for event id={event} and user id={user}"),
        }
    }

    /// Stable category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::IntegrityViolation(_) => ErrorCategory::IntegrityViolation,
            Self::RestrictionViolation(_) => ErrorCategory::RestrictionViolation,
            Self::DateTimeViolation(_) => ErrorCategory::DateTimeViolation,
            Self::InvalidInput(_) => ErrorCategory::InvalidInput,
        }
    }
}

/// Coarse classification reported to callers and used as a metric label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// 404
    NotFound,
    /// 409
    IntegrityViolation,
    /// 409
    RestrictionViolation,
    /// 400
    DateTimeViolation,
    /// 400
    InvalidInput,
    /// 500
    Internal,
}

impl ErrorCategory {
    /// HTTP-style status code.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::IntegrityViolation | Self::RestrictionViolation => 409,
            Self::DateTimeViolation | Self::InvalidInput => 400,
            Self::Internal => 500,
        }
    }

    /// Human-readable reason attached to every error of this category.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NotFound => "The required object was not found.",
            Self::IntegrityViolation => "Integrity constraint has been violated.",
            Self::RestrictionViolation => {
                "For the requested operation the conditions are not met."
            },
            Self::DateTimeViolation | Self::InvalidInput => "Incorrectly made request.",
            Self::Internal => "Internal server error.",
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::IntegrityViolation => "integrity",
            Self::RestrictionViolation => "restriction",
            Self::DateTimeViolation => "date_time",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }
}

/// Everything a facade operation can fail with.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A business rule refused the command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The store did not deliver an outcome (shutdown, timeout).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The journal could not be read while restoring state.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// The outcome for a command did not have the expected shape.
    #[error("Unexpected outcome for command {0}")]
    UnexpectedOutcome(Uuid),
}

impl ServiceError {
    /// Category reported to the caller.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(error) => error.category(),
            Self::Store(_) | Self::Journal(_) | Self::UnexpectedOutcome(_) => {
                ErrorCategory::Internal
            },
        }
    }
}

/// Error body returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP-style status code
    pub status: u16,
    /// Reason shared by every error of the category
    pub reason: String,
    /// Specific message; generic for internal errors
    pub message: String,
    /// `yyyy-MM-dd HH:mm:ss`
    pub timestamp: String,
    /// Present for internal errors; matches the id in the server log
    pub diagnostic_id: Option<Uuid>,
}

impl ApiError {
    /// Render a service error for a caller.
    ///
    /// Domain errors keep their message. Internal errors are logged with a
    /// fresh diagnostic id and only that id is returned.
    #[must_use]
    pub fn from_service_error(error: &ServiceError) -> Self {
        let category = error.category();
        let timestamp = Utc::now().format(convene_stats::types::TIMESTAMP_FORMAT).to_string();

        match error {
            ServiceError::Domain(domain) => Self {
                status: category.status(),
                reason: category.reason().to_string(),
                message: domain.to_string(),
                timestamp,
                diagnostic_id: None,
            },
            ServiceError::Store(_) | ServiceError::Journal(_) | ServiceError::UnexpectedOutcome(_) => {
                let diagnostic_id = Uuid::new_v4();
                tracing::error!(%diagnostic_id, error = %error, "Internal error");
                Self {
                    status: category.status(),
                    reason: category.reason().to_string(),
                    message: format!("Internal error, diagnostic id {diagnostic_id}"),
                    timestamp,
                    diagnostic_id: Some(diagnostic_id),
                }
            },
        }
    }
}

impl From<&ServiceError> for ApiError {
    fn from(error: &ServiceError) -> Self {
        Self::from_service_error(error)
    }
}
