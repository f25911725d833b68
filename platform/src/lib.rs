//! Convene - admission, capacity, rating and view enrichment for an event platform
//!
//! Users publish events, others ask to attend, organizers moderate requests
//! under a participant limit, and confirmed attendees rate the event. Public
//! reads are reported to an analytics service whose unique-view counts are
//! attached to every event returned.
//!
//! # Architecture
//!
//! ```text
//! Platform (facade)
//!     │  command + correlation id
//!     ▼
//! Store ── write lock ──► combined reducer
//!     │        directory │ lifecycle │ admission │ rating │ compilations
//!     │                               │
//!     │                        PlatformState + PlatformFact
//!     ▼                               │
//! Committed / Refused ◄───────────────┤
//!                                     └──► journal (in the background)
//!
//! Reads: PlatformState (read lock) ──► ViewEnricher ──► EventView / CompilationView
//! ```
//!
//! # Key Features
//!
//! ## 1. Capacity under concurrency
//!
//! Every validate-then-apply sequence runs inside one reducer call under the
//! store's write lock. Confirmed participants never exceed the limit:
//!
//! ```text
//! limit == 0                 → unlimited
//! confirmed + batch > limit  → refused, nothing changes
//! ```
//!
//! ## 2. Ratings
//!
//! A like adds one to the event and to its initiator, a dislike subtracts
//! one, reversing moves both by two and removing undoes the original.
//!
//! ## 3. Journal
//!
//! Committed facts are appended to a [`convene_core::journal::Journal`] and
//! [`PlatformState::replay`] rebuilds the same state from them. The caller
//! gets its outcome without waiting for the append.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
pub mod aggregates;
pub mod app;
pub mod config;
pub mod error;
pub mod facts;
pub mod metrics;
pub mod queries;
pub mod state;
pub mod types;
pub mod views;

pub use actions::PlatformAction;
pub use app::Platform;
pub use config::Config;
pub use error::{ApiError, DomainError, ErrorCategory, ServiceError};
pub use facts::{PlatformFact, Retraction};
pub use queries::{AdminEventFilter, EventSort, Page, PublicEventFilter};
pub use state::PlatformState;
pub use types::*;
pub use views::{CompilationView, EventView, HitRecorder, ViewEnricher};
