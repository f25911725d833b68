//! # Convene Stats
//!
//! Boundary to the analytics service that counts accesses to event pages.
//!
//! The platform reports each public read as an [`EndpointHit`] and asks for
//! per-path [`ViewStats`] when it needs view counts. The service is optional:
//! it may be slow or down, and callers treat every [`StatsError`] as "no data".

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpStatsClient, StatsClient, StatsFuture};
pub use error::StatsError;
pub use types::{EndpointHit, StatsQuery, ViewStats, format_timestamp};
