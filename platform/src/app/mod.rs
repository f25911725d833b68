//! Application facade - wires together all components.
//!
//! [`Platform`] coordinates:
//! - The store running the combined platform reducer
//! - The journal that committed facts are appended to
//! - View enrichment and hit recording against the analytics service

mod service;

pub use service::Platform;
