//! Outcomes of recent commands, keyed by correlation id.
//!
//! The reducers write every outcome here while they still hold the store's
//! write lock, so the entry exists before `send` returns. Callers normally
//! learn their outcome from the action broadcast; this ledger answers the
//! ones whose receiver lagged or timed out.

use crate::actions::PlatformAction;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

/// Maximum number of outcomes kept. The oldest go first.
const MAX_OUTCOMES: usize = 4096;

#[derive(Debug, Default)]
struct Entries {
    by_id: HashMap<Uuid, PlatformAction>,
    order: VecDeque<Uuid>,
}

/// Bounded map from correlation id to [`PlatformAction::Committed`] or
/// [`PlatformAction::Refused`].
#[derive(Debug, Default)]
pub struct OutcomeLedger {
    entries: Mutex<Entries>,
}

impl OutcomeLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `outcome` under its correlation id.
    pub fn record(&self, outcome: &PlatformAction) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::error!("Outcome ledger poisoned");
            return;
        };

        let correlation_id = outcome.correlation_id();
        entries.by_id.insert(correlation_id, outcome.clone());
        entries.order.push_back(correlation_id);

        while entries.order.len() > MAX_OUTCOMES {
            if let Some(oldest) = entries.order.pop_front() {
                entries.by_id.remove(&oldest);
            }
        }
    }

    /// Remove and return the outcome for `correlation_id`.
    pub fn take(&self, correlation_id: Uuid) -> Option<PlatformAction> {
        self.entries
            .lock()
            .ok()
            .and_then(|mut entries| entries.by_id.remove(&correlation_id))
    }

    /// Number of outcomes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.by_id.len())
    }

    /// True when no outcome is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
