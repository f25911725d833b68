//! Append-only fact journal.
//!
//! Every state change that a reducer commits is described by a *fact*: an
//! immutable record of what happened. Facts are numbered with a sequence that
//! increases by one per commit, encoded with `bincode` and appended to a
//! [`Journal`]. Replaying the journal in sequence order rebuilds the exact
//! state that produced it.
//!
//! # Example
//!
//! ```
//! use convene_core::journal::{Fact, InMemoryJournal, Journal, JournalEntry};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! enum SeatFact {
//!     Taken { seat: u32 },
//! }
//!
//! impl Fact for SeatFact {
//!     fn fact_type(&self) -> &'static str {
//!         "SeatTaken.v1"
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let journal = InMemoryJournal::new();
//! let fact = SeatFact::Taken { seat: 4 };
//! let entry = JournalEntry::encode(1, &fact, chrono::Utc::now()).unwrap();
//! journal.append(entry).await.unwrap();
//!
//! let loaded = journal.load().await.unwrap();
//! assert_eq!(loaded[0].decode::<SeatFact>().unwrap(), fact);
//! # });
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Errors that can occur while writing or reading the journal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JournalError {
    /// Failed to encode a fact to bytes.
    #[error("Failed to encode fact: {0}")]
    Encode(String),

    /// Failed to decode a fact from bytes.
    #[error("Failed to decode fact: {0}")]
    Decode(String),

    /// An entry with this sequence number was already written.
    #[error("Sequence {0} already recorded")]
    DuplicateSequence(u64),

    /// The backing storage rejected the operation.
    #[error("Journal storage error: {0}")]
    Storage(String),
}

/// A fact that can be recorded in the journal and replayed later.
pub trait Fact: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable, versioned name of this fact (e.g. `"RequestSubmitted.v1"`).
    fn fact_type(&self) -> &'static str;
}

/// One encoded fact together with its position in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Commit sequence, starting at 1.
    pub sequence: u64,
    /// Value of [`Fact::fact_type`] at the time of writing.
    pub fact_type: String,
    /// `bincode` payload.
    pub payload: Vec<u8>,
    /// When the fact was committed.
    pub recorded_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Encode a fact into an entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Encode`] if `bincode` cannot serialize the fact.
    pub fn encode<F: Fact>(
        sequence: u64,
        fact: &F,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, JournalError> {
        let payload = bincode::serialize(fact).map_err(|e| JournalError::Encode(e.to_string()))?;
        Ok(Self {
            sequence,
            fact_type: fact.fact_type().to_string(),
            payload,
            recorded_at,
        })
    }

    /// Decode the payload back into a fact.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Decode`] if the payload does not match `F`.
    pub fn decode<F: Fact>(&self) -> Result<F, JournalError> {
        bincode::deserialize(&self.payload).map_err(|e| JournalError::Decode(e.to_string()))
    }
}

/// Durable, append-only storage for journal entries.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be held as
/// `Arc<dyn Journal>` inside a reducer environment.
pub trait Journal: Send + Sync {
    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Implementations return [`JournalError::DuplicateSequence`] when the
    /// sequence was already written and [`JournalError::Storage`] on I/O failure.
    fn append(
        &self,
        entry: JournalEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), JournalError>> + Send + '_>>;

    /// Load every entry ordered by sequence.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Storage`] if the backing storage cannot be read.
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Vec<JournalEntry>, JournalError>> + Send + '_>>;
}

/// Process-local journal.
///
/// Entries may arrive out of order because effects run concurrently. They
/// are keyed by sequence, so `load` returns them sorted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJournal {
    entries: Arc<Mutex<BTreeMap<u64, JournalEntry>>>,
}

impl InMemoryJournal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Journal for InMemoryJournal {
    fn append(
        &self,
        entry: JournalEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), JournalError>> + Send + '_>> {
        Box::pin(async move {
            let mut entries = self
                .entries
                .lock()
                .map_err(|e| JournalError::Storage(e.to_string()))?;
            match entries.entry(entry.sequence) {
                Entry::Occupied(_) => Err(JournalError::DuplicateSequence(entry.sequence)),
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                    Ok(())
                },
            }
        })
    }

    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Vec<JournalEntry>, JournalError>> + Send + '_>> {
        Box::pin(async move {
            let entries = self
                .entries
                .lock()
                .map_err(|e| JournalError::Storage(e.to_string()))?;
            Ok(entries.values().cloned().collect())
        })
    }
}
