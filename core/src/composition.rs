//! Reducer composition utilities
//!
//! A feature is usually split into several reducers that share one state and
//! one action type: each handles its own commands and ignores the rest.
//! [`combine_reducers`] runs them in order against the same state and
//! concatenates the effects they return.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use convene_core::{Effect, Reducer, SmallVec, smallvec};
//! use convene_core::composition::combine_reducers;
//!
//! #[derive(Default)]
//! struct Hall {
//!     seats: u32,
//!     name: String,
//! }
//!
//! #[derive(Clone)]
//! enum HallAction {
//!     AddSeat,
//!     Rename(String),
//! }
//!
//! struct Seats;
//! struct Naming;
//!
//! impl Reducer for Seats {
//!     type State = Hall;
//!     type Action = HallAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut Hall, action: HallAction, _env: &()) -> SmallVec<[Effect<HallAction>; 4]> {
//!         if matches!(action, HallAction::AddSeat) {
//!             state.seats += 1;
//!         }
//!         smallvec![]
//!     }
//! }
//!
//! impl Reducer for Naming {
//!     type State = Hall;
//!     type Action = HallAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut Hall, action: HallAction, _env: &()) -> SmallVec<[Effect<HallAction>; 4]> {
//!         if let HallAction::Rename(name) = action {
//!             state.name = name;
//!         }
//!         smallvec![]
//!     }
//! }
//!
//! let combined = combine_reducers(vec![Arc::new(Seats), Arc::new(Naming)]);
//! let mut hall = Hall::default();
//! let _ = combined.reduce(&mut hall, HallAction::AddSeat, &());
//! let _ = combined.reduce(&mut hall, HallAction::Rename("Main".into()), &());
//! assert_eq!((hall.seats, hall.name.as_str()), (1, "Main"));
//! ```

use std::sync::Arc;

use crate::effect::Effect;
use crate::reducer::Reducer;

/// A shareable reducer trait object.
pub type SharedReducer<S, A, E> = Arc<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in sequence, and all effects are collected and concatenated.
#[must_use]
pub fn combine_reducers<S, A, E>(reducers: Vec<SharedReducer<S, A, E>>) -> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`]. Cloning is cheap: the parts are shared.
pub struct CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<SharedReducer<S, A, E>>,
}

impl<S, A, E> Clone for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    fn clone(&self) -> Self {
        Self {
            reducers: self.reducers.iter().map(Arc::clone).collect(),
        }
    }
}

impl<S, A, E> std::fmt::Debug for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedReducer")
            .field("reducers", &self.reducers.len())
            .finish()
    }
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> smallvec::SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = smallvec::SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects.into_iter().filter(|e| !e.is_none()));
        }

        all_effects
    }
}
