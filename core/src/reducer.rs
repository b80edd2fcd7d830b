//! The fold from outcome events to state.
//!
//! Reducers are pure: `(State, Event) → State`. They never perform I/O and
//! never see commands. The store calls the reducer once per accepted event and
//! replaces its state with the returned value.

use crate::event::OutcomeEvent;
use crate::state::State;

/// The Reducer trait - a pure state fold
///
/// # Type Parameters
///
/// - `State`: The state this reducer produces
/// - `Event`: The events this reducer folds
///
/// # Example
///
/// ```
/// use lifecycle_core::Reducer;
///
/// struct CountReducer;
///
/// impl Reducer for CountReducer {
///     type State = usize;
///     type Event = ();
///
///     fn reduce(&self, state: &usize, _event: ()) -> usize {
///         state + 1
///     }
/// }
///
/// assert_eq!(CountReducer.reduce(&1, ()), 2);
/// ```
pub trait Reducer {
    /// The state type this reducer produces
    type State;

    /// The event type this reducer folds
    type Event;

    /// Fold an event into a new state
    ///
    /// The previous state is borrowed, never mutated. The returned value
    /// replaces it wholesale.
    fn reduce(&self, state: &Self::State, event: Self::Event) -> Self::State;
}

/// Folds outcome events into [`State`]
///
/// - `Received { response }` → `Success { value: response }`
/// - `Failed { error }` → `Error { message: error }`
#[derive(Clone, Copy, Debug, Default)]
pub struct OutcomeReducer;

impl Reducer for OutcomeReducer {
    type State = State;
    type Event = OutcomeEvent;

    fn reduce(&self, _state: &State, event: OutcomeEvent) -> State {
        match event {
            OutcomeEvent::Received { response } => State::Success { value: response },
            OutcomeEvent::Failed { error } => State::Error { message: error },
        }
    }
}
