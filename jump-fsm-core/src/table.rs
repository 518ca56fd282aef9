//! Transition tables.
//!
//! A table is a dense `nr_states x nr_events` jump matrix of optional
//! handlers. It is built once from a list of `(state, event, handler)`
//! entries and is immutable afterwards, so a single `Arc<TransitionTable>`
//! can back any number of machines running the same protocol.

use std::fmt;
use std::sync::Arc;

use crate::error::FsmError;
use crate::machine::Machine;

/// Name reported for a state or event index outside its table.
pub const INVALID_NAME: &str = "Invalid";

/// A state index in `[0, nr_states)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State(usize);

impl State {
    /// Creates a state from its table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the table index of this state.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state#{}", self.0)
    }
}

/// An event index in `[0, nr_events)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Event(usize);

impl Event {
    /// Creates an event from its table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the table index of this event.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// A named set of states, usually derived with `#[derive(StateSet)]`.
///
/// `NAMES[i]` is the name of the variant converting to `State::new(i)`.
pub trait StateSet: Copy + Into<State> {
    const NAMES: &'static [&'static str];

    fn name(self) -> &'static str {
        let state: State = self.into();
        Self::NAMES.get(state.index()).copied().unwrap_or(INVALID_NAME)
    }
}

/// A named set of events, usually derived with `#[derive(EventSet)]`.
pub trait EventSet: Copy + Into<Event> {
    const NAMES: &'static [&'static str];

    fn name(self) -> &'static str {
        let event: Event = self.into();
        Self::NAMES.get(event.index()).copied().unwrap_or(INVALID_NAME)
    }
}

/// Code run for one (state, event) cell.
///
/// The handler owns every decision about the next state: the dispatcher
/// never changes state on its own, so a handler may stay put, call
/// [`Machine::set_state`], or pick between several targets.
pub type Handler<C, A = ()> = fn(&mut Machine<C, A>, Event, A);

/// Immutable jump matrix from (state, event) to a handler.
pub struct TransitionTable<C, A = ()> {
    name: String,
    state_names: &'static [&'static str],
    event_names: &'static [&'static str],
    jump: Box<[Option<Handler<C, A>>]>,
}

impl<C, A> TransitionTable<C, A> {
    /// Starts building a table over the given state and event names.
    ///
    /// The number of states and events is the length of the name slices.
    pub fn builder(
        name: impl Into<String>,
        state_names: &'static [&'static str],
        event_names: &'static [&'static str],
    ) -> TableBuilder<C, A> {
        TableBuilder {
            name: name.into(),
            state_names,
            event_names,
            entries: Vec::new(),
        }
    }

    /// Starts building a table whose names come from derived state and
    /// event sets.
    pub fn for_sets<S: StateSet, E: EventSet>(name: impl Into<String>) -> TableBuilder<C, A> {
        Self::builder(name, S::NAMES, E::NAMES)
    }

    /// Returns the handler for `(state, event)`, or `None` if the cell is
    /// empty or either index is out of range.
    #[inline]
    #[must_use]
    pub fn lookup(&self, state: State, event: Event) -> Option<Handler<C, A>> {
        if state.index() >= self.nr_states() || event.index() >= self.nr_events() {
            return None;
        }
        self.jump
            .get(state.index() * self.nr_events() + event.index())
            .copied()
            .flatten()
    }

    /// Table name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of states; valid state indices are `0..nr_states()`.
    pub fn nr_states(&self) -> usize {
        self.state_names.len()
    }

    /// Number of events; valid event indices are `0..nr_events()`.
    pub fn nr_events(&self) -> usize {
        self.event_names.len()
    }

    /// Name of `state`, or `"Invalid"` when out of range.
    pub fn state_name(&self, state: State) -> &'static str {
        self.state_names
            .get(state.index())
            .copied()
            .unwrap_or(INVALID_NAME)
    }

    /// Name of `event`, or `"Invalid"` when out of range.
    pub fn event_name(&self, event: Event) -> &'static str {
        self.event_names
            .get(event.index())
            .copied()
            .unwrap_or(INVALID_NAME)
    }

    /// Events that have a handler in `state`, in index order.
    pub fn handled_events(&self, state: State) -> impl Iterator<Item = Event> + '_ {
        (0..self.nr_events())
            .map(Event::new)
            .filter(move |event| self.lookup(state, *event).is_some())
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.jump.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C, A> fmt::Debug for TransitionTable<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("name", &self.name)
            .field("nr_states", &self.nr_states())
            .field("nr_events", &self.nr_events())
            .field("transitions", &self.len())
            .finish()
    }
}

/// Collects transition entries and validates them into a table.
pub struct TableBuilder<C, A = ()> {
    name: String,
    state_names: &'static [&'static str],
    event_names: &'static [&'static str],
    entries: Vec<(State, Event, Handler<C, A>)>,
}

impl<C, A> TableBuilder<C, A> {
    /// Registers `handler` for `event` while in `state`.
    #[must_use]
    pub fn on(
        mut self,
        state: impl Into<State>,
        event: impl Into<Event>,
        handler: Handler<C, A>,
    ) -> Self {
        self.entries.push((state.into(), event.into(), handler));
        self
    }

    /// Registers the same handler for `event` in each of `states`.
    #[must_use]
    pub fn on_each<S: Into<State>>(
        mut self,
        states: impl IntoIterator<Item = S>,
        event: impl Into<Event>,
        handler: Handler<C, A>,
    ) -> Self {
        let event = event.into();
        for state in states {
            self.entries.push((state.into(), event, handler));
        }
        self
    }

    /// Validates the entries and produces a shareable table.
    ///
    /// Fails with [`FsmError::BadTemplate`] if any entry is out of range and
    /// with [`FsmError::DuplicateTransition`] if a cell is listed twice.
    pub fn build(self) -> Result<Arc<TransitionTable<C, A>>, FsmError> {
        let nr_states = self.state_names.len();
        let nr_events = self.event_names.len();
        if nr_states == 0 || nr_events == 0 {
            return Err(FsmError::EmptyTemplate { table: self.name });
        }

        let cells = nr_states * nr_events;
        let mut jump: Vec<Option<Handler<C, A>>> = Vec::new();
        jump.try_reserve_exact(cells)?;
        jump.resize(cells, None);

        for (state, event, handler) in self.entries {
            if state.index() >= nr_states || event.index() >= nr_events {
                return Err(FsmError::BadTemplate {
                    table: self.name,
                    state,
                    event,
                    nr_states,
                    nr_events,
                });
            }
            let cell = &mut jump[state.index() * nr_events + event.index()];
            if cell.is_some() {
                return Err(FsmError::DuplicateTransition {
                    table: self.name,
                    state,
                    event,
                });
            }
            *cell = Some(handler);
        }

        tracing::debug!(
            table = %self.name,
            nr_states,
            nr_events,
            "transition table built"
        );

        Ok(Arc::new(TransitionTable {
            name: self.name,
            state_names: self.state_names,
            event_names: self.event_names,
            jump: jump.into_boxed_slice(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const STATES: &[&str] = &["IDLE", "CONNECTING", "UP"];
    const EVENTS: &[&str] = &["CONNECT", "TIMEOUT"];

    type M = Machine<u32, ()>;

    fn first(m: &mut M, _: Event, _: ()) {
        *m.context_mut() += 1;
    }

    fn second(m: &mut M, _: Event, _: ()) {
        *m.context_mut() += 10;
    }

    #[test]
    fn test_lookup_returns_registered_handler() {
        let table = TransitionTable::<u32>::builder("link", STATES, EVENTS)
            .on(State::new(0), Event::new(0), first)
            .on(State::new(1), Event::new(1), second)
            .build()
            .unwrap();

        assert_eq!(table.nr_states(), 3);
        assert_eq!(table.nr_events(), 2);
        assert_eq!(table.len(), 2);
        assert!(table.lookup(State::new(0), Event::new(0)).is_some());
        assert!(table.lookup(State::new(1), Event::new(1)).is_some());
        assert!(table.lookup(State::new(0), Event::new(1)).is_none());
        assert!(table.lookup(State::new(2), Event::new(0)).is_none());
    }

    #[test]
    fn test_out_of_range_state_is_bad_template() {
        let err = TransitionTable::<u32>::builder("link", STATES, EVENTS)
            .on(State::new(5), Event::new(0), first)
            .build()
            .unwrap_err();

        match err {
            FsmError::BadTemplate {
                state, nr_states, ..
            } => {
                assert_eq!(state, State::new(5));
                assert_eq!(nr_states, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_event_is_bad_template() {
        let err = TransitionTable::<u32>::builder("link", STATES, EVENTS)
            .on(State::new(0), Event::new(2), first)
            .build()
            .unwrap_err();
        assert!(matches!(err, FsmError::BadTemplate { .. }));
    }

    #[test]
    fn test_duplicate_transition_rejected() {
        let err = TransitionTable::<u32>::builder("link", STATES, EVENTS)
            .on(State::new(0), Event::new(0), first)
            .on(State::new(0), Event::new(0), second)
            .build()
            .unwrap_err();
        assert!(matches!(err, FsmError::DuplicateTransition { .. }));
    }

    #[test]
    fn test_empty_template_rejected() {
        let err = TransitionTable::<u32>::builder("empty", &[], EVENTS)
            .build()
            .unwrap_err();
        assert!(matches!(err, FsmError::EmptyTemplate { .. }));
    }

    #[test]
    fn test_names() {
        let table = TransitionTable::<u32>::builder("link", STATES, EVENTS)
            .build()
            .unwrap();
        assert_eq!(table.state_name(State::new(1)), "CONNECTING");
        assert_eq!(table.event_name(Event::new(1)), "TIMEOUT");
        assert_eq!(table.state_name(State::new(3)), INVALID_NAME);
        assert_eq!(table.event_name(Event::new(9)), INVALID_NAME);
        assert!(table.is_empty());
    }

    #[test]
    fn test_on_each_and_handled_events() {
        let table = TransitionTable::<u32>::builder("link", STATES, EVENTS)
            .on_each([State::new(0), State::new(2)], Event::new(1), first)
            .on(State::new(2), Event::new(0), second)
            .build()
            .unwrap();

        let events: Vec<_> = table.handled_events(State::new(2)).collect();
        assert_eq!(events, vec![Event::new(0), Event::new(1)]);
        assert_eq!(table.handled_events(State::new(1)).count(), 0);
    }

    proptest! {
        #[test]
        fn prop_lookup_is_total(
            nr_states in 1usize..8,
            nr_events in 1usize..8,
            cells in proptest::collection::hash_set((0usize..8, 0usize..8), 0..32),
            probe_state in 0usize..16,
            probe_event in 0usize..16,
        ) {
            static NAMES: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];
            let cells: Vec<_> = cells
                .into_iter()
                .filter(|(s, e)| *s < nr_states && *e < nr_events)
                .collect();

            let mut builder =
                TransitionTable::<u32>::builder("prop", &NAMES[..nr_states], &NAMES[..nr_events]);
            for (s, e) in &cells {
                builder = builder.on(State::new(*s), Event::new(*e), first);
            }
            let table = builder.build().unwrap();

            let registered = cells.contains(&(probe_state, probe_event));
            let found = table.lookup(State::new(probe_state), Event::new(probe_event)).is_some();
            prop_assert_eq!(registered, found);
        }
    }
}
