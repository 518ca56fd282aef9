//! Machine instances and the event dispatcher.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::error::FsmError;
use crate::history::{History, Record};
use crate::runtime::{Injector, StateWatch};
use crate::table::{Event, State, TransitionTable};
use crate::timer::{TimerId, Timers};

/// Items read from a machine's input queue.
pub(crate) enum Input<A> {
    Event(Event, A),
    Expired { timer: TimerId, generation: u64 },
}

/// What [`Machine::dispatch`] did with an event. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler ran.
    Handled,
    /// No handler exists for the current state, the event was out of range,
    /// or a timer expiry was stale.
    Ignored,
}

/// A running instance of a transition table.
///
/// `C` is the protocol's own session data, reachable from handlers through
/// [`context`](Self::context) and [`context_mut`](Self::context_mut). `A` is
/// the argument passed along with every event.
///
/// All mutation goes through `&mut self`, so concurrent dispatch on one
/// machine is ruled out by the borrow checker. To drive a machine from
/// several tasks, [`spawn`](Self::spawn) it and use the returned handle.
pub struct Machine<C, A = ()> {
    name: String,
    table: Arc<TransitionTable<C, A>>,
    state: State,
    context: C,
    history: History,
    state_tx: watch::Sender<State>,
    timers: Timers<A>,
    input_tx: mpsc::Sender<Input<A>>,
    pub(crate) input_rx: mpsc::Receiver<Input<A>>,
}

impl<C, A> Machine<C, A> {
    /// Creates a machine in `initial` state.
    ///
    /// With `config.history_capacity > 0` the initial state is the first
    /// history record.
    pub fn new(
        name: impl Into<String>,
        table: Arc<TransitionTable<C, A>>,
        initial: impl Into<State>,
        context: C,
        config: Config,
    ) -> Result<Self, FsmError> {
        let name = name.into();
        let initial = initial.into();
        if initial.index() >= table.nr_states() {
            return Err(FsmError::InvalidInitialState {
                machine: name,
                state: initial,
            });
        }

        let mut history = History::with_capacity(config.history_capacity)?;
        history.record(initial, None);

        let (state_tx, _) = watch::channel(initial);
        let (input_tx, input_rx) = mpsc::channel(config.effective_channel_size());

        tracing::debug!(
            fsm = %name,
            table = %table.name(),
            state = table.state_name(initial),
            "machine created"
        );

        Ok(Self {
            name,
            table,
            state: initial,
            context,
            history,
            state_tx,
            timers: Timers::new(),
            input_tx,
            input_rx,
        })
    }

    /// Instance name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared table this machine dispatches through.
    pub fn table(&self) -> &Arc<TransitionTable<C, A>> {
        &self.table
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Name of the current state, or `"Invalid"` if a handler stored an
    /// out-of-range state.
    pub fn state_name(&self) -> &'static str {
        self.table.state_name(self.state)
    }

    /// Protocol session data.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Mutable protocol session data, for handlers.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Moves the machine to `state` and wakes anyone waiting on it.
    ///
    /// Meant to be called from handlers. An out-of-range state is stored
    /// anyway (every later lookup then finds no handler) and logged.
    pub fn set_state(&mut self, state: impl Into<State>) {
        let state = state.into();
        if state.index() >= self.table.nr_states() {
            tracing::warn!(
                fsm = %self.name,
                state = state.index(),
                nr_states = self.table.nr_states(),
                "state set outside table"
            );
        } else {
            tracing::debug!(
                fsm = %self.name,
                from = self.state_name(),
                to = self.table.state_name(state),
                "change state"
            );
        }
        self.state = state;
        self.history.record(state, None);
        self.state_tx.send_replace(state);
    }

    /// Runs the handler registered for `(current state, event)`.
    ///
    /// Without a handler the call is a no-op: the state is untouched and
    /// nothing is recorded.
    pub fn dispatch(&mut self, event: impl Into<Event>, arg: A) -> Outcome {
        let event = event.into();
        if event.index() >= self.table.nr_events() {
            tracing::error!(
                fsm = %self.name,
                state = self.state_name(),
                event = event.index(),
                nr_events = self.table.nr_events(),
                "event outside table"
            );
            return Outcome::Ignored;
        }

        let Some(handler) = self.table.lookup(self.state, event) else {
            tracing::trace!(
                fsm = %self.name,
                state = self.state_name(),
                event = self.table.event_name(event),
                "no handler"
            );
            return Outcome::Ignored;
        };

        tracing::debug!(
            fsm = %self.name,
            state = self.state_name(),
            event = self.table.event_name(event),
            "dispatch"
        );
        self.history.record(self.state, Some(event));
        handler(self, event, arg);
        Outcome::Handled
    }

    /// Watches state changes from other tasks.
    pub fn subscribe(&self) -> StateWatch {
        StateWatch::new(self.state_tx.subscribe())
    }

    /// Recorded transitions; empty unless history is enabled in [`Config`].
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Logs the history in chronological order, one line per record, then
    /// clears it. The lines are also returned.
    ///
    /// Lines read `STATE` for a state set and `STATE / EVENT` for a
    /// dispatched event.
    pub fn print_history(&mut self) -> Vec<String> {
        let table = &*self.table;
        let lines: Vec<String> = self
            .history
            .drain()
            .into_iter()
            .map(|record| describe(table, record))
            .collect();
        for line in &lines {
            tracing::info!(fsm = %self.name, "{line}");
        }
        lines
    }

    /// Allocates a timer binding. Nothing is armed yet.
    ///
    /// Slots freed by [`unbind_timer`](Self::unbind_timer) are reused.
    pub fn bind_timer(&mut self) -> TimerId {
        self.timers.bind()
    }

    /// Cancels `timer` and releases its binding. The id must not be used
    /// afterwards; a later [`bind_timer`](Self::bind_timer) may return it
    /// again. Returns whether the binding existed.
    pub fn unbind_timer(&mut self, timer: TimerId) -> bool {
        let unbound = self.timers.unbind(timer);
        if unbound {
            tracing::debug!(fsm = %self.name, %timer, "timer unbound");
        }
        unbound
    }

    /// Disarms `timer`. Safe whether it is pending, has fired, was never
    /// armed, or races with its own expiry. Returns whether it was pending.
    pub fn cancel_timer(&mut self, timer: TimerId) -> bool {
        let cancelled = self.timers.cancel(timer);
        if cancelled {
            tracing::debug!(fsm = %self.name, %timer, "timer cancelled");
        }
        cancelled
    }

    /// Whether `timer` is armed and has not expired yet.
    pub fn is_timer_pending(&self, timer: TimerId) -> bool {
        self.timers.is_pending(timer)
    }

    /// Time left before `timer` expires, if pending.
    pub fn timer_remaining(&self, timer: TimerId) -> Option<Duration> {
        self.timers.remaining(timer)
    }

    /// A cloneable sender for posting events from other tasks.
    pub fn injector(&self) -> Injector<A> {
        Injector::new(self.input_tx.clone())
    }

    /// Processes every input already queued, without waiting. Returns the
    /// number of inputs taken from the queue.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(input) = self.input_rx.try_recv() {
            self.process(input);
            processed += 1;
        }
        processed
    }

    /// Waits for the next input (event or timer expiry) and processes it.
    pub async fn step(&mut self) -> Outcome {
        match self.input_rx.recv().await {
            Some(input) => self.process(input),
            // The machine holds a sender itself, so the queue never closes.
            None => Outcome::Ignored,
        }
    }

    pub(crate) fn process(&mut self, input: Input<A>) -> Outcome {
        match input {
            Input::Event(event, arg) => self.dispatch(event, arg),
            Input::Expired { timer, generation } => match self.timers.expire(timer, generation) {
                Some((event, arg)) => {
                    tracing::debug!(
                        fsm = %self.name,
                        %timer,
                        event = self.table.event_name(event),
                        "timer expired"
                    );
                    self.dispatch(event, arg)
                }
                None => {
                    tracing::trace!(fsm = %self.name, %timer, "stale timer expiry");
                    Outcome::Ignored
                }
            },
        }
    }

    /// Cancels every timer binding and returns the protocol context.
    pub fn destroy(mut self) -> C {
        let cancelled = self.timers.cancel_all();
        tracing::debug!(
            fsm = %self.name,
            cancelled,
            bound = self.timers.len(),
            "machine destroyed"
        );
        self.context
    }
}

impl<C, A: Send + 'static> Machine<C, A> {
    /// Arms `timer` to dispatch `event` with `arg` after `delay`.
    ///
    /// Fails with [`FsmError::TimerPending`] if the binding is already armed
    /// and with [`FsmError::NoRuntime`] outside a Tokio runtime. The expiry
    /// is delivered through the input queue, so it runs on whatever drives
    /// the machine ([`step`](Self::step), [`pump`](Self::pump) or the
    /// spawned loop).
    pub fn arm_timer(
        &mut self,
        timer: TimerId,
        delay: Duration,
        event: impl Into<Event>,
        arg: A,
    ) -> Result<(), FsmError> {
        let event = event.into();
        self.timers.arm(timer, delay, event, arg, &self.input_tx)?;
        tracing::debug!(
            fsm = %self.name,
            %timer,
            ?delay,
            event = self.table.event_name(event),
            "timer armed"
        );
        Ok(())
    }

    /// Cancels `timer` if pending and arms it again with a new delay.
    pub fn rearm_timer(
        &mut self,
        timer: TimerId,
        delay: Duration,
        event: impl Into<Event>,
        arg: A,
    ) -> Result<(), FsmError> {
        self.timers.cancel(timer);
        self.arm_timer(timer, delay, event, arg)
    }
}

fn describe<C, A>(table: &TransitionTable<C, A>, record: Record) -> String {
    match record.event {
        Some(event) => format!(
            "{} / {}",
            table.state_name(record.state),
            table.event_name(event)
        ),
        None => table.state_name(record.state).to_string(),
    }
}

impl<C, A> fmt::Debug for Machine<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.name)
            .field("table", &self.table.name())
            .field("state", &self.state_name())
            .field("timers", &self.timers.len())
            .finish()
    }
}
