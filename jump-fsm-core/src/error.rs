//! Error types for table construction, timers and the runtime.

use std::collections::TryReserveError;

use crate::table::{Event, State};
use crate::timer::TimerId;

/// Errors returned by the engine.
///
/// Construction errors (`BadTemplate`, `EmptyTemplate`,
/// `DuplicateTransition`) describe a malformed static transition list and are
/// usually treated as fatal at initialization time. Dispatch itself never
/// fails: an event without a handler is ignored.
#[derive(Debug, thiserror::Error)]
pub enum FsmError {
    /// A transition entry referenced a state or event outside the table.
    #[error(
        "bad template for table '{table}': transition ({state}, {event}) outside {nr_states}x{nr_events}"
    )]
    BadTemplate {
        table: String,
        state: State,
        event: Event,
        nr_states: usize,
        nr_events: usize,
    },

    /// The table was declared with no states or no events.
    #[error("bad template for table '{table}': no states or no events")]
    EmptyTemplate { table: String },

    /// The same (state, event) pair was listed twice.
    #[error("duplicate transition ({state}, {event}) in table '{table}'")]
    DuplicateTransition {
        table: String,
        state: State,
        event: Event,
    },

    /// Allocating the jump matrix or the history ring failed.
    #[error("out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// The initial state given to a machine is outside its table.
    #[error("initial state {state} is not valid for machine '{machine}'")]
    InvalidInitialState { machine: String, state: State },

    /// The timer id was not bound on this machine.
    #[error("unknown {timer}")]
    UnknownTimer { timer: TimerId },

    /// The timer is already armed; cancel it or use `rearm_timer`.
    #[error("{timer} is already pending")]
    TimerPending { timer: TimerId },

    /// Timers need a Tokio runtime to schedule their expiry.
    #[error("no Tokio runtime available to schedule a timer")]
    NoRuntime,

    /// The machine's input queue is full.
    #[error("input queue is full")]
    Full,

    /// The machine is gone.
    #[error("machine input channel is closed")]
    Closed,
}

/// Error type returned by a spawned machine task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The machine task panicked (usually inside a handler) or was cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
