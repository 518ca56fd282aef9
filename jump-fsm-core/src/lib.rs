//! Core engine for jump-fsm.
//!
//! - [`TransitionTable`]: immutable `(state, event) -> handler` jump matrix,
//!   shared between machines through `Arc`.
//! - [`Machine`]: one running instance with its current state, protocol
//!   context, history ring and timer bindings. [`Machine::dispatch`] is the
//!   single place where handlers run.
//! - Timer bindings ([`TimerId`]): deadlines that inject an event into the
//!   owning machine when they expire.
//! - [`Machine::spawn`]: runs a machine as a Tokio task behind a [`Handle`].
//!
//! Dispatch is not synchronized internally. Either keep the machine behind
//! `&mut` on one task (driving timers with [`Machine::step`] or
//! [`Machine::pump`]) or spawn it and talk to it through handles.

mod config;
mod error;
mod history;
mod machine;
mod runtime;
mod table;
mod timer;

pub use crate::config::Config;
pub use crate::error::{FsmError, TaskError};
pub use crate::history::{History, Record};
pub use crate::machine::{Machine, Outcome};
pub use crate::runtime::{Handle, Injector, ShutdownMode, StateWatch, Task};
pub use crate::table::{
    Event, EventSet, Handler, INVALID_NAME, State, StateSet, TableBuilder, TransitionTable,
};
pub use crate::timer::TimerId;
