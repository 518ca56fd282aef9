//! # jump-fsm
//!
//! Table-driven finite state machines for protocol and link-layer sessions,
//! with timer bindings that inject timeout events through Tokio.
//!
//! A protocol declares its states and events, builds one
//! [`TransitionTable`] of `(state, event) -> handler` entries, and runs any
//! number of [`Machine`]s over it. Events without a handler in the current
//! state are ignored.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use jump_fsm::{Config, Event, EventSet, Machine, StateSet, TimerId, TransitionTable};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, StateSet)]
//! enum Link {
//!     Idle,
//!     Connecting,
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, EventSet)]
//! enum Input {
//!     Connect,
//!     #[fsm(name = "T1")]
//!     Timeout,
//! }
//!
//! struct Session {
//!     t1: Option<TimerId>,
//! }
//!
//! fn start(m: &mut Machine<Session>, _: Event, _: ()) {
//!     m.set_state(Link::Connecting);
//!     if let Some(t1) = m.context().t1 {
//!         let _ = m.rearm_timer(t1, Duration::from_millis(50), Input::Timeout, ());
//!     }
//! }
//!
//! fn give_up(m: &mut Machine<Session>, _: Event, _: ()) {
//!     m.set_state(Link::Idle);
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), jump_fsm::FsmError> {
//! let table = TransitionTable::for_sets::<Link, Input>("link")
//!     .on(Link::Idle, Input::Connect, start)
//!     .on(Link::Connecting, Input::Timeout, give_up)
//!     .build()?;
//!
//! let mut machine = Machine::new("link0", table, Link::Idle, Session { t1: None }, Config::default())?;
//! let t1 = machine.bind_timer();
//! machine.context_mut().t1 = Some(t1);
//!
//! machine.dispatch(Input::Connect, ());
//! assert_eq!(machine.state_name(), "Connecting");
//!
//! // The timer expiry arrives through the machine's input queue.
//! machine.step().await;
//! assert_eq!(machine.state_name(), "Idle");
//! # Ok(())
//! # }
//! ```

#[doc(inline)]
pub use jump_fsm_core::*;
#[doc(inline)]
pub use jump_fsm_macros::*;
