//! Running a machine as a Tokio task.
//!
//! [`Machine::spawn`] moves the machine into a background task that reads
//! its input queue, so events from any number of producers and timer
//! expiries are dispatched one at a time. The returned [`Handle`] posts
//! events and observes state; the [`Task`] resolves to the protocol context
//! once the loop stops.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{FsmError, TaskError};
use crate::machine::{Input, Machine};
use crate::table::{Event, State};

/// Shutdown mode for a spawned machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// The loop dispatches every input already queued, then stops.
    Graceful,
    /// The loop stops at once; queued inputs are dropped.
    Immediate,
}

/// Posts events into a machine's input queue.
pub struct Injector<A> {
    tx: mpsc::Sender<Input<A>>,
}

impl<A> Injector<A> {
    pub(crate) fn new(tx: mpsc::Sender<Input<A>>) -> Self {
        Self { tx }
    }

    /// Queues an event, waiting for room if the queue is full.
    pub async fn send(&self, event: impl Into<Event>, arg: A) -> Result<(), FsmError> {
        self.tx
            .send(Input::Event(event.into(), arg))
            .await
            .map_err(|_| FsmError::Closed)
    }

    /// Queues an event without waiting.
    pub fn try_send(&self, event: impl Into<Event>, arg: A) -> Result<(), FsmError> {
        self.tx
            .try_send(Input::Event(event.into(), arg))
            .map_err(|e| match e {
                TrySendError::Full(_) => FsmError::Full,
                TrySendError::Closed(_) => FsmError::Closed,
            })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<A> Clone for Injector<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Observes a machine's state from another task.
///
/// Only the latest state is kept: a state the machine passes through
/// quickly may never be observed.
#[derive(Debug, Clone)]
pub struct StateWatch {
    rx: watch::Receiver<State>,
}

impl StateWatch {
    pub(crate) fn new(rx: watch::Receiver<State>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> State {
        *self.rx.borrow()
    }

    /// Waits for the next state change and returns the new state.
    pub async fn changed(&mut self) -> Result<State, FsmError> {
        self.rx.changed().await.map_err(|_| FsmError::Closed)?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Waits until the machine is in `target`.
    pub async fn wait_for(&self, target: impl Into<State>) -> Result<(), FsmError> {
        let target = target.into();
        let mut rx = self.rx.clone();
        while *rx.borrow_and_update() != target {
            rx.changed().await.map_err(|_| FsmError::Closed)?;
        }
        Ok(())
    }
}

/// A handle to a spawned machine for event submission and state
/// observation.
///
/// Dropping every handle (and clone) stops the loop as if
/// [`shutdown_immediate`](Self::shutdown_immediate) had been called.
pub struct Handle<A> {
    injector: Injector<A>,
    state: StateWatch,
    shutdown_tx: Arc<watch::Sender<Option<ShutdownMode>>>,
}

impl<A> Handle<A> {
    /// Sends an event to the machine.
    pub async fn send(&self, event: impl Into<Event>, arg: A) -> Result<(), FsmError> {
        self.injector.send(event, arg).await
    }

    /// Attempts to send an event without awaiting capacity.
    pub fn try_send(&self, event: impl Into<Event>, arg: A) -> Result<(), FsmError> {
        self.injector.try_send(event, arg)
    }

    /// Returns the current state of the machine.
    pub fn current_state(&self) -> State {
        self.state.current()
    }

    /// Waits for the machine to reach the specified state.
    pub async fn wait_for_state(&self, target: impl Into<State>) -> Result<(), FsmError> {
        self.state.wait_for(target).await
    }

    pub fn subscribe(&self) -> StateWatch {
        self.state.clone()
    }

    pub fn injector(&self) -> Injector<A> {
        self.injector.clone()
    }

    /// Initiates a graceful shutdown. Processes queued inputs before exiting.
    pub fn shutdown_graceful(&self) {
        self.shutdown_tx.send_replace(Some(ShutdownMode::Graceful));
    }

    /// Initiates an immediate shutdown. Drops queued inputs.
    pub fn shutdown_immediate(&self) {
        self.shutdown_tx.send_replace(Some(ShutdownMode::Immediate));
    }
}

impl<A> Clone for Handle<A> {
    fn clone(&self) -> Self {
        Self {
            injector: self.injector.clone(),
            state: self.state.clone(),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
        }
    }
}

/// The background task running a machine.
/// Awaiting it yields the protocol context once the loop stops.
#[must_use = "dropping a Task detaches the machine; await it to get the context back"]
pub struct Task<C> {
    handle: JoinHandle<C>,
}

impl<C> Task<C> {
    /// Aborts the loop. Awaiting the task then returns a join error.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl<C> Future for Task<C> {
    type Output = Result<C, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map_err(TaskError::from)
    }
}

impl<C, A> Machine<C, A>
where
    C: Send + 'static,
    A: Send + 'static,
{
    /// Moves the machine into a Tokio task.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn(self) -> (Handle<A>, Task<C>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        let handle = Handle {
            injector: self.injector(),
            state: self.subscribe(),
            shutdown_tx: Arc::new(shutdown_tx),
        };
        let task = Task {
            handle: tokio::spawn(self.run(shutdown_rx)),
        };
        (handle, task)
    }

    async fn run(mut self, mut shutdown: watch::Receiver<Option<ShutdownMode>>) -> C {
        tracing::debug!(fsm = %self.name(), "machine loop started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    let mode = match changed {
                        Ok(()) => *shutdown.borrow_and_update(),
                        // Every handle is gone.
                        Err(_) => Some(ShutdownMode::Immediate),
                    };
                    match mode {
                        Some(ShutdownMode::Immediate) => break,
                        Some(ShutdownMode::Graceful) => {
                            let drained = self.pump();
                            tracing::debug!(fsm = %self.name(), drained, "graceful shutdown");
                            break;
                        }
                        None => {}
                    }
                }
                input = self.input_rx.recv() => {
                    let Some(input) = input else { break };
                    self.process(input);
                }
            }
        }
        self.destroy()
    }
}
