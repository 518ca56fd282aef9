//! Timer bindings.
//!
//! A binding turns a deadline into a future dispatch on the machine that
//! owns it. Bindings live in a registry inside the machine and are
//! addressed by [`TimerId`], so destroying the machine cancels every
//! binding it ever handed out.
//!
//! Each armed binding is backed by a Tokio task that sleeps until the
//! deadline and then posts an expiry into the machine's input queue. The
//! expiry carries the slot's generation; cancelling or re-arming bumps the
//! generation, so an expiry that lost the race against a cancel is dropped
//! when the machine reads it.
//!
//! Slots are recycled: [`unbind`](Timers::unbind) returns a slot to the
//! registry and the next `bind` hands it out again, so a `TimerId` must not
//! be used after it has been unbound.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::error::FsmError;
use crate::machine::Input;
use crate::table::Event;

/// Handle to a timer binding owned by a [`Machine`](crate::Machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(usize);

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

struct Pending<A> {
    event: Event,
    arg: A,
    deadline: Instant,
    task: AbortHandle,
}

struct Slot<A> {
    generation: u64,
    bound: bool,
    pending: Option<Pending<A>>,
}

pub(crate) struct Timers<A> {
    slots: Vec<Slot<A>>,
    free: Vec<usize>,
}

impl<A> Timers<A> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn bind(&mut self) -> TimerId {
        if let Some(index) = self.free.pop() {
            self.slots[index].bound = true;
            return TimerId(index);
        }
        self.slots.push(Slot {
            generation: 0,
            bound: true,
            pending: None,
        });
        TimerId(self.slots.len() - 1)
    }

    /// Cancels `timer` and returns its slot for reuse. Returns whether the
    /// binding existed.
    pub(crate) fn unbind(&mut self, timer: TimerId) -> bool {
        if !self.slots.get(timer.0).is_some_and(|slot| slot.bound) {
            return false;
        }
        self.cancel(timer);
        self.slots[timer.0].bound = false;
        self.free.push(timer.0);
        true
    }

    /// Disarms `timer`. Returns whether it was pending.
    pub(crate) fn cancel(&mut self, timer: TimerId) -> bool {
        let Some(slot) = self.slots.get_mut(timer.0) else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        match slot.pending.take() {
            Some(pending) => {
                pending.task.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&mut self) -> usize {
        (0..self.slots.len())
            .filter(|&index| self.cancel(TimerId(index)))
            .count()
    }

    /// Claims the bound event for an expiry, or `None` if the expiry is
    /// stale (cancelled, re-armed or already consumed).
    pub(crate) fn expire(&mut self, timer: TimerId, generation: u64) -> Option<(Event, A)> {
        let slot = self.slots.get_mut(timer.0)?;
        if slot.generation != generation {
            return None;
        }
        slot.pending
            .take()
            .map(|pending| (pending.event, pending.arg))
    }

    pub(crate) fn is_pending(&self, timer: TimerId) -> bool {
        self.slots
            .get(timer.0)
            .is_some_and(|slot| slot.pending.is_some())
    }

    pub(crate) fn remaining(&self, timer: TimerId) -> Option<Duration> {
        let pending = self.slots.get(timer.0)?.pending.as_ref()?;
        Some(pending.deadline.saturating_duration_since(Instant::now()))
    }

    /// Number of bound timers.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<A: Send + 'static> Timers<A> {
    pub(crate) fn arm(
        &mut self,
        timer: TimerId,
        delay: Duration,
        event: Event,
        arg: A,
        input: &mpsc::Sender<Input<A>>,
    ) -> Result<(), FsmError> {
        let slot = self
            .slots
            .get_mut(timer.0)
            .filter(|slot| slot.bound)
            .ok_or(FsmError::UnknownTimer { timer })?;
        if slot.pending.is_some() {
            return Err(FsmError::TimerPending { timer });
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FsmError::NoRuntime)?;

        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let input = input.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // The machine may already be gone; nothing to deliver then.
            let _ = input.send(Input::Expired { timer, generation }).await;
        });

        slot.pending = Some(Pending {
            event,
            arg,
            deadline,
            task: task.abort_handle(),
        });
        Ok(())
    }
}

impl<A> Drop for Timers<A> {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if let Some(pending) = slot.pending.take() {
                pending.task.abort();
            }
        }
    }
}
