//! Bounded diagnostic history.

use crate::error::FsmError;
use crate::table::{Event, State};

/// One history entry.
///
/// `event` is `None` for a pure state set (machine creation or
/// [`Machine::set_state`](crate::Machine::set_state)) and `Some` for a
/// dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub state: State,
    pub event: Option<Event>,
}

/// Fixed-capacity ring of [`Record`]s. When full, the oldest record is
/// overwritten.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Record>,
    capacity: usize,
    // Next slot to write; once the ring is full it is also the oldest entry.
    next: usize,
}

impl History {
    /// Allocates a ring for `capacity` records up front.
    pub fn with_capacity(capacity: usize) -> Result<Self, FsmError> {
        let mut entries = Vec::new();
        entries.try_reserve_exact(capacity)?;
        Ok(Self {
            entries,
            capacity,
            next: 0,
        })
    }

    pub fn record(&mut self, state: State, event: Option<Event>) {
        if self.capacity == 0 {
            return;
        }
        let record = Record { state, event };
        if self.entries.len() < self.capacity {
            self.entries.push(record);
        } else {
            self.entries[self.next] = record;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Records in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        let (newer, older) = self.entries.split_at(self.next.min(self.entries.len()));
        older.iter().chain(newer)
    }

    /// Returns every record in chronological order and empties the ring.
    pub fn drain(&mut self) -> Vec<Record> {
        let out = self.iter().copied().collect();
        self.entries.clear();
        self.next = 0;
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
