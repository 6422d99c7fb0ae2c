//! Deterministic timer queue for the canvas session.
//!
//! The session is the only owner of its timers.  Scheduling returns a
//! [`TimerHandle`] that can cancel the entry; dropping the queue drops every
//! pending entry with it.

use std::collections::{BTreeMap, HashMap};

use tokio::time::Instant;

/// Cancellation handle for one scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Entries ordered by deadline, ties broken by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: BTreeMap<(Instant, u64), T>,
    deadlines: HashMap<u64, Instant>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            deadlines: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `payload` to fire at `at`.
    pub fn schedule(&mut self, at: Instant, payload: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((at, seq), payload);
        self.deadlines.insert(seq, at);
        TimerHandle(seq)
    }

    /// Cancel one entry, returning its payload if it was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let at = self.deadlines.remove(&handle.0)?;
        self.entries.remove(&(at, handle.0))
    }

    /// Drop every pending entry.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.deadlines.clear();
        count
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Remove and return the earliest entry due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        let (&(at, seq), _) = self.entries.iter().next()?;
        if at > now {
            return None;
        }
        self.deadlines.remove(&seq);
        self.entries.remove(&(at, seq))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pending entries matching `predicate`.
    pub fn count_where(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        self.entries.values().filter(|payload| predicate(payload)).count()
    }
}
