//! Deterministic callback scheduler for the match loop
//!
//! Replaces a process-wide reactor: the match task owns one `Scheduler`,
//! asks it for the next deadline, and pops due tasks one at a time. Tasks are
//! plain values (not closures) so the owner decides how to run them against
//! its own state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::util::time::Clock;

/// Handle to a scheduled task, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

pub struct Scheduler<T> {
    clock: Arc<dyn Clock>,
    /// Ordered by deadline, then by scheduling order
    queue: BTreeMap<(Duration, u64), T>,
    deadlines: HashMap<u64, Duration>,
    next_seq: u64,
}

impl<T> Scheduler<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Current time according to the injected clock
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Schedule `task` to run `delay` from now. Saturates at `Duration::MAX`.
    pub fn call_later(&mut self, delay: Duration, task: T) -> TaskId {
        let due = self.now().saturating_add(delay);
        self.call_at(due, task)
    }

    /// Schedule `task` at an absolute clock time
    pub fn call_at(&mut self, due: Duration, task: T) -> TaskId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((due, seq), task);
        self.deadlines.insert(seq, due);
        TaskId(seq)
    }

    /// Cancel a pending task. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(due) => self.queue.remove(&(due, id.0)).is_some(),
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.deadlines.contains_key(&id.0)
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Remove and return the earliest task whose deadline has passed
    pub fn pop_due(&mut self) -> Option<(TaskId, T)> {
        let now = self.now();
        let (&(due, seq), _) = self.queue.iter().next()?;
        if due > now {
            return None;
        }
        self.deadlines.remove(&seq);
        self.queue.remove(&(due, seq)).map(|task| (TaskId(seq), task))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
