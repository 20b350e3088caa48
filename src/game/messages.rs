//! Outbound message queue, drained one line per tick
//!
//! Event narration (kills, flag events) arrives in bursts. Relaying it
//! directly would flood the IRC channel, so lines are queued and the match
//! loop pops at most one per drain tick. Nothing is ever dropped.

use std::collections::VecDeque;

use crate::relay::{Relay, Target};

#[derive(Debug, Default)]
pub struct MessageQueue {
    pending: VecDeque<String>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line to the tail
    pub fn enqueue(&mut self, line: impl Into<String>) {
        self.pending.push_back(line.into());
    }

    /// Pop the head line, if any
    pub fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// One drain tick: relay the head line to IRC. No-op when empty.
    pub fn drain_one(&mut self, relay: &dyn Relay) -> Option<String> {
        let line = self.pop()?;
        relay.relay(&line, Target::Irc);
        Some(line)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::RecordingRelay;

    #[test]
    fn drains_fifo_one_line_per_tick() {
        let relay = RecordingRelay::new();
        let mut queue = MessageQueue::new();
        for line in ["A", "B", "C"] {
            queue.enqueue(line);
        }

        assert_eq!(queue.drain_one(&relay).as_deref(), Some("A"));
        assert_eq!(relay.texts(), vec!["A"]);
        assert_eq!(queue.drain_one(&relay).as_deref(), Some("B"));
        assert_eq!(queue.drain_one(&relay).as_deref(), Some("C"));
        assert_eq!(queue.drain_one(&relay), None);

        assert_eq!(
            relay.lines(),
            vec![
                ("A".to_string(), Target::Irc),
                ("B".to_string(), Target::Irc),
                ("C".to_string(), Target::Irc),
            ]
        );
    }

    #[test]
    fn burst_accumulates_without_loss() {
        let mut queue = MessageQueue::new();
        for i in 0..1000 {
            queue.enqueue(format!("line {i}"));
        }
        assert_eq!(queue.len(), 1000);
        assert_eq!(queue.pop().as_deref(), Some("line 0"));
        assert_eq!(queue.len(), 999);
    }
}
