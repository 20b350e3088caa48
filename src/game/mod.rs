//! Match state, sessions and the timed messaging loop

pub mod messages;
pub mod r#match;
pub mod scheduler;
pub mod session;
pub mod timer;

pub use r#match::{GameEvent, MatchError, MatchHandle, MatchServer, MatchSettings, MatchState, MatchStatus};

/// Work the match loop schedules for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTask {
    /// Countdown timer status tick
    TimerTick,
    /// Relay at most one queued message
    DrainMessages,
}
