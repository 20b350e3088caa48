//! Countdown timer state machine
//!
//! One timer per match. While armed it announces the remaining time every
//! minute; inside the final minute it switches to a halving backoff
//! (`max(1, time_left / 2)` seconds) so updates get finer as zero nears.

use std::time::Duration;

use tracing::{debug, info};

use crate::relay::{Relay, Target};

use super::scheduler::{Scheduler, TaskId};
use super::MatchTask;

/// Interval between minute announcements, and the seconds-countdown threshold
pub const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    /// Counting down in minutes
    Armed { end: Duration, tick: TaskId },
    /// Inside the final minute
    Expiring { end: Duration, tick: TaskId },
}

/// Timer command failures, shown to the caller as-is
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("Timer is running already.")]
    AlreadyArmed,

    #[error("No timer in progress.")]
    NotArmed,

    /// End time would not fit on the clock
    #[error("Timer duration is too long.")]
    TooLong,
}

/// What a status tick should announce and when the next one is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStatus {
    Ended,
    Seconds { left: u64, next: Duration },
    Minutes { left: u64, next: Duration },
}

impl CountdownStatus {
    pub fn announcement(&self) -> String {
        match self {
            CountdownStatus::Ended => "Timer ended!".to_string(),
            CountdownStatus::Seconds { left, .. } => format!("{} seconds left", left),
            CountdownStatus::Minutes { left, .. } => format!("{} minutes left", left),
        }
    }
}

/// Classify `time_left` (seconds, may be negative). Counts truncate.
pub fn countdown_status(time_left: f64) -> CountdownStatus {
    if time_left <= 0.0 {
        CountdownStatus::Ended
    } else if time_left <= STATUS_INTERVAL.as_secs_f64() {
        let next = ((time_left / 2.0) as u64).max(1);
        CountdownStatus::Seconds {
            left: time_left as u64,
            next: Duration::from_secs(next),
        }
    } else {
        CountdownStatus::Minutes {
            left: (time_left / 60.0) as u64,
            next: STATUS_INTERVAL,
        }
    }
}

/// Result of handling a fired tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick did not belong to the armed timer
    Ignored,
    Rescheduled(Duration),
    Expired,
}

#[derive(Debug)]
pub struct CountdownTimer {
    state: TimerState,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        !matches!(self.state, TimerState::Idle)
    }

    /// Absolute end time while armed
    pub fn end(&self) -> Option<Duration> {
        match self.state {
            TimerState::Idle => None,
            TimerState::Armed { end, .. } | TimerState::Expiring { end, .. } => Some(end),
        }
    }

    /// Seconds left at `now`, negative once overdue
    pub fn time_left(&self, now: Duration) -> Option<f64> {
        self.end().map(|end| end.as_secs_f64() - now.as_secs_f64())
    }

    /// Arm the timer for `duration`, announce it, and seed the first tick
    /// without announcing a status line.
    pub fn start(
        &mut self,
        duration: Duration,
        sched: &mut Scheduler<MatchTask>,
        relay: &dyn Relay,
    ) -> Result<(), TimerError> {
        if self.is_armed() {
            return Err(TimerError::AlreadyArmed);
        }

        let end = sched
            .now()
            .checked_add(duration)
            .ok_or(TimerError::TooLong)?;
        relay.relay(
            &format!("Timer started, ending in {} minutes", duration.as_secs() / 60),
            Target::ChatAndIrc,
        );

        let tick = sched.call_later(STATUS_INTERVAL, MatchTask::TimerTick);
        self.state = TimerState::Armed { end, tick };

        info!(duration_secs = duration.as_secs(), %tick, "Timer started");
        Ok(())
    }

    /// Disarm the timer. The pending tick is cancelled before this returns.
    pub fn stop(
        &mut self,
        sched: &mut Scheduler<MatchTask>,
        relay: &dyn Relay,
    ) -> Result<(), TimerError> {
        let tick = match self.state {
            TimerState::Idle => return Err(TimerError::NotArmed),
            TimerState::Armed { tick, .. } | TimerState::Expiring { tick, .. } => tick,
        };

        sched.cancel(tick);
        self.state = TimerState::Idle;
        relay.relay("Timer stopped.", Target::Chat);

        info!(%tick, "Timer stopped");
        Ok(())
    }

    /// Handle a fired status tick
    pub fn tick(
        &mut self,
        id: TaskId,
        sched: &mut Scheduler<MatchTask>,
        relay: &dyn Relay,
    ) -> TickOutcome {
        let end = match self.state {
            TimerState::Armed { end, tick } | TimerState::Expiring { end, tick } if tick == id => {
                end
            }
            _ => {
                debug!(%id, "Ignoring stale timer tick");
                return TickOutcome::Ignored;
            }
        };

        let time_left = end.as_secs_f64() - sched.now().as_secs_f64();
        let status = countdown_status(time_left);
        relay.relay(&status.announcement(), Target::ChatAndIrc);

        match status {
            CountdownStatus::Ended => {
                self.state = TimerState::Idle;
                info!("Timer ended");
                TickOutcome::Expired
            }
            CountdownStatus::Seconds { next, .. } => {
                let tick = sched.call_later(next, MatchTask::TimerTick);
                self.state = TimerState::Expiring { end, tick };
                TickOutcome::Rescheduled(next)
            }
            CountdownStatus::Minutes { next, .. } => {
                let tick = sched.call_later(next, MatchTask::TimerTick);
                self.state = TimerState::Armed { end, tick };
                TickOutcome::Rescheduled(next)
            }
        }
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::relay::testing::RecordingRelay;
    use crate::util::time::VirtualClock;

    struct Fixture {
        clock: VirtualClock,
        sched: Scheduler<MatchTask>,
        relay: RecordingRelay,
        timer: CountdownTimer,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = VirtualClock::new();
            Self {
                sched: Scheduler::new(Arc::new(clock.clone())),
                clock,
                relay: RecordingRelay::new(),
                timer: CountdownTimer::new(),
            }
        }

        /// Advance to the next timer tick and fire it
        fn fire_next(&mut self) -> TickOutcome {
            let due = self.sched.next_deadline().expect("a tick is pending");
            self.clock.set(due);
            let (id, task) = self.sched.pop_due().expect("tick is due");
            assert_eq!(task, MatchTask::TimerTick);
            self.timer.tick(id, &mut self.sched, &self.relay)
        }
    }

    #[test]
    fn status_in_final_minute_halves() {
        assert_eq!(
            countdown_status(30.0),
            CountdownStatus::Seconds { left: 30, next: Duration::from_secs(15) }
        );
        assert_eq!(
            countdown_status(1.0),
            CountdownStatus::Seconds { left: 1, next: Duration::from_secs(1) }
        );
        assert_eq!(
            countdown_status(60.0),
            CountdownStatus::Seconds { left: 60, next: Duration::from_secs(30) }
        );
    }

    #[test]
    fn status_above_a_minute_truncates_minutes() {
        let status = countdown_status(150.0);
        assert_eq!(status, CountdownStatus::Minutes { left: 2, next: Duration::from_secs(60) });
        assert_eq!(status.announcement(), "2 minutes left");
    }

    #[test]
    fn status_at_or_below_zero_ends() {
        assert_eq!(countdown_status(0.0), CountdownStatus::Ended);
        assert_eq!(countdown_status(-3.5), CountdownStatus::Ended);
        assert_eq!(CountdownStatus::Ended.announcement(), "Timer ended!");
    }

    #[test]
    fn start_announces_and_seeds_silently() {
        let mut fx = Fixture::new();
        fx.timer.start(Duration::from_secs(300), &mut fx.sched, &fx.relay).unwrap();

        assert_eq!(
            fx.relay.lines(),
            vec![("Timer started, ending in 5 minutes".to_string(), Target::ChatAndIrc)]
        );
        assert_eq!(fx.timer.end(), Some(Duration::from_secs(300)));
        assert_eq!(fx.sched.next_deadline(), Some(STATUS_INTERVAL));
        assert_eq!(fx.sched.len(), 1);
    }

    #[test]
    fn start_while_armed_fails_and_keeps_end() {
        let mut fx = Fixture::new();
        fx.timer.start(Duration::from_secs(120), &mut fx.sched, &fx.relay).unwrap();
        fx.clock.advance(Duration::from_secs(10));

        let err = fx.timer.start(Duration::from_secs(600), &mut fx.sched, &fx.relay);
        assert_eq!(err, Err(TimerError::AlreadyArmed));
        assert_eq!(err.unwrap_err().to_string(), "Timer is running already.");
        assert_eq!(fx.timer.end(), Some(Duration::from_secs(120)));
        assert_eq!(fx.sched.len(), 1);
    }

    #[test]
    fn stop_cancels_pending_tick() {
        let mut fx = Fixture::new();
        fx.timer.start(Duration::from_secs(60), &mut fx.sched, &fx.relay).unwrap();
        fx.timer.stop(&mut fx.sched, &fx.relay).unwrap();

        assert_eq!(fx.timer.state(), TimerState::Idle);
        assert!(fx.sched.is_empty());

        fx.clock.advance(Duration::from_secs(3600));
        assert!(fx.sched.pop_due().is_none());
        assert_eq!(fx.relay.texts().last().map(String::as_str), Some("Timer stopped."));
    }

    #[test]
    fn stop_while_idle_fails() {
        let mut fx = Fixture::new();
        let err = fx.timer.stop(&mut fx.sched, &fx.relay).unwrap_err();
        assert_eq!(err.to_string(), "No timer in progress.");
        assert!(fx.relay.lines().is_empty());
    }

    #[test]
    fn full_countdown_sequence() {
        let mut fx = Fixture::new();
        fx.timer.start(Duration::from_secs(150), &mut fx.sched, &fx.relay).unwrap();
        fx.relay.take();

        // t=60, 90s left
        assert_eq!(fx.fire_next(), TickOutcome::Rescheduled(Duration::from_secs(60)));
        // t=120, 30s left
        assert_eq!(fx.fire_next(), TickOutcome::Rescheduled(Duration::from_secs(15)));
        assert!(matches!(fx.timer.state(), TimerState::Expiring { .. }));
        // t=135, 15s left
        assert_eq!(fx.fire_next(), TickOutcome::Rescheduled(Duration::from_secs(7)));
        // t=142, 8s left
        assert_eq!(fx.fire_next(), TickOutcome::Rescheduled(Duration::from_secs(4)));
        // t=146, 4s left
        assert_eq!(fx.fire_next(), TickOutcome::Rescheduled(Duration::from_secs(2)));
        // t=148, 2s left
        assert_eq!(fx.fire_next(), TickOutcome::Rescheduled(Duration::from_secs(1)));
        // t=149, 1s left
        assert_eq!(fx.fire_next(), TickOutcome::Rescheduled(Duration::from_secs(1)));
        // t=150, ended
        assert_eq!(fx.fire_next(), TickOutcome::Expired);

        assert_eq!(
            fx.relay.texts(),
            vec![
                "1 minutes left",
                "30 seconds left",
                "15 seconds left",
                "8 seconds left",
                "4 seconds left",
                "2 seconds left",
                "1 seconds left",
                "Timer ended!",
            ]
        );
        assert_eq!(fx.timer.state(), TimerState::Idle);
        assert!(fx.sched.is_empty());
    }

    #[test]
    fn stale_tick_after_restart_is_ignored() {
        let mut fx = Fixture::new();
        fx.timer.start(Duration::from_secs(300), &mut fx.sched, &fx.relay).unwrap();
        let TimerState::Armed { tick: old, .. } = fx.timer.state() else {
            panic!("timer should be armed");
        };

        fx.timer.stop(&mut fx.sched, &fx.relay).unwrap();
        fx.timer.start(Duration::from_secs(300), &mut fx.sched, &fx.relay).unwrap();
        fx.relay.take();

        assert_eq!(fx.timer.tick(old, &mut fx.sched, &fx.relay), TickOutcome::Ignored);
        assert!(fx.relay.lines().is_empty());
        assert!(fx.timer.is_armed());
    }

    #[test]
    fn start_rejects_end_past_clock_range() {
        let mut fx = Fixture::new();
        fx.clock.advance(Duration::from_secs(100));

        let err = fx.timer.start(Duration::MAX, &mut fx.sched, &fx.relay);
        assert_eq!(err, Err(TimerError::TooLong));
        assert_eq!(fx.timer.state(), TimerState::Idle);
        assert!(fx.sched.is_empty());
        assert!(fx.relay.lines().is_empty());

        assert!(fx.timer.start(Duration::from_secs(60), &mut fx.sched, &fx.relay).is_ok());
    }

    #[test]
    fn stop_while_expiring_cancels_backoff_tick() {
        let mut fx = Fixture::new();
        fx.timer.start(Duration::from_secs(90), &mut fx.sched, &fx.relay).unwrap();
        while !matches!(fx.timer.state(), TimerState::Expiring { .. }) {
            assert!(matches!(fx.fire_next(), TickOutcome::Rescheduled(_)));
        }

        fx.timer.stop(&mut fx.sched, &fx.relay).unwrap();
        assert_eq!(fx.timer.state(), TimerState::Idle);
        assert!(fx.sched.is_empty());
        fx.relay.take();

        fx.clock.advance(Duration::from_secs(3600));
        assert!(fx.sched.pop_due().is_none());
        assert!(fx.relay.lines().is_empty());
    }

    #[test]
    fn timer_can_restart_after_expiry() {
        let mut fx = Fixture::new();
        fx.timer.start(Duration::ZERO, &mut fx.sched, &fx.relay).unwrap();
        assert_eq!(fx.fire_next(), TickOutcome::Expired);
        assert!(fx.timer.start(Duration::from_secs(60), &mut fx.sched, &fx.relay).is_ok());
    }
}
