//! Match state and the authoritative match loop
//!
//! A single task owns everything below. Inputs from the HTTP surface arrive
//! on an mpsc channel, scheduled tasks (timer ticks, message drains) come
//! from the match's own [`Scheduler`], and each runs to completion before
//! the next one starts. No locks guard match state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commands::{parse_command_line, Caller, CommandError, CommandRegistry};
use crate::relay::Relay;
use crate::script::{compose, ConnectionHooks, Extension, HookError, Verdict};
use crate::util::time::Clock;

use super::messages::MessageQueue;
use super::scheduler::{Scheduler, TaskId};
use super::session::{Privilege, Session, SessionId, TeamSide, Teams};
use super::timer::{CountdownTimer, TimerError, TimerState};
use super::MatchTask;

/// Default cadence of the outbound message drain
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(2);

/// Game event reported by the engine for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    FlagTake,
    FlagDrop,
    FlagCapture,
    Kill {
        #[serde(default)]
        killer: Option<SessionId>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Unknown session #{0}")]
    UnknownSession(SessionId),

    #[error("Session #{0} already joined")]
    DuplicateSession(SessionId),

    #[error("Empty command")]
    EmptyCommand,

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("Match task is not running")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub teams: Teams,
    pub drain_interval: Duration,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            teams: Teams::default(),
            drain_interval: DRAIN_INTERVAL,
        }
    }
}

/// Timer and messaging state shared by extensions and commands
pub struct MatchState {
    pub id: Uuid,
    pub teams: Teams,
    pub messages: MessageQueue,
    pub timer: CountdownTimer,
    pub scheduler: Scheduler<MatchTask>,
    relay: Arc<dyn Relay>,
    drain_interval: Duration,
}

impl MatchState {
    /// Create the state and start the drain loop; the first drain is due now.
    pub fn new(
        teams: Teams,
        clock: Arc<dyn Clock>,
        relay: Arc<dyn Relay>,
        drain_interval: Duration,
    ) -> Self {
        let mut scheduler = Scheduler::new(clock);
        scheduler.call_later(Duration::ZERO, MatchTask::DrainMessages);

        Self {
            id: Uuid::new_v4(),
            teams,
            messages: MessageQueue::new(),
            timer: CountdownTimer::new(),
            scheduler,
            relay,
            drain_interval,
        }
    }

    /// Queue a narration line for the rate-limited IRC drain
    pub fn add_message(&mut self, line: impl Into<String>) {
        self.messages.enqueue(line);
    }

    pub fn start_timer(&mut self, duration: Duration) -> Result<(), TimerError> {
        self.timer.start(duration, &mut self.scheduler, self.relay.as_ref())
    }

    pub fn stop_timer(&mut self) -> Result<(), TimerError> {
        self.timer.stop(&mut self.scheduler, self.relay.as_ref())
    }

    fn run_task(&mut self, id: TaskId, task: MatchTask) {
        match task {
            MatchTask::TimerTick => {
                let outcome = self.timer.tick(id, &mut self.scheduler, self.relay.as_ref());
                debug!(match_id = %self.id, %id, ?outcome, "Timer tick");
            }
            MatchTask::DrainMessages => {
                if let Some(line) = self.messages.drain_one(self.relay.as_ref()) {
                    debug!(match_id = %self.id, line = %line, remaining = self.messages.len(), "Drained message");
                }
                self.scheduler
                    .call_later(self.drain_interval, MatchTask::DrainMessages);
            }
        }
    }

    /// Run every task that is due now, in order. Returns how many ran.
    pub fn run_due(&mut self) -> usize {
        let mut ran = 0;
        while let Some((id, task)) = self.scheduler.pop_due() {
            self.run_task(id, task);
            ran += 1;
        }
        ran
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerStatus {
    pub state: &'static str,
    pub seconds_left: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchStatus {
    pub match_id: Uuid,
    pub timer: TimerStatus,
    pub queued_messages: usize,
    pub sessions: usize,
}

/// Requests accepted by the match loop
pub enum MatchInput {
    Join {
        id: SessionId,
        name: String,
        team: TeamSide,
        privilege: Privilege,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Leave {
        id: SessionId,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    SetPrivilege {
        id: SessionId,
        privilege: Privilege,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Event {
        session: SessionId,
        event: GameEvent,
        reply: oneshot::Sender<Result<Verdict, MatchError>>,
    },
    Command {
        session: SessionId,
        line: String,
        reply: oneshot::Sender<Result<Option<String>, MatchError>>,
    },
    Status {
        reply: oneshot::Sender<MatchStatus>,
    },
}

/// Handle to the running match loop
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    input_tx: mpsc::Sender<MatchInput>,
}

impl MatchHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> MatchInput,
    ) -> Result<T, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.input_tx
            .send(build(reply))
            .await
            .map_err(|_| MatchError::Closed)?;
        rx.await.map_err(|_| MatchError::Closed)
    }

    pub async fn join(
        &self,
        id: SessionId,
        name: String,
        team: TeamSide,
        privilege: Privilege,
    ) -> Result<(), MatchError> {
        self.request(|reply| MatchInput::Join {
            id,
            name,
            team,
            privilege,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, id: SessionId) -> Result<(), MatchError> {
        self.request(|reply| MatchInput::Leave { id, reply }).await?
    }

    pub async fn set_privilege(&self, id: SessionId, privilege: Privilege) -> Result<(), MatchError> {
        self.request(|reply| MatchInput::SetPrivilege { id, privilege, reply })
            .await?
    }

    pub async fn event(&self, session: SessionId, event: GameEvent) -> Result<Verdict, MatchError> {
        self.request(|reply| MatchInput::Event {
            session,
            event,
            reply,
        })
        .await?
    }

    pub async fn command(&self, session: SessionId, line: String) -> Result<Option<String>, MatchError> {
        self.request(|reply| MatchInput::Command {
            session,
            line,
            reply,
        })
        .await?
    }

    pub async fn status(&self) -> Result<MatchStatus, MatchError> {
        self.request(|reply| MatchInput::Status { reply }).await
    }
}

/// The authoritative match loop
pub struct MatchServer {
    state: MatchState,
    sessions: HashMap<SessionId, Session>,
    hooks: Box<dyn ConnectionHooks>,
    commands: CommandRegistry<MatchState>,
    input_rx: mpsc::Receiver<MatchInput>,
}

impl MatchServer {
    /// Compose `extensions` over `base` and create the loop and its handle
    pub fn new(
        settings: MatchSettings,
        clock: Arc<dyn Clock>,
        relay: Arc<dyn Relay>,
        base: Box<dyn ConnectionHooks>,
        extensions: Vec<Box<dyn Extension>>,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let state = MatchState::new(settings.teams, clock, relay, settings.drain_interval);

        let mut commands = CommandRegistry::new();
        let hooks = compose(base, extensions, &mut commands);

        let handle = MatchHandle {
            id: state.id,
            input_tx,
        };

        let server = Self {
            state,
            sessions: HashMap::new(),
            hooks,
            commands,
            input_rx,
        };

        (server, handle)
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!(match_id = %self.state.id, "Match loop started");

        loop {
            let wait = self
                .state
                .scheduler
                .next_deadline()
                .map(|due| due.saturating_sub(self.state.scheduler.now()));

            tokio::select! {
                input = self.input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                _ = sleep_for(wait) => {}
            }

            self.state.run_due();
        }

        info!(match_id = %self.state.id, "Match loop stopped");
    }

    pub fn handle_input(&mut self, input: MatchInput) {
        match input {
            MatchInput::Join {
                id,
                name,
                team,
                privilege,
                reply,
            } => {
                let _ = reply.send(self.join(id, name, team, privilege));
            }
            MatchInput::Leave { id, reply } => {
                let _ = reply.send(self.leave(id));
            }
            MatchInput::SetPrivilege { id, privilege, reply } => {
                let _ = reply.send(self.set_privilege(id, privilege));
            }
            MatchInput::Event {
                session,
                event,
                reply,
            } => {
                let _ = reply.send(self.fire_event(session, event));
            }
            MatchInput::Command {
                session,
                line,
                reply,
            } => {
                let _ = reply.send(self.run_command(session, &line));
            }
            MatchInput::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    pub fn join(
        &mut self,
        id: SessionId,
        name: String,
        team: TeamSide,
        privilege: Privilege,
    ) -> Result<(), MatchError> {
        if self.sessions.contains_key(&id) {
            return Err(MatchError::DuplicateSession(id));
        }

        let session = Session::new(id, name, self.state.teams.get(team).clone(), privilege);
        info!(match_id = %self.state.id, session = %session, ?team, "Session joined");
        self.sessions.insert(id, session);
        Ok(())
    }

    pub fn leave(&mut self, id: SessionId) -> Result<(), MatchError> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or(MatchError::UnknownSession(id))?;
        info!(match_id = %self.state.id, session = %session, "Session left");
        Ok(())
    }

    pub fn set_privilege(&mut self, id: SessionId, privilege: Privilege) -> Result<(), MatchError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(MatchError::UnknownSession(id))?;
        session.privilege = privilege;
        info!(session = %session, ?privilege, "Session privilege changed");
        Ok(())
    }

    /// Pass one game event through the composed hook chain
    pub fn fire_event(&mut self, id: SessionId, event: GameEvent) -> Result<Verdict, MatchError> {
        let session = self.sessions.get(&id).ok_or(MatchError::UnknownSession(id))?;
        let state = &mut self.state;
        let hooks = &mut self.hooks;

        let result = match event {
            GameEvent::FlagTake => hooks.on_flag_take(session, state),
            GameEvent::FlagDrop => hooks.on_flag_drop(session, state),
            GameEvent::FlagCapture => hooks.on_flag_capture(session, state),
            GameEvent::Kill { killer } => {
                let killer = killer
                    .map(|k| self.sessions.get(&k).ok_or(MatchError::UnknownSession(k)))
                    .transpose()?;
                hooks.on_kill(session, killer, state)
            }
        };

        match result {
            Ok(verdict) => {
                debug!(session = %session, ?event, ?verdict, "Event handled");
                Ok(verdict)
            }
            Err(e) => {
                warn!(session = %session, ?event, error = %e, "Event hook failed");
                Err(e.into())
            }
        }
    }

    /// Parse and dispatch a chat command line on behalf of a session
    pub fn run_command(&mut self, id: SessionId, line: &str) -> Result<Option<String>, MatchError> {
        let session = self.sessions.get(&id).ok_or(MatchError::UnknownSession(id))?;
        let (name, args) = parse_command_line(line).ok_or(MatchError::EmptyCommand)?;
        let caller = Caller::from(session);

        let reply = self.commands.dispatch(&mut self.state, &name, &caller, &args)?;
        info!(session = %session, command = %name, ?reply, "Command handled");
        Ok(reply)
    }

    pub fn status(&self) -> MatchStatus {
        let now = self.state.scheduler.now();
        let state = match self.state.timer.state() {
            TimerState::Idle => "idle",
            TimerState::Armed { .. } => "armed",
            TimerState::Expiring { .. } => "expiring",
        };

        MatchStatus {
            match_id: self.state.id,
            timer: TimerStatus {
                state,
                seconds_left: self.state.timer.time_left(now).map(|t| t.max(0.0)),
            },
            queued_messages: self.state.messages.len(),
            sessions: self.sessions.len(),
        }
    }

    /// Run every scheduled task that is due now
    pub fn run_due(&mut self) -> usize {
        self.state.run_due()
    }
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}
