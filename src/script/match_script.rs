//! Match script: narrates flag and kill events to IRC and provides the
//! `timer` / `stoptimer` admin commands.

use std::time::Duration;

use crate::commands::{Caller, CommandError, CommandRegistry, CommandResult};
use crate::game::session::{Privilege, Session};
use crate::game::MatchState;

use super::{Extension, Flow, HookError};

#[derive(Debug, Default)]
pub struct MatchExtension;

impl MatchExtension {
    pub fn new() -> Self {
        Self
    }

    fn flag_line(session: &Session, verb: &str, state: &MatchState) -> String {
        let other = state.teams.other(&session.team);
        format!(
            "{} {} {}'s flag!",
            session.printable_name,
            verb,
            other.name.to_lowercase()
        )
    }
}

impl Extension for MatchExtension {
    fn name(&self) -> &'static str {
        "match"
    }

    fn install(&self, commands: &mut CommandRegistry<MatchState>) {
        commands.register("timer", Privilege::Admin, start_timer);
        commands.register("stoptimer", Privilege::Admin, stop_timer);
    }

    fn on_flag_take(&mut self, session: &Session, state: &mut MatchState) -> Result<Flow, HookError> {
        let line = Self::flag_line(session, "took", state);
        state.add_message(line);
        Ok(Flow::Continue)
    }

    fn on_flag_drop(&mut self, session: &Session, state: &mut MatchState) -> Result<Flow, HookError> {
        let line = Self::flag_line(session, "dropped", state);
        state.add_message(line);
        Ok(Flow::Continue)
    }

    fn on_flag_capture(&mut self, session: &Session, state: &mut MatchState) -> Result<Flow, HookError> {
        let line = Self::flag_line(session, "captured", state);
        state.add_message(line);
        Ok(Flow::Continue)
    }

    fn on_kill(
        &mut self,
        session: &Session,
        killer: Option<&Session>,
        state: &mut MatchState,
    ) -> Result<Flow, HookError> {
        let killer = killer.unwrap_or(session);
        state.add_message(format!(
            "{} was killed by {}!",
            session.printable_name, killer.printable_name
        ));
        Ok(Flow::Continue)
    }
}

/// `timer <minutes>`
fn start_timer(state: &mut MatchState, _caller: &Caller, args: &[String]) -> CommandResult {
    let arg = args.first().ok_or(CommandError::MissingArgument("minutes"))?;
    let secs = arg
        .parse::<u64>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .ok_or_else(|| CommandError::InvalidArgument(format!("'{}' is not a number of minutes", arg)))?;

    Ok(state
        .start_timer(Duration::from_secs(secs))
        .err()
        .map(|e| e.to_string()))
}

/// `stoptimer`
fn stop_timer(state: &mut MatchState, _caller: &Caller, _args: &[String]) -> CommandResult {
    Ok(state.stop_timer().err().map(|e| e.to_string()))
}
