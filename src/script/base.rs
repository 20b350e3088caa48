//! Base connection behavior at the bottom of every chain

use tracing::debug;

use crate::game::session::Session;
use crate::game::MatchState;

use super::{ConnectionHooks, HookResult, Verdict};

/// Lets every event stand. The game engine owns the real consequences.
#[derive(Debug, Default)]
pub struct DefaultConnection;

impl ConnectionHooks for DefaultConnection {
    fn on_flag_take(&mut self, session: &Session, _state: &mut MatchState) -> HookResult {
        debug!(session = %session, "Flag taken");
        Ok(Verdict::Allow)
    }

    fn on_flag_drop(&mut self, session: &Session, _state: &mut MatchState) -> HookResult {
        debug!(session = %session, "Flag dropped");
        Ok(Verdict::Allow)
    }

    fn on_flag_capture(&mut self, session: &Session, _state: &mut MatchState) -> HookResult {
        debug!(session = %session, "Flag captured");
        Ok(Verdict::Allow)
    }

    fn on_kill(
        &mut self,
        session: &Session,
        killer: Option<&Session>,
        _state: &mut MatchState,
    ) -> HookResult {
        debug!(session = %session, killer = ?killer.map(|k| k.id), "Player killed");
        Ok(Verdict::Allow)
    }
}
