//! Behavior extensions layered over a connection's event hooks
//!
//! Each extension wraps exactly one inner chain, so composing a list of
//! extensions yields a strict linear chain: the last one applied is the
//! outermost layer and sees events first. An extension runs its own logic,
//! then the event continues inward unchanged, and the innermost verdict is
//! returned to the caller untouched.

pub mod base;
pub mod match_script;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commands::CommandRegistry;
use crate::game::session::Session;
use crate::game::MatchState;

pub use base::DefaultConnection;
pub use match_script::MatchExtension;

/// Whether the game engine should let an event stand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
}

/// An extension's decision after running its own logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Pass the event to the inner layer
    Continue,
    /// Do not call inner layers; return this verdict instead
    Stop(Verdict),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("extension {extension} failed on {event}: {reason}")]
    Extension {
        extension: &'static str,
        event: &'static str,
        reason: String,
    },
}

pub type HookResult = Result<Verdict, HookError>;

/// Connection event hooks. Implemented by the base behavior and by every
/// composed layer.
pub trait ConnectionHooks: Send {
    fn on_flag_take(&mut self, session: &Session, state: &mut MatchState) -> HookResult;

    fn on_flag_drop(&mut self, session: &Session, state: &mut MatchState) -> HookResult;

    fn on_flag_capture(&mut self, session: &Session, state: &mut MatchState) -> HookResult;

    /// `killer` is `None` for deaths without a killer (falls, suicides)
    fn on_kill(
        &mut self,
        session: &Session,
        killer: Option<&Session>,
        state: &mut MatchState,
    ) -> HookResult;
}

/// A behavior module. Every hook defaults to passing the event through.
pub trait Extension: Send {
    fn name(&self) -> &'static str;

    /// Register this extension's commands
    fn install(&self, _commands: &mut CommandRegistry<MatchState>) {}

    fn on_flag_take(&mut self, _session: &Session, _state: &mut MatchState) -> Result<Flow, HookError> {
        Ok(Flow::Continue)
    }

    fn on_flag_drop(&mut self, _session: &Session, _state: &mut MatchState) -> Result<Flow, HookError> {
        Ok(Flow::Continue)
    }

    fn on_flag_capture(&mut self, _session: &Session, _state: &mut MatchState) -> Result<Flow, HookError> {
        Ok(Flow::Continue)
    }

    fn on_kill(
        &mut self,
        _session: &Session,
        _killer: Option<&Session>,
        _state: &mut MatchState,
    ) -> Result<Flow, HookError> {
        Ok(Flow::Continue)
    }
}

/// One extension wrapped around the rest of the chain
pub struct Layer {
    extension: Box<dyn Extension>,
    inner: Box<dyn ConnectionHooks>,
}

impl Layer {
    pub fn new(extension: Box<dyn Extension>, inner: Box<dyn ConnectionHooks>) -> Self {
        Self { extension, inner }
    }

    fn proceed<F>(&mut self, flow: Flow, event: &'static str, inner: F) -> HookResult
    where
        F: FnOnce(&mut dyn ConnectionHooks) -> HookResult,
    {
        match flow {
            Flow::Continue => inner(self.inner.as_mut()),
            Flow::Stop(verdict) => {
                debug!(extension = self.extension.name(), event, ?verdict, "Extension stopped event");
                Ok(verdict)
            }
        }
    }
}

impl ConnectionHooks for Layer {
    fn on_flag_take(&mut self, session: &Session, state: &mut MatchState) -> HookResult {
        let flow = self.extension.on_flag_take(session, state)?;
        self.proceed(flow, "flag_take", |inner| inner.on_flag_take(session, state))
    }

    fn on_flag_drop(&mut self, session: &Session, state: &mut MatchState) -> HookResult {
        let flow = self.extension.on_flag_drop(session, state)?;
        self.proceed(flow, "flag_drop", |inner| inner.on_flag_drop(session, state))
    }

    fn on_flag_capture(&mut self, session: &Session, state: &mut MatchState) -> HookResult {
        let flow = self.extension.on_flag_capture(session, state)?;
        self.proceed(flow, "flag_capture", |inner| inner.on_flag_capture(session, state))
    }

    fn on_kill(
        &mut self,
        session: &Session,
        killer: Option<&Session>,
        state: &mut MatchState,
    ) -> HookResult {
        let flow = self.extension.on_kill(session, killer, state)?;
        self.proceed(flow, "kill", |inner| inner.on_kill(session, killer, state))
    }
}

/// Wrap `base` in `extensions`, applied in order, and install their commands.
///
/// Applying `[m1, m2]` yields `m2(m1(base))`: events run m2, then m1, then
/// the base.
pub fn compose(
    base: Box<dyn ConnectionHooks>,
    extensions: Vec<Box<dyn Extension>>,
    commands: &mut CommandRegistry<MatchState>,
) -> Box<dyn ConnectionHooks> {
    extensions.into_iter().fold(base, |inner, extension| {
        debug!(extension = extension.name(), "Applying extension");
        extension.install(commands);
        let layer: Box<dyn ConnectionHooks> = Box::new(Layer::new(extension, inner));
        layer
    })
}
