//! Named, privilege-gated commands
//!
//! Handlers are generic over the context they act on, so the registry can be
//! exercised without a running match.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::game::session::{Privilege, Session, SessionId};

/// `Some(text)` is shown to the caller, `None` is silent success
pub type CommandResult = Result<Option<String>, CommandError>;

pub type Handler<C> = Box<dyn Fn(&mut C, &Caller, &[String]) -> CommandResult + Send + Sync>;

/// Who is invoking a command, captured at dispatch time
#[derive(Debug, Clone)]
pub struct Caller {
    pub session: Option<SessionId>,
    pub name: String,
    pub privilege: Privilege,
}

impl Caller {
    pub fn new(name: impl Into<String>, privilege: Privilege) -> Self {
        Self {
            session: None,
            name: name.into(),
            privilege,
        }
    }
}

impl From<&Session> for Caller {
    fn from(session: &Session) -> Self {
        Self {
            session: Some(session.id),
            name: session.printable_name.clone(),
            privilege: session.privilege,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    NotFound(String),

    #[error("You are not allowed to use /{0}")]
    PermissionDenied(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Outcome of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// An earlier command with the same name was shadowed
    Replaced,
}

struct Command<C> {
    privilege: Privilege,
    handler: Handler<C>,
}

pub struct CommandRegistry<C> {
    commands: HashMap<String, Command<C>>,
}

impl<C> CommandRegistry<C> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register `handler` under `name`. Last registration wins.
    pub fn register<F>(&mut self, name: &str, privilege: Privilege, handler: F) -> Registration
    where
        F: Fn(&mut C, &Caller, &[String]) -> CommandResult + Send + Sync + 'static,
    {
        let name = name.to_lowercase();
        let command = Command {
            privilege,
            handler: Box::new(handler),
        };

        match self.commands.insert(name.clone(), command) {
            Some(_) => {
                warn!(command = %name, "Duplicate command name, replacing earlier registration");
                Registration::Replaced
            }
            None => {
                debug!(command = %name, ?privilege, "Registered command");
                Registration::Added
            }
        }
    }

    /// Resolve `name`, check the caller's privilege, and run the handler
    pub fn dispatch(&self, ctx: &mut C, name: &str, caller: &Caller, args: &[String]) -> CommandResult {
        let name = name.to_lowercase();
        let command = self
            .commands
            .get(&name)
            .ok_or_else(|| CommandError::NotFound(name.clone()))?;

        if caller.privilege < command.privilege {
            warn!(
                command = %name,
                caller = %caller.name,
                privilege = ?caller.privilege,
                required = ?command.privilege,
                "Command permission denied"
            );
            return Err(CommandError::PermissionDenied(name));
        }

        debug!(command = %name, caller = %caller.name, ?args, "Dispatching command");
        (command.handler)(ctx, caller, args)
    }

    /// Required privilege for `name`, if registered
    pub fn privilege(&self, name: &str) -> Option<Privilege> {
        self.commands.get(&name.to_lowercase()).map(|c| c.privilege)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a chat command line (`/timer 5` or `timer 5`) into name and args
pub fn parse_command_line(line: &str) -> Option<(String, Vec<String>)> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let mut parts = line.split_whitespace();
    let name = parts.next()?.to_lowercase();
    Some((name, parts.map(str::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records handler invocations
    #[derive(Default)]
    struct Ctx {
        calls: Vec<String>,
    }

    fn registry() -> CommandRegistry<Ctx> {
        let mut registry = CommandRegistry::new();
        registry.register("timer", Privilege::Admin, |ctx: &mut Ctx, _caller: &Caller, args: &[String]| {
            ctx.calls.push(format!("timer {}", args.join(" ")));
            Ok(None)
        });
        registry.register("hello", Privilege::Guest, |_ctx: &mut Ctx, caller: &Caller, _args: &[String]| {
            Ok(Some(format!("hi {}", caller.name)))
        });
        registry
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn non_admin_cannot_start_timer() {
        let registry = registry();
        let mut ctx = Ctx::default();
        let caller = Caller::new("deuce", Privilege::Player);

        let result = registry.dispatch(&mut ctx, "timer", &caller, &args(&["5"]));
        assert_eq!(result, Err(CommandError::PermissionDenied("timer".to_string())));
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn unknown_command_is_not_found() {
        let registry = registry();
        let mut ctx = Ctx::default();
        let admin = Caller::new("root", Privilege::Admin);

        let result = registry.dispatch(&mut ctx, "nonexistent", &admin, &[]);
        assert_eq!(result, Err(CommandError::NotFound("nonexistent".to_string())));
    }

    #[test]
    fn admin_invokes_handler_with_args() {
        let registry = registry();
        let mut ctx = Ctx::default();
        let admin = Caller::new("root", Privilege::Admin);

        assert_eq!(registry.dispatch(&mut ctx, "TIMER", &admin, &args(&["5"])), Ok(None));
        assert_eq!(ctx.calls, vec!["timer 5"]);
    }

    #[test]
    fn handler_message_is_returned_to_caller() {
        let registry = registry();
        let mut ctx = Ctx::default();
        let guest = Caller::new("visitor", Privilege::Guest);

        let result = registry.dispatch(&mut ctx, "hello", &guest, &[]);
        assert_eq!(result, Ok(Some("hi visitor".to_string())));
    }

    #[test]
    fn duplicate_registration_replaces_earlier() {
        let mut registry = registry();
        let outcome = registry.register("hello", Privilege::Moderator, |_ctx: &mut Ctx, _caller: &Caller, _args: &[String]| {
            Ok(Some("second".to_string()))
        });
        assert_eq!(outcome, Registration::Replaced);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.privilege("hello"), Some(Privilege::Moderator));

        let mut ctx = Ctx::default();
        let moderator = Caller::new("mod", Privilege::Moderator);
        assert_eq!(
            registry.dispatch(&mut ctx, "hello", &moderator, &[]),
            Ok(Some("second".to_string()))
        );
    }

    #[test]
    fn privilege_is_checked_at_dispatch_time() {
        let registry = registry();
        let mut ctx = Ctx::default();
        let mut caller = Caller::new("deuce", Privilege::Player);
        assert!(registry.dispatch(&mut ctx, "timer", &caller, &args(&["1"])).is_err());

        caller.privilege = Privilege::Admin;
        assert!(registry.dispatch(&mut ctx, "timer", &caller, &args(&["1"])).is_ok());
    }

    #[test]
    fn parses_command_lines() {
        assert_eq!(
            parse_command_line("/timer 5"),
            Some(("timer".to_string(), vec!["5".to_string()]))
        );
        assert_eq!(parse_command_line("  StopTimer  "), Some(("stoptimer".to_string(), vec![])));
        assert_eq!(parse_command_line("/"), None);
        assert_eq!(parse_command_line(""), None);
    }
}
