//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::MatchHandle;
use crate::relay::RelayHub;
use crate::util::rate_limit::CommandRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_handle: MatchHandle,
    pub relay: RelayHub,
    pub command_limiter: CommandRateLimiter,
    /// SHA-256 of the admin token, compared against presented tokens
    pub admin_token_digest: Arc<[u8; 32]>,
}

impl AppState {
    pub fn new(config: Config, match_handle: MatchHandle, relay: RelayHub) -> Self {
        let admin_token_digest = Arc::new(crate::http::middleware::token_digest(&config.admin_token));
        let command_limiter = CommandRateLimiter::new(config.command_rate_limit);

        Self {
            config: Arc::new(config),
            match_handle,
            relay,
            command_limiter,
            admin_token_digest,
        }
    }
}
