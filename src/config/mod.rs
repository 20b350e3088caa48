//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::game::r#match::DRAIN_INTERVAL;
use crate::util::rate_limit::COMMAND_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Shared secret the game engine presents as a bearer token
    pub admin_token: String,
    /// IRC bridge webhook; lines are only logged when unset
    pub irc_webhook_url: Option<String>,
    /// Allowed origins for the chat feed (comma-separated)
    pub client_origin: String,

    /// Cadence of the outbound message drain
    pub drain_interval: Duration,
    /// Max commands per second accepted from the engine
    pub command_rate_limit: u32,

    pub blue_team_name: String,
    pub green_team_name: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let drain_interval = match lookup("DRAIN_INTERVAL_SECS") {
            Some(raw) => parse_secs("DRAIN_INTERVAL_SECS", &raw)?,
            None => DRAIN_INTERVAL,
        };

        let command_rate_limit = match lookup("COMMAND_RATE_LIMIT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "COMMAND_RATE_LIMIT",
                value: raw,
            })?,
            None => COMMAND_RATE_LIMIT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            admin_token: lookup("ADMIN_TOKEN")
                .filter(|t| !t.is_empty())
                .ok_or(ConfigError::Missing("ADMIN_TOKEN"))?,
            irc_webhook_url: lookup("IRC_WEBHOOK_URL").filter(|u| !u.is_empty()),
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),

            drain_interval,
            command_rate_limit,

            blue_team_name: lookup("BLUE_TEAM_NAME").unwrap_or_else(|| "Blue".to_string()),
            green_team_name: lookup("GREEN_TEAM_NAME").unwrap_or_else(|| "Green".to_string()),
        })
    }
}

fn parse_secs(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            value: raw.to_string(),
        })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("ADMIN_TOKEN", "secret")]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.drain_interval, Duration::from_secs(2));
        assert_eq!(config.command_rate_limit, COMMAND_RATE_LIMIT);
        assert_eq!(config.blue_team_name, "Blue");
        assert_eq!(config.green_team_name, "Green");
        assert!(config.irc_webhook_url.is_none());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = load(&[
            ("ADMIN_TOKEN", "secret"),
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:1"),
        ])
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn admin_token_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("ADMIN_TOKEN"))));
        assert!(matches!(
            load(&[("ADMIN_TOKEN", "")]),
            Err(ConfigError::Missing("ADMIN_TOKEN"))
        ));
    }

    #[test]
    fn rejects_bad_drain_interval() {
        let err = load(&[("ADMIN_TOKEN", "secret"), ("DRAIN_INTERVAL_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DRAIN_INTERVAL_SECS", .. }));

        let config = load(&[("ADMIN_TOKEN", "secret"), ("DRAIN_INTERVAL_SECS", "0.5")]).unwrap();
        assert_eq!(config.drain_interval, Duration::from_millis(500));
    }
}
