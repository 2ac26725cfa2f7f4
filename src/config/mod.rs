//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::Rules;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines (`LOG_FORMAT=json`)
    pub log_json: bool,
    /// Allowed client origins for CORS, comma-separated; `*` allows any
    pub client_origin: String,
    /// Inbound WebSocket messages per second per connection
    pub ws_rate_limit: u32,
    /// Fixed base seed for room dice; random per room when unset
    pub game_seed: Option<u64>,
    /// Rule numbers shared by every room
    pub rules: Rules,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = Rules::default();
        let rules = Rules {
            roll_timeout: secs_or("ROLL_TIMEOUT_SECS", defaults.roll_timeout)?,
            action_timeout: secs_or("ACTION_TIMEOUT_SECS", defaults.action_timeout)?,
            auction_duration: secs_or("AUCTION_DURATION_SECS", defaults.auction_duration)?,
            room_expiry: Duration::from_secs(
                parse_or("ROOM_EXPIRY_HOURS", defaults.room_expiry.as_secs() / 3600)? * 3600,
            ),
            default_start_money: parse_or("DEFAULT_START_MONEY", defaults.default_start_money)?,
            ..defaults
        };
        if rules.default_start_money < rules.min_start_money
            || rules.default_start_money > rules.max_start_money
        {
            return Err(ConfigError::Invalid("DEFAULT_START_MONEY"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            ws_rate_limit: parse_or("WS_RATE_LIMIT", 20)?,
            game_seed: parse_opt("GAME_SEED")?,
            rules,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            client_origin: "*".to_string(),
            ws_rate_limit: 20,
            game_seed: None,
            rules: Rules::default(),
        }
    }
}

fn parse_opt<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(name)?.unwrap_or(default))
}

fn secs_or(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(parse_opt(name)?.map(Duration::from_secs).unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_fall_back() {
        let value: u64 = parse_or("RAJPATH_TEST_UNSET_VALUE", 42).unwrap();
        assert_eq!(value, 42);
        let secs = secs_or("RAJPATH_TEST_UNSET_SECS", Duration::from_secs(9)).unwrap();
        assert_eq!(secs, Duration::from_secs(9));
    }

    #[test]
    fn malformed_value_is_rejected() {
        env::set_var("RAJPATH_TEST_BAD_NUMBER", "twelve");
        let result: Result<u64, _> = parse_or("RAJPATH_TEST_BAD_NUMBER", 1);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("RAJPATH_TEST_BAD_NUMBER"))
        ));
    }
}
