//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::rate_limit::INPUT_RATE_LIMIT;
use crate::util::time::{MAX_SIMULATION_TPS, SIMULATION_TPS, SNAPSHOT_EVERY_TICKS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Broadcast a snapshot every N ticks
    pub snapshot_every: u32,
    /// Pending input samples kept per player
    pub input_queue_capacity: usize,
    pub max_players: usize,
    pub world_width: f32,
    /// Inbound messages per second per connection
    pub input_rate_limit: u32,

    /// Allowed client origin for CORS, any origin when unset
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            tick_rate: parse_or("TICK_RATE", SIMULATION_TPS)?,
            snapshot_every: parse_or("BROADCAST_EVERY", SNAPSHOT_EVERY_TICKS)?,
            input_queue_capacity: parse_or("INPUT_QUEUE_CAPACITY", 64)?,
            max_players: parse_or("MAX_PLAYERS", 8)?,
            world_width: parse_or("WORLD_WIDTH", 1920.0)?,
            input_rate_limit: parse_or("INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,

            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SIMULATION_TPS).contains(&self.tick_rate) {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if self.snapshot_every == 0 {
            return Err(ConfigError::Invalid("BROADCAST_EVERY"));
        }
        if self.input_queue_capacity == 0 {
            return Err(ConfigError::Invalid("INPUT_QUEUE_CAPACITY"));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid("MAX_PLAYERS"));
        }
        if !(self.world_width.is_finite() && self.world_width > 0.0) {
            return Err(ConfigError::Invalid("WORLD_WIDTH"));
        }
        if self.input_rate_limit == 0 {
            return Err(ConfigError::Invalid("INPUT_RATE_LIMIT"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            tick_rate: SIMULATION_TPS,
            snapshot_every: SNAPSHOT_EVERY_TICKS,
            input_queue_capacity: 64,
            max_players: 8,
            world_width: 1920.0,
            input_rate_limit: INPUT_RATE_LIMIT,
            client_origin: None,
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
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
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.snapshot_every, 3);
    }

    #[test]
    fn zero_tick_rate_rejected() {
        let config = Config {
            tick_rate: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("TICK_RATE"))
        ));
    }

    #[test]
    fn tick_rate_above_limit_rejected() {
        let config = Config {
            tick_rate: 2_000_000,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("TICK_RATE"))
        ));

        let config = Config {
            tick_rate: MAX_SIMULATION_TPS,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_world_width_rejected() {
        let config = Config {
            world_width: -1.0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("WORLD_WIDTH"))
        ));
    }
}
