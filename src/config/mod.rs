//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated, empty = any)
    pub client_origin: Option<String>,
    /// Simulation and lobby tuning
    pub game: GameConfig,
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

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),

            game: GameConfig::from_env()?,
        })
    }
}

/// Tuning for sessions, waves and the room scheduler
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Nominal scheduler cadence and fixed simulation quantum (ms)
    pub tick_ms: u64,
    /// Sessions idle for longer than this are reaped
    pub idle_timeout: Duration,
    /// How often the reaper sweeps the registry
    pub reap_interval: Duration,
    /// Sun available when a session is created
    pub starting_sun: u32,
    /// Zombie budget of wave 0
    pub wave_base_budget: u32,
    /// Budget added per completed wave
    pub wave_budget_increment: u32,
    /// Waves the plants must survive
    pub wave_total: u32,
    /// Length of an active phase (ms)
    pub wave_active_ms: u64,
    /// Length of a break phase (ms)
    pub wave_break_ms: u64,
    /// Broadcast a snapshot every N scheduler ticks
    pub snapshot_every_ticks: u32,
    /// Upper bound on fixed steps run per scheduler wake-up
    pub max_catchup_steps: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            idle_timeout: Duration::from_secs(5 * 60),
            reap_interval: Duration::from_secs(60),
            starting_sun: 50,
            wave_base_budget: 100,
            wave_budget_increment: 50,
            wave_total: 5,
            wave_active_ms: 30_000,
            wave_break_ms: 15_000,
            snapshot_every_ticks: 1,
            max_catchup_steps: 10,
        }
    }
}

impl GameConfig {
    /// Load game tuning, falling back to defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build tuning from any key/value source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let vars = Vars(lookup);

        Ok(Self {
            tick_ms: vars.nonzero("TICK_MS", defaults.tick_ms)?,
            idle_timeout: Duration::from_secs(
                vars.nonzero("IDLE_TIMEOUT_SECS", defaults.idle_timeout.as_secs())?,
            ),
            reap_interval: Duration::from_secs(
                vars.nonzero("REAP_INTERVAL_SECS", defaults.reap_interval.as_secs())?,
            ),
            starting_sun: vars.parse_or("STARTING_SUN", defaults.starting_sun)?,
            wave_base_budget: vars.parse_or("WAVE_BASE_BUDGET", defaults.wave_base_budget)?,
            wave_budget_increment: vars
                .parse_or("WAVE_BUDGET_INCREMENT", defaults.wave_budget_increment)?,
            wave_total: vars.parse_or("WAVE_TOTAL", defaults.wave_total)?,
            wave_active_ms: vars.secs_as_ms("WAVE_ACTIVE_SECS", defaults.wave_active_ms)?,
            wave_break_ms: vars.secs_as_ms("WAVE_BREAK_SECS", defaults.wave_break_ms)?,
            snapshot_every_ticks: vars
                .parse_or("SNAPSHOT_EVERY_TICKS", defaults.snapshot_every_ticks)?
                .max(1),
            max_catchup_steps: vars
                .parse_or("MAX_CATCHUP_STEPS", defaults.max_catchup_steps)?
                .max(1),
        })
    }

    /// Fixed simulation quantum
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match (self.0)(key) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
            None => Ok(default),
        }
    }

    /// Zero would stall a timer or expire everything at once
    fn nonzero(&self, key: &'static str, default: u64) -> Result<u64, ConfigError> {
        match self.parse_or(key, default)? {
            0 => Err(ConfigError::Invalid(key)),
            value => Ok(value),
        }
    }

    /// Seconds from the environment, milliseconds in memory
    fn secs_as_ms(&self, key: &'static str, default_ms: u64) -> Result<u64, ConfigError> {
        self.parse_or(key, default_ms / 1000)?
            .checked_mul(1000)
            .ok_or(ConfigError::Invalid(key))
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
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<GameConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GameConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.reap_interval, Duration::from_secs(60));
        assert_eq!(config.wave_active_ms, 30_000);
        assert_eq!(config.wave_break_ms, 15_000);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[("WAVE_ACTIVE_SECS", " 12 "), ("REAP_INTERVAL_SECS", "5")]).unwrap();
        assert_eq!(config.wave_active_ms, 12_000);
        assert_eq!(config.reap_interval, Duration::from_secs(5));
    }

    #[test]
    fn zero_timers_are_rejected() {
        for key in ["TICK_MS", "REAP_INTERVAL_SECS", "IDLE_TIMEOUT_SECS"] {
            match load(&[(key, "0")]) {
                Err(ConfigError::Invalid(name)) => assert_eq!(name, key),
                other => panic!("{key}=0 accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn oversized_wave_lengths_are_rejected() {
        let huge = u64::MAX.to_string();
        for key in ["WAVE_ACTIVE_SECS", "WAVE_BREAK_SECS"] {
            match load(&[(key, huge.as_str())]) {
                Err(ConfigError::Invalid(name)) => assert_eq!(name, key),
                other => panic!("{key} overflow accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            load(&[("STARTING_SUN", "lots")]),
            Err(ConfigError::Invalid("STARTING_SUN"))
        ));
    }
}
