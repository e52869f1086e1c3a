// src/config.rs

use std::{env, fmt, net::SocketAddr, time::Duration};

use dotenvy::dotenv;

use crate::engine::SessionTimings;

/// Where quizzes, questions and attempts live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local store. Data is lost on restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    /// Shared secret of the external identity provider (HS256).
    pub jwt_secret: String,
    pub rust_log: String,
    /// Period of the session countdown tick.
    pub tick_interval: Duration,
    /// Unfinished untimed sessions are dropped after this long without requests.
    pub session_idle: Duration,
    /// Completed sessions stay reachable this long after their last request.
    pub session_linger: Duration,
    pub bind_addr: SocketAddr,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {}: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let storage = match env::var("STORAGE_BACKEND").as_deref() {
            Err(_) | Ok("postgres") => StorageBackend::Postgres,
            Ok("memory") => StorageBackend::Memory,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let defaults = SessionTimings::default();
        let tick_interval = duration_var("TICK_INTERVAL_MS", Duration::from_millis, defaults.tick)?;
        let session_idle = duration_var("SESSION_IDLE_SECS", Duration::from_secs, defaults.idle)?;
        let session_linger =
            duration_var("SESSION_LINGER_SECS", Duration::from_secs, defaults.linger)?;

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: raw.clone(),
            })?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        Ok(Self {
            storage,
            database_url,
            jwt_secret,
            rust_log,
            tick_interval,
            session_idle,
            session_linger,
            bind_addr,
        })
    }

    pub fn session_timings(&self) -> SessionTimings {
        SessionTimings {
            tick: self.tick_interval,
            idle: self.session_idle,
            linger: self.session_linger,
        }
    }
}

/// A positive integer variable read in the unit of `to_duration`.
fn duration_var(
    key: &'static str,
    to_duration: fn(u64) -> Duration,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(n) if n > 0 => Ok(to_duration(n)),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}
