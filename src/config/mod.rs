//! Centralized configuration for the messaging core: environment-based
//! loading, runtime validation, and the relay policy tunable.
//!
//! Grounded on `config/mod.rs`'s `Config`/`Environment`/`validate`/
//! `override_from_env`/`default_for_environment` pattern, trimmed of the
//! gaming/consensus/treasury sections that pattern also carries in the
//! teacher (those submodules — `initialization`, `performance`,
//! `runtime_reload`, `scalability` — were not brought over either, since
//! nothing here needs hot-reload or platform-scalability tuning).

pub mod relay;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use relay::{RelayConfig, RelayConfigSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub transport: TransportConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub environment: Environment,
    pub data_dir: PathBuf,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub max_connections: usize,
    pub connection_timeout: Duration,
    pub max_frame_size: usize,
    pub enable_bluetooth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub enable_wal: bool,
    pub checkpoint_interval: Duration,
}

/// Security-adjacent tunables that aren't themselves part of the relay
/// policy object (`relay::RelayConfig`): handshake/session limits and
/// the spam policy's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub session_timeout: Duration,
    pub dedup_window: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_ceiling: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enable_tracing: bool,
    pub log_retention_days: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

impl Config {
    /// Load configuration from file (selected by `MESHTALK_ENV`) with
    /// environment-variable overrides applied on top, then validate.
    pub fn load() -> Result<Self> {
        let env_name = env::var("MESHTALK_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = match env_name.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        };

        let config_path = Self::config_path(environment)?;
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default_for_environment(environment)
        };

        config.override_from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::ConfigurationError(format!("failed to parse config: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigurationError(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn config_path(environment: Environment) -> Result<PathBuf> {
        let base = env::var("MESHTALK_CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
        let filename = match environment {
            Environment::Production => "production.toml",
            Environment::Staging => "staging.toml",
            Environment::Testing => "testing.toml",
            Environment::Development => "development.toml",
        };
        Ok(PathBuf::from(base).join(filename))
    }

    fn override_from_env(&mut self) -> Result<()> {
        if let Ok(val) = env::var("MESHTALK_MAX_CONNECTIONS") {
            self.transport.max_connections = val
                .parse()
                .map_err(|_| Error::ConfigurationError("invalid max connections".into()))?;
        }
        if let Ok(val) = env::var("MESHTALK_DATABASE_PATH") {
            self.database.path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MESHTALK_RATE_LIMIT_CEILING") {
            self.security.rate_limit_ceiling = val
                .parse()
                .map_err(|_| Error::ConfigurationError("invalid rate limit ceiling".into()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.transport.max_connections == 0 {
            return Err(Error::ConfigurationError("max_connections must be > 0".into()));
        }
        if self.transport.max_frame_size < 64 {
            return Err(Error::ConfigurationError(
                "max_frame_size must be >= 64 bytes".into(),
            ));
        }
        if self.security.rate_limit_ceiling == 0 {
            return Err(Error::ConfigurationError(
                "rate_limit_ceiling must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn default_for_environment(environment: Environment) -> Self {
        let base = Self {
            app: AppConfig {
                name: "meshtalk-core".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                environment,
                data_dir: PathBuf::from("./data"),
                log_level: "info".to_string(),
            },
            transport: TransportConfig {
                max_connections: 32,
                connection_timeout: Duration::from_secs(30),
                max_frame_size: 16 * 1024,
                enable_bluetooth: true,
            },
            database: DatabaseConfig {
                path: PathBuf::from("./data/meshtalk.sqlite"),
                enable_wal: true,
                checkpoint_interval: Duration::from_secs(300),
            },
            security: SecurityConfig {
                session_timeout: Duration::from_secs(3600),
                dedup_window: Duration::from_secs(300),
                rate_limit_window: Duration::from_secs(60),
                rate_limit_ceiling: 30,
            },
            monitoring: MonitoringConfig {
                enable_tracing: true,
                log_retention_days: 7,
            },
        };

        match environment {
            Environment::Development | Environment::Testing => Self {
                app: AppConfig {
                    log_level: "debug".to_string(),
                    ..base.app
                },
                ..base
            },
            Environment::Staging | Environment::Production => base,
        }
    }
}
