//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `greenhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

const PURGE_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Control loop cadence.
    pub control: ControlConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    /// Upper bound of pooled connections.
    pub max_connections: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Control loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Milliseconds between two evaluation ticks.
    pub tick_ms: u64,
    /// Seconds between two reloads from the database. `0` disables reloading.
    pub reload_secs: u64,
    /// Hours of sensor readings to keep. `0` keeps everything.
    pub retention_hours: u32,
}

impl Config {
    /// Load configuration from `greenhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("greenhub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GREENHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("GREENHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("GREENHUB_TICK_MS")
            && let Ok(tick_ms) = val.parse()
        {
            self.control.tick_ms = tick_ms;
        }
        if let Ok(val) = std::env::var("GREENHUB_RELOAD_SECS")
            && let Ok(reload_secs) = val.parse()
        {
            self.control.reload_secs = reload_secs;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.control.tick_ms == 0 {
            return Err(ConfigError::Validation(
                "tick_ms must be non-zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.control.tick_ms)
    }

    /// Period of the database reload, if enabled.
    #[must_use]
    pub fn reload_interval(&self) -> Option<Duration> {
        match self.control.reload_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Period of the sensor-reading purge, if readings expire at all.
    #[must_use]
    pub fn purge_interval(&self) -> Option<Duration> {
        self.retention().map(|_| PURGE_PERIOD)
    }

    /// How long sensor readings are kept, if they are purged at all.
    #[must_use]
    pub fn retention(&self) -> Option<chrono::Duration> {
        match self.control.retention_hours {
            0 => None,
            hours => Some(chrono::Duration::hours(i64::from(hours))),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:greenhub.db?mode=rwc".to_string(),
            max_connections: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "greenhubd=info,greenhub=info".to_string(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            reload_secs: 60,
            retention_hours: 24 * 7,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
