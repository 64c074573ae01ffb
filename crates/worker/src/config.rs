use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// An environment variable that is missing or does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Read `name`, falling back to `default` when unset.
pub fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// Read a required variable.
pub fn env_required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL connection string (required).
    pub database_url: String,
    /// Pool size (default: `20`).
    pub db_max_connections: u32,
    /// Directory holding uploaded CSV files (default: `./uploads`).
    pub upload_dir: PathBuf,
    /// How long an idle executor waits before polling the queue again
    /// (default: `500` ms).
    pub poll_interval: Duration,
}

impl WorkerConfig {
    /// | Env Var              | Default     |
    /// |----------------------|-------------|
    /// | `DATABASE_URL`       | (required)  |
    /// | `DB_MAX_CONNECTIONS` | `20`        |
    /// | `UPLOAD_DIR`         | `./uploads` |
    /// | `POLL_INTERVAL_MS`   | `500`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 20)?,
            upload_dir: env_or("UPLOAD_DIR", PathBuf::from("./uploads"))?,
            poll_interval: Duration::from_millis(env_or("POLL_INTERVAL_MS", 500)?),
        })
    }
}
