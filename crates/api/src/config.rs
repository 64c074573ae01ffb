use std::path::PathBuf;

use axum::http::HeaderValue;
use automl_worker::config::{env_or, env_required, ConfigError};

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory the upload collaborator writes CSV files to.
    pub upload_dir: PathBuf,
    /// Executor loops to run inside the API process (default: `0`).
    pub embedded_workers: usize,
    pub database_url: String,
    pub db_max_connections: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                         |
    /// |------------------------|-------------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                       |
    /// | `PORT`                 | `8000`                                          |
    /// | `CORS_ORIGINS`         | `http://localhost:5173,http://127.0.0.1:5173`   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                            |
    /// | `UPLOAD_DIR`           | `./uploads`                                     |
    /// | `EMBEDDED_WORKERS`     | `0`                                             |
    /// | `DATABASE_URL`         | (required)                                      |
    /// | `DB_MAX_CONNECTIONS`   | `20`                                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_raw: String = env_or(
            "CORS_ORIGINS",
            "http://localhost:5173,http://127.0.0.1:5173".to_string(),
        )?;

        Ok(Self {
            host: env_or("HOST", "0.0.0.0".to_string())?,
            port: env_or("PORT", 8000)?,
            cors_origins: parse_origins(&cors_raw)?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            upload_dir: env_or("UPLOAD_DIR", PathBuf::from("./uploads"))?,
            embedded_workers: env_or("EMBEDDED_WORKERS", 0)?,
            database_url: env_required("DATABASE_URL")?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 20)?,
        })
    }
}

/// Split a comma-separated origin list, rejecting values that are not valid
/// header values.
pub fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| ConfigError::Invalid {
                name: "CORS_ORIGINS",
                value: origin.to_string(),
            })
        })
        .collect()
}
