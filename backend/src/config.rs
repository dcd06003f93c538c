//! Runtime configuration, read from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ADMIN_KEY: &str = "change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must not be zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub storage_root: PathBuf,
    pub admin_key: String,
    /// Overrides the request host when building verification URLs.
    pub public_base_url: Option<String>,
    pub retention: Duration,
    pub sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("database.db"),
            storage_root: PathBuf::from("static"),
            admin_key: DEFAULT_ADMIN_KEY.to_string(),
            public_base_url: None,
            retention: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Builds the configuration from `CERT_*` and `ADMIN_SECRET_KEY` variables,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            host: lookup("CERT_HOST").unwrap_or(defaults.host),
            port: parse_number(&lookup, "CERT_PORT")?.unwrap_or(defaults.port),
            database_path: lookup("CERT_DATABASE")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            storage_root: lookup("CERT_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            admin_key: lookup("ADMIN_SECRET_KEY").unwrap_or(defaults.admin_key),
            public_base_url: lookup("CERT_PUBLIC_BASE_URL")
                .filter(|url| !url.trim().is_empty())
                .map(|url| normalize_base_url(&url)),
            retention: parse_secs(&lookup, "CERT_RETENTION_SECS")?.unwrap_or(defaults.retention),
            sweep_interval: parse_secs(&lookup, "CERT_SWEEP_INTERVAL_SECS")?
                .unwrap_or(defaults.sweep_interval),
        };
        Ok(config)
    }

    pub fn uses_default_admin_key(&self) -> bool {
        self.admin_key == DEFAULT_ADMIN_KEY
    }
}

/// Base URLs always end with a single `/` so `verify/<id>` can be appended.
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}

fn parse_number<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

fn parse_secs<F>(lookup: &F, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_number::<F, u64>(lookup, name)? {
        Some(0) => Err(ConfigError::Zero { name }),
        Some(secs) => Ok(Some(Duration::from_secs(secs))),
        None => Ok(None),
    }
}
