use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MACHINE_ID: u16 = 42;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 12 * 1024 * 1024;
const DEFAULT_MAX_REMOTE_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub secret: String,
    pub port: u16,
    pub public_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub worker_id: String,
    pub flake_machine_id: u16,
    pub max_upload_bytes: u64,
    pub max_remote_bytes: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests don't
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("CDN_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("CDN_SECRET"))?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            secret,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            public_dir: lookup("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
            temp_dir: lookup("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("temp")),
            cors_allowed_origins,
            worker_id: lookup("WORKER_ID").unwrap_or_else(|| std::process::id().to_string()),
            flake_machine_id: parse_or(&lookup, "FLAKE_MACHINE_ID", DEFAULT_MACHINE_ID)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_remote_bytes: parse_or(&lookup, "MAX_REMOTE_BYTES", DEFAULT_MAX_REMOTE_BYTES)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
