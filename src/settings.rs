use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("{0} must be at least 32 characters long")]
    WeakSecret(&'static str),
    #[error("invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),
}

/// Runtime configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub credentials_file: PathBuf,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>, // empty = any origin
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        fn var_or(name: &str, default: &str) -> String {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        }
        fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, SettingsError> {
            match std::env::var(name) {
                Ok(v) => v.trim().parse().map_err(|_| SettingsError::Invalid(name, v)),
                Err(_) => Ok(default),
            }
        }

        let session_secret = std::env::var("SESSION_SECRET").map_err(|_| SettingsError::Missing("SESSION_SECRET"))?;
        if session_secret.len() < 32 {
            return Err(SettingsError::WeakSecret("SESSION_SECRET"));
        }
        let session_ttl_hours: i64 = parsed("SESSION_TTL_HOURS", 24)?;
        if session_ttl_hours <= 0 {
            return Err(SettingsError::Invalid("SESSION_TTL_HOURS", session_ttl_hours.to_string()));
        }

        Ok(Self {
            bind_addr: var_or("BIND_ADDR", "127.0.0.1"),
            port: parsed("PORT", 5000)?,
            data_dir: PathBuf::from(var_or("DATA_DIR", "data")),
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "static/uploads")),
            credentials_file: PathBuf::from(var_or("CREDENTIALS_FILE", "credentials.json")),
            session_secret,
            session_ttl_hours,
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            cors_origins: var_or("CORS_ORIGINS", "")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
