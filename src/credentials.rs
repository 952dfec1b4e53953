//! The single admin credential pair.
//!
//! The file is read on every login attempt, so edits take effect without a
//! restart. It holds `{"username": ..., "password": ...}`, or
//! `password_sha256` (lowercase hex) in place of the plaintext password.

use std::path::PathBuf;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credentials file '{0}' is missing or unreadable")]
    Missing(String),
    #[error("credentials file '{0}' is malformed: {1}")]
    Corrupt(String, String),
}

/// Decides whether a submitted username/password pair is the admin.
pub trait CredentialProvider: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Result<bool, CredentialsError>;
}

#[derive(Debug, Deserialize)]
struct StoredCredentials {
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    password_sha256: Option<String>,
}

pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<StoredCredentials, CredentialsError> {
        let shown = self.path.display().to_string();
        let bytes = std::fs::read(&self.path).map_err(|_| CredentialsError::Missing(shown.clone()))?;
        let creds: StoredCredentials =
            serde_json::from_slice(&bytes).map_err(|e| CredentialsError::Corrupt(shown.clone(), e.to_string()))?;
        if creds.password.is_none() && creds.password_sha256.is_none() {
            return Err(CredentialsError::Corrupt(shown, "no password or password_sha256".into()));
        }
        Ok(creds)
    }
}

impl CredentialProvider for FileCredentials {
    fn verify(&self, username: &str, password: &str) -> Result<bool, CredentialsError> {
        let creds = self.read()?;
        let user_ok = constant_time_eq(creds.username.as_bytes(), username.as_bytes());
        let pass_ok = match (&creds.password_sha256, &creds.password) {
            (Some(digest), _) => {
                let submitted = hex::encode(Sha256::digest(password.as_bytes()));
                constant_time_eq(digest.trim().to_ascii_lowercase().as_bytes(), submitted.as_bytes())
            }
            (None, Some(plain)) => constant_time_eq(plain.as_bytes(), password.as_bytes()),
            (None, None) => false,
        };
        Ok(user_ok & pass_ok)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
