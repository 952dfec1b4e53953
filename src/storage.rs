use async_trait::async_trait;
use log::{info, warn};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::Id;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

/// Where attached files live. Names handed in are already sanitized.
#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), UploadError>;
    async fn load(&self, name: &str) -> Result<(Vec<u8>, String), UploadError>;
    /// Best effort: a missing file is not an error.
    async fn delete(&self, name: &str) -> Result<(), UploadError>;
}

// ---------------- Local directory implementation ----------------
pub struct FsUploadStore {
    root: PathBuf,
}

impl FsUploadStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!("upload directory ready at '{}'", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, UploadError> {
        // names come out of sanitize_filename; refuse anything that would not
        if name.is_empty() || sanitize_filename(name) != name {
            return Err(UploadError::NotFound);
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl UploadStore for FsUploadStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), UploadError> {
        let path = self.path_for(name).map_err(|_| UploadError::Other(format!("invalid name '{name}'")))?;
        std::fs::write(&path, bytes).map_err(|e| UploadError::Other(format!("{}: {e}", path.display())))
    }

    async fn load(&self, name: &str) -> Result<(Vec<u8>, String), UploadError> {
        let path = self.path_for(name)?;
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(UploadError::NotFound),
            Err(e) => return Err(UploadError::Other(e.to_string())),
        };
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        Ok((bytes, mime))
    }

    async fn delete(&self, name: &str) -> Result<(), UploadError> {
        let Ok(path) = self.path_for(name) else { return Ok(()) };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UploadError::Other(format!("{}: {e}", path.display()))),
        }
    }
}

/// Deletes a stored file, logging instead of failing.
pub async fn discard(store: &dyn UploadStore, name: &str) {
    if let Err(e) = store.delete(name).await {
        warn!("could not delete upload '{name}': {e}");
    }
}

/// Reduces a client-supplied filename to `[A-Za-z0-9._-]`, never a path.
pub fn sanitize_filename(raw: &str) -> String {
    // only the last path component counts
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => out.push(c),
            c if c.is_whitespace() => out.push('_'),
            _ => {}
        }
    }
    let trimmed = out.trim_matches(|c: char| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// On-disk name for an upload owned by record `id`.
pub fn stored_name(id: Id, raw: &str) -> String {
    format!("{id}_{}", sanitize_filename(raw))
}
