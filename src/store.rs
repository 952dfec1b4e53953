use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Flat-file JSON store: one pretty-printed array per collection name.
#[derive(Clone)]
pub struct JsonStore {
    dir: Arc<PathBuf>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    /// Missing, unreadable or malformed files all load as an empty collection.
    pub fn load<T: DeserializeOwned>(&self, collection: &str) -> Vec<T> {
        let path = self.path_for(collection);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("could not read '{}': {e}; treating as empty", path.display());
                return Vec::new();
            }
        };
        match serde_json::from_slice::<Vec<T>>(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!("corrupt collection '{}': {e}; treating as empty", path.display());
                Vec::new()
            }
        }
    }

    /// Rewrites the whole collection. The new content goes to a sibling temp
    /// file first and is renamed over the target.
    pub fn save<T: Serialize>(&self, collection: &str, records: &[T]) -> Result<(), StoreError> {
        std::fs::create_dir_all(&*self.dir)?;
        let path = self.path_for(collection);
        let body = serde_json::to_vec_pretty(records)?;
        let tmp = self
            .dir
            .join(format!(".{collection}.{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = std::fs::write(&tmp, &body).and_then(|_| std::fs::rename(&tmp, &path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Serializes read-modify-write cycles on one collection.
    pub async fn lock(&self, collection: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(collection.to_string())
            .or_default()
            .clone();
        mutex.lock_owned().await
    }
}
