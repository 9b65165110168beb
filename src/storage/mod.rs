//! Local key-value persistence. Each record is one JSON file under the data
//! directory and is rewritten whole on every mutation.

mod locations;
mod notified;

pub use locations::LocationStore;
pub use notified::NotifiedLedger;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON file store, one file per record key
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Load a record, falling back to the default when it is missing or
    /// malformed. Never fails.
    pub async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.path(key);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key = %key, "Record does not exist, starting fresh");
                return T::default();
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read record, using defaults");
                return T::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding malformed record");
                T::default()
            }
        }
    }

    /// Rewrite a record
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(value)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path(key), content).await?;

        tracing::debug!(key = %key, "Saved record");
        Ok(())
    }
}
