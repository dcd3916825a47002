use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::memory::{InMemoryStore, StoreSnapshot};

/// A JSON file holding a [`StoreSnapshot`].
///
/// The CLI loads the whole ledger on start and writes it back after each
/// mutating command. Saves go to a temporary file in the same directory
/// which is then renamed over the target, so readers never see a torn file.
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store. A missing file yields an empty store.
    pub fn load(&self) -> StoreResult<InMemoryStore> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no snapshot on disk, starting empty");
            return Ok(InMemoryStore::new());
        }
        let raw = fs::read(&self.path)?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!(
            path = %self.path.display(),
            threads = snapshot.threads.len(),
            records = snapshot.records.len(),
            "loaded snapshot"
        );
        InMemoryStore::from_snapshot(snapshot)
    }

    /// Atomically replace the file with the store's current contents.
    pub fn save(&self, store: &InMemoryStore) -> StoreResult<()> {
        let snapshot = store.snapshot()?;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %self.path.display(), bytes = json.len(), "saved snapshot");
        Ok(())
    }
}
