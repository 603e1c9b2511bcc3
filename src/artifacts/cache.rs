use crate::error::{BadspotError, Result};
use crate::storage::BlobStore;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Session-scoped copy of downloaded artifact bytes, kept in a temporary directory
/// that is removed when the cache is dropped.
pub struct ArtifactCache {
    temp_dir: TempDir,
    cached_objects: HashMap<String, PathBuf>,
}

impl ArtifactCache {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new().map_err(|e| {
            BadspotError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to create artifact cache directory: {}", e),
            ))
        })?;

        Ok(Self {
            temp_dir,
            cached_objects: HashMap::new(),
        })
    }

    pub fn temp_dir_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Return the object's bytes, downloading them on first use
    pub fn get_or_fetch(&mut self, store: &dyn BlobStore, object: &str) -> Result<Vec<u8>> {
        if let Some(path) = self.cached_objects.get(object) {
            tracing::debug!(object, "artifact cache hit");
            return Ok(std::fs::read(path)?);
        }

        let bytes = store.fetch(object)?;

        // Flatten the object path so every entry sits directly in the cache directory
        let dest_path = self.temp_dir.path().join(object.replace('/', "__"));
        let mut dest_file = File::create(&dest_path)?;
        let mut writer = BufWriter::new(&mut dest_file);
        writer.write_all(&bytes)?;
        writer.flush()?;

        self.cached_objects.insert(object.to_string(), dest_path);

        Ok(bytes)
    }

    pub fn is_cached(&self, object: &str) -> bool {
        self.cached_objects.contains_key(object)
    }

    pub fn list_cached_objects(&self) -> Vec<&String> {
        self.cached_objects.keys().collect()
    }

    /// Forget everything, e.g. after new credentials point at a different bucket
    pub fn invalidate(&mut self) -> Result<()> {
        for path in self.cached_objects.values() {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        self.cached_objects.clear();
        Ok(())
    }
}

impl Drop for ArtifactCache {
    fn drop(&mut self) {
        if let Err(e) = self.invalidate() {
            tracing::warn!("Failed to clean up cached artifacts: {}", e);
        }
    }
}
