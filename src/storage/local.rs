use std::path::{Component, Path, PathBuf};

use crate::error::{BadspotError, Result};
use crate::storage::BlobStore;

/// A directory standing in for a bucket: objects live at `<root>/<bucket>/<object>`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    bucket: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, bucket: &str) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.to_string(),
        }
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn object_path(&self, object: &str) -> Result<PathBuf> {
        let relative = Path::new(object);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if object.is_empty() || escapes {
            return Err(BadspotError::Storage(format!(
                "Invalid object name '{}'",
                object
            )));
        }
        Ok(self.bucket_dir().join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn fetch(&self, object: &str) -> Result<Vec<u8>> {
        let path = self.object_path(object)?;
        if !path.is_file() {
            return Err(BadspotError::ObjectNotFound {
                bucket: self.bucket.clone(),
                object: object.to_string(),
            });
        }
        tracing::debug!(path = %path.display(), "reading local object");
        Ok(std::fs::read(path)?)
    }

    fn put(&self, object: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        let path = self.object_path(object)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote local object");
        Ok(())
    }

    fn check_bucket(&self) -> Result<()> {
        if self.bucket_dir().is_dir() {
            Ok(())
        } else {
            Err(BadspotError::Storage(format!(
                "Bucket directory '{}' does not exist",
                self.bucket_dir().display()
            )))
        }
    }
}
