//! File-backed storage medium
//!
//! One file per key inside a per-origin directory. File names are the
//! SHA-256 of the key so arbitrary key characters are safe on disk. The
//! total size of stored values is capped by a byte quota.

use super::medium::StorageMedium;
use crate::core::error::StorageError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENTRY_EXTENSION: &str = "entry";
const PROBE_FILE: &str = ".probe";

/// Durable medium storing each key in its own file
pub struct FileMedium {
    directory: PathBuf,
    quota_bytes: u64,
    used_bytes: Mutex<u64>,
}

impl FileMedium {
    /// Create a medium rooted at `directory`
    ///
    /// Nothing touches the filesystem until [`StorageMedium::probe`].
    pub fn new(directory: impl Into<PathBuf>, quota_bytes: u64) -> Self {
        Self {
            directory: directory.into(),
            quota_bytes,
            used_bytes: Mutex::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Bytes currently accounted against the quota
    pub fn used_bytes(&self) -> u64 {
        *self.used_bytes.lock()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.directory
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    async fn file_size(path: &Path) -> Result<u64, StorageError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Sum the sizes of all entry files already on disk
    async fn scan_usage(&self) -> Result<u64, StorageError> {
        let mut total = 0u64;
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                total += entry.metadata().await?.len();
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl StorageMedium for FileMedium {
    async fn probe(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{:?}: {}", self.directory, e)))?;

        let probe = self.directory.join(PROBE_FILE);
        tokio::fs::write(&probe, b"ok")
            .await
            .map_err(|e| StorageError::Unavailable(format!("{:?} not writable: {}", probe, e)))?;
        tokio::fs::remove_file(&probe).await?;

        let used = self.scan_usage().await?;
        *self.used_bytes.lock() = used;

        info!(
            "File medium ready at {:?} ({} of {} bytes used)",
            self.directory, used, self.quota_bytes
        );
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let previous = Self::file_size(&path).await?;
        let needed = value.len() as u64;

        {
            let used = self.used_bytes.lock();
            let available = self
                .quota_bytes
                .saturating_sub(used.saturating_sub(previous));
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }

        // Write-then-rename so a crash never leaves a half-written entry
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;

        let mut used = self.used_bytes.lock();
        *used = used.saturating_sub(previous) + needed;
        debug!("File medium WRITE: {} ({} bytes)", key, needed);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let size = Self::file_size(&path).await?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                let mut used = self.used_bytes.lock();
                *used = used.saturating_sub(size);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
