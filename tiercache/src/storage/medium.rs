use crate::core::error::StorageError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Persistent, quota-limited key/value medium backing the durable tier
///
/// Values are opaque strings. `write` fails with
/// [`StorageError::QuotaExceeded`] when the medium has no room left.
#[async_trait]
pub trait StorageMedium: Send + Sync {
    /// Check that the medium is usable at all
    async fn probe(&self) -> Result<(), StorageError>;

    /// Read the value stored under `key`
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
struct MemoryMediumState {
    values: HashMap<String, String>,
    used_bytes: u64,
}

/// In-process medium with a byte quota
///
/// Clones share the same contents, which lets tests simulate a process
/// restart by opening a second cache over a clone.
#[derive(Clone)]
pub struct MemoryMedium {
    state: Arc<Mutex<MemoryMediumState>>,
    quota_bytes: u64,
    available: bool,
}

impl MemoryMedium {
    pub fn new(quota_bytes: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryMediumState::default())),
            quota_bytes,
            available: true,
        }
    }

    /// A medium whose probe always fails
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0)
        }
    }

    /// Bytes currently stored (keys and values)
    pub fn used_bytes(&self) -> u64 {
        self.state.lock().used_bytes
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Raw keys currently stored
    pub fn raw_keys(&self) -> Vec<String> {
        self.state.lock().values.keys().cloned().collect()
    }

    /// Raw value stored under `key`, bypassing the async interface
    pub fn raw_value(&self, key: &str) -> Option<String> {
        self.state.lock().values.get(key).cloned()
    }

    /// Overwrite a raw value without quota accounting, for corruption tests
    pub fn inject_raw(&self, key: &str, value: &str) {
        let mut state = self.state.lock();
        let added = entry_size(key, value);
        if let Some(old) = state.values.insert(key.to_string(), value.to_string()) {
            state.used_bytes = state.used_bytes.saturating_sub(entry_size(key, &old));
        }
        state.used_bytes += added;
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available {
            Ok(())
        } else {
            Err(StorageError::Unavailable("memory medium disabled".to_string()))
        }
    }
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    async fn probe(&self) -> Result<(), StorageError> {
        self.ensure_available()
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_available()?;
        Ok(self.state.lock().values.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut state = self.state.lock();

        let previous = state
            .values
            .get(key)
            .map(|old| entry_size(key, old))
            .unwrap_or(0);
        let needed = entry_size(key, value);
        let available = self
            .quota_bytes
            .saturating_sub(state.used_bytes.saturating_sub(previous));

        if needed > available {
            return Err(StorageError::QuotaExceeded { needed, available });
        }

        state.values.insert(key.to_string(), value.to_string());
        state.used_bytes = state.used_bytes - previous + needed;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        if let Some(old) = state.values.remove(key) {
            state.used_bytes = state.used_bytes.saturating_sub(entry_size(key, &old));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_write_delete() {
        let medium = MemoryMedium::new(1024);
        medium.write("a", "hello").await.unwrap();
        assert_eq!(medium.read("a").await.unwrap().as_deref(), Some("hello"));
        assert_eq!(medium.used_bytes(), 6);

        medium.delete("a").await.unwrap();
        assert!(medium.read("a").await.unwrap().is_none());
        assert_eq!(medium.used_bytes(), 0);

        medium.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let medium = MemoryMedium::new(10);
        medium.write("a", "12345").await.unwrap();

        let err = medium.write("b", "123456").await.unwrap_err();
        assert!(err.is_quota_exceeded());

        // Replacing a value only needs room for the difference
        medium.write("a", "123456789").await.unwrap();
        assert_eq!(medium.used_bytes(), 10);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let medium = MemoryMedium::unavailable();
        assert!(matches!(
            medium.probe().await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(medium.write("a", "b").await.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_contents() {
        let medium = MemoryMedium::new(100);
        let restarted = medium.clone();
        medium.write("k", "v").await.unwrap();
        assert_eq!(restarted.read("k").await.unwrap().as_deref(), Some("v"));
    }
}
