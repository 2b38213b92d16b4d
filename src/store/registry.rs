//! File Registry
//!
//! Maps logical names to stored objects. The registry is the single source
//! of truth for existence, size and content location, and it exclusively
//! owns every object it holds.
//!
//! Entries are published as `Arc<StoredObject>` and swapped whole on write, so
//! a reader racing a writer sees either the old or the new object, never a
//! mix. There is no per-key locking; writes are last-writer-wins.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use tokio::sync::RwLock;

use super::types::{Content, StoreError, StoredObject};

// ============================================================================
// Registry
// ============================================================================

/// Shared handle to the in-memory file registry
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// Published objects indexed by key
    objects: RwLock<HashMap<String, Arc<StoredObject>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a key is present
    pub async fn exists(&self, key: &str) -> bool {
        self.inner.objects.read().await.contains_key(key)
    }

    /// Get the published object for a key
    pub async fn get(&self, key: &str) -> Option<Arc<StoredObject>> {
        self.inner.objects.read().await.get(key).cloned()
    }

    /// Recorded size of a key
    pub async fn size(&self, key: &str) -> Result<u64, StoreError> {
        self.get(key)
            .await
            .map(|object| object.size)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Store content under a key, replacing any previous entry in full.
    ///
    /// For buffer content the buffer length is authoritative; `declared_size`
    /// only matters for disk-backed content.
    pub async fn write(
        &self,
        key: &str,
        content: impl Into<Content>,
        declared_size: Option<u64>,
    ) -> Arc<StoredObject> {
        let object = Arc::new(StoredObject::new(key, content.into(), declared_size));

        let previous = {
            let mut objects = self.inner.objects.write().await;
            objects.insert(key.to_string(), object.clone())
        };

        tracing::debug!(
            key = %key,
            size = object.size,
            disk = object.content.path().is_some(),
            "File saved"
        );

        // A replaced disk-backed object still owns its file
        if let Some(previous) = previous {
            if let Some(old_path) = previous.content.path() {
                if object.content.path() != Some(old_path) {
                    if let Err(e) = tokio::fs::remove_file(old_path).await {
                        tracing::warn!(
                            key = %key,
                            path = %old_path.display(),
                            error = %e,
                            "Failed to delete replaced file"
                        );
                    }
                }
            }
        }

        object
    }

    /// Read the bytes stored under a key.
    ///
    /// Disk-backed objects are loaded from their path on every call.
    pub async fn read(&self, key: &str) -> Result<Bytes, StoreError> {
        let object = self
            .get(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        match &object.content {
            Content::Memory(bytes) => Ok(bytes.clone()),
            Content::Disk(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|source| StoreError::Io {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Remove a key. The backing file of a disk-backed object is deleted first;
    /// if that fails the entry stays in place.
    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let object = self
            .get(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if let Some(path) = object.content.path() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                // Already gone, e.g. deleted by a racing replacement
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(key = %key, path = %path.display(), "Backing file already removed");
                }
                Err(source) => {
                    return Err(StoreError::Io {
                        key: key.to_string(),
                        source,
                    })
                }
            }
        }

        {
            let mut objects = self.inner.objects.write().await;
            // Leave a concurrent replacement alone
            if objects.get(key).is_some_and(|current| Arc::ptr_eq(current, &object)) {
                objects.remove(key);
            }
        }

        tracing::debug!(key = %key, age_ms = object.age().as_millis() as u64, "File removed");
        Ok(())
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.inner.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.objects.read().await.is_empty()
    }

    /// All keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

// ============================================================================
// Tests
// ============================================================================
