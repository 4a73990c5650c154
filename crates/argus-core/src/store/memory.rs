//! In-process object store.
//!
//! Useful when embedding the orchestrator in a process that already holds the
//! images, and as a fake in tests: it counts writes per key so overwrite
//! behavior can be asserted.

use super::{normalize_key, ObjectStore, ObjectTags};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    tags: ObjectTags,
    writes: usize,
}

/// Object store held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    base_url: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            base_url: "memory://".to_string(),
        }
    }

    /// Insert an object synchronously (test and bootstrap convenience).
    pub fn insert(&self, key: &str, bytes: Vec<u8>, content_type: &str) {
        let Some(key) = normalize_key(key) else {
            return;
        };
        let mut objects = self.lock();
        let writes = objects.get(&key).map(|o| o.writes).unwrap_or(0) + 1;
        objects.insert(
            key,
            StoredObject {
                bytes,
                tags: content_type_tags(ObjectTags::new(), content_type),
                writes,
            },
        );
    }

    /// Number of times `key` has been written, 0 if it never was.
    pub fn write_count(&self, key: &str) -> usize {
        self.lock().get(key).map(|o| o.writes).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        // Entries are replaced whole, so a poisoned map is still consistent
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(key: &str) -> StoreResult<String> {
        normalize_key(key).ok_or_else(|| StoreError::InvalidKey(key.to_string()))
    }
}

/// Record the content type as a tag, matching `LocalStore`.
fn content_type_tags(mut tags: ObjectTags, content_type: &str) -> ObjectTags {
    tags.insert("contentType".to_string(), content_type.to_string());
    tags
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = prefix.trim_start_matches('/');
        Ok(self
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        let key = Self::key(key)?;
        self.lock()
            .get(&key)
            .map(|o| o.bytes.clone())
            .ok_or(StoreError::NotFound(key))
    }

    async fn size(&self, key: &str) -> StoreResult<Option<u64>> {
        let key = Self::key(key)?;
        Ok(self.lock().get(&key).map(|o| o.bytes.len() as u64))
    }

    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        tags: ObjectTags,
    ) -> StoreResult<()> {
        let key = Self::key(key)?;
        let mut objects = self.lock();
        let writes = objects.get(&key).map(|o| o.writes).unwrap_or(0) + 1;
        objects.insert(
            key,
            StoredObject {
                bytes,
                tags: content_type_tags(tags, content_type),
                writes,
            },
        );
        Ok(())
    }

    async fn tags(&self, key: &str) -> StoreResult<ObjectTags> {
        let key = Self::key(key)?;
        self.lock()
            .get(&key)
            .map(|o| o.tags.clone())
            .ok_or(StoreError::NotFound(key))
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        let key = Self::key(key)?;
        if !self.lock().contains_key(&key) {
            return Err(StoreError::NotFound(key));
        }
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("{}{key}?expires={expires}", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_counts_overwrites() {
        let store = MemoryStore::new();
        store
            .write("r/a.json", b"1".to_vec(), "application/json", ObjectTags::new())
            .await
            .unwrap();
        store
            .write("r/a.json", b"2".to_vec(), "application/json", ObjectTags::new())
            .await
            .unwrap();

        assert_eq!(store.write_count("r/a.json"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.read("r/a.json").await.unwrap(), b"2");
        assert_eq!(store.size("r/a.json").await.unwrap(), Some(1));
        assert_eq!(store.size("r/b.json").await.unwrap(), None);
        let tags = store.tags("r/a.json").await.unwrap();
        assert_eq!(tags.get("contentType").map(String::as_str), Some("application/json"));
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryStore::new();
        store.insert("images/d/PTZ/a.jpg", vec![1], "image/jpeg");
        store.insert("images/d/FIXED/b.jpg", vec![2], "image/jpeg");
        store.insert("analysis_results/x.json", vec![3], "application/json");

        let keys = store.list("images/d/").await.unwrap();
        assert_eq!(keys, vec!["images/d/FIXED/b.jpg", "images/d/PTZ/a.jpg"]);
    }

    #[tokio::test]
    async fn test_signed_url_requires_object() {
        let store = MemoryStore::new();
        store.insert("images/a.jpg", vec![1], "image/jpeg");

        let url = store
            .signed_read_url("images/a.jpg", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(url.starts_with("memory://images/a.jpg?expires="));

        let err = store
            .signed_read_url("images/b.jpg", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
