//! Object store abstraction.
//!
//! The orchestrator only needs a path-addressable blob store: list keys under
//! a prefix, read and write objects, read the small string tags written
//! alongside an object, and hand out time-limited read URLs. Keys always use
//! `/` as separator regardless of the backing implementation.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// String key/value metadata stored next to an object.
pub type ObjectTags = BTreeMap<String, String>;

/// Interface to a durable, path-addressable blob store.
///
/// Uses `async_trait` so stores can be shared as `Arc<dyn ObjectStore>`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store name for logging (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// List all object keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Read the full contents of an object.
    async fn read(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Size in bytes of an object, `None` if it does not exist.
    async fn size(&self, key: &str) -> StoreResult<Option<u64>>;

    /// Create or overwrite an object together with its tags.
    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        tags: ObjectTags,
    ) -> StoreResult<()>;

    /// Read only the tags of an object, without downloading its contents.
    async fn tags(&self, key: &str) -> StoreResult<ObjectTags>;

    /// Generate a URL granting read access to `key` for `ttl`.
    async fn signed_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String>;
}

/// Normalize a key: strip leading/trailing slashes, reject empty and `..` segments.
pub(crate) fn normalize_key(key: &str) -> Option<String> {
    let trimmed = key.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return None;
    }
    Some(trimmed.to_string())
}
