//! Filesystem-backed object store.
//!
//! Objects live at `<root>/<key>`; tags live in a `.tags/<key>.json` mirror
//! so that listing stays cheap and tag reads never touch object contents.
//! Writes go to a temporary sibling and are renamed into place, so readers
//! never observe a half-written checkpoint.

use super::{normalize_key, ObjectStore, ObjectTags};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const TAGS_DIR: &str = ".tags";

/// Object store rooted at a local directory.
pub struct LocalStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base_url: None,
        }
    }

    /// Sign URLs against an HTTP base that serves the store root.
    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = Some(base.into());
        self
    }

    fn object_path(&self, key: &str) -> StoreResult<(String, PathBuf)> {
        let key = normalize_key(key).ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        let path = self.root.join(&key);
        Ok((key, path))
    }

    fn tags_path(&self, key: &str) -> PathBuf {
        self.root.join(TAGS_DIR).join(format!("{key}.json"))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StoreError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

/// Write bytes to a temporary sibling, then rename over the destination.
async fn write_atomic(key: &str, path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(key, e))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().gen();
    let tmp = path.with_file_name(format!(".{file_name}.{suffix:08x}.tmp"));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| io_error(key, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(key, e));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.trim_start_matches('/').to_string();
        let label = prefix.clone();

        let keys = tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            for entry in WalkDir::new(&root)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| {
                    e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
                })
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }
            keys.sort();
            keys
        })
        .await
        .map_err(|e| StoreError::Io {
            key: label,
            source: std::io::Error::other(e),
        })?;

        Ok(keys)
    }

    async fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        let (key, path) = self.object_path(key)?;
        tokio::fs::read(&path).await.map_err(|e| io_error(&key, e))
    }

    async fn size(&self, key: &str) -> StoreResult<Option<u64>> {
        let (key, path) = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&key, e)),
        }
    }

    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        mut tags: ObjectTags,
    ) -> StoreResult<()> {
        let (key, path) = self.object_path(key)?;
        tags.insert("contentType".to_string(), content_type.to_string());

        let tag_bytes = serde_json::to_vec_pretty(&tags).map_err(|e| StoreError::Serialization {
            key: key.clone(),
            message: e.to_string(),
        })?;

        write_atomic(&key, &path, &bytes).await?;
        write_atomic(&key, &self.tags_path(&key), &tag_bytes).await?;

        tracing::debug!("Wrote {} bytes to {}", bytes.len(), key);
        Ok(())
    }

    async fn tags(&self, key: &str) -> StoreResult<ObjectTags> {
        let (key, path) = self.object_path(key)?;
        match tokio::fs::read(self.tags_path(&key)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
                key,
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Objects copied into the root by hand have no tags
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    Ok(ObjectTags::new())
                } else {
                    Err(StoreError::NotFound(key))
                }
            }
            Err(e) => Err(io_error(&key, e)),
        }
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        let (key, path) = self.object_path(key)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::NotFound(key));
        }

        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let url = match &self.public_base_url {
            Some(base) => format!("{}/{key}?expires={expires}", base.trim_end_matches('/')),
            None => {
                let absolute = std::path::absolute(&path).map_err(|e| io_error(&key, e))?;
                format!("file://{}?expires={expires}", absolute.display())
            }
        };
        Ok(url)
    }
}
