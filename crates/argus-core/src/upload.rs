//! Ingest of a local date folder into the object store.
//!
//! A capture folder such as `2025-11-26_chittoor/` holding `ANALYTICS/`,
//! `FIXED/` and `PTZ/` subfolders is mirrored to
//! `<image_prefix>/<folder name>/<relative path>`, the layout
//! [`TaskDiscovery`](crate::discovery::TaskDiscovery) reads back.

use crate::discovery::is_image;
use crate::error::{StoreError, StoreResult};
use crate::store::{ObjectStore, ObjectTags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// One local image and the key it is uploaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub path: PathBuf,
    pub key: String,
    pub size: u64,
}

/// What happened to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// An object of the same size already exists under the key
    Skipped,
}

/// Totals for an upload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub total: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl UploadSummary {
    pub fn record<E>(&mut self, outcome: &Result<UploadOutcome, E>) {
        self.total += 1;
        match outcome {
            Ok(UploadOutcome::Uploaded) => self.uploaded += 1,
            Ok(UploadOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Copies local capture folders into an object store.
pub struct ImageUploader {
    store: Arc<dyn ObjectStore>,
    image_prefix: String,
}

impl ImageUploader {
    pub fn new(store: Arc<dyn ObjectStore>, image_prefix: &str) -> Self {
        Self {
            store,
            image_prefix: image_prefix.trim_matches('/').to_string(),
        }
    }

    /// Every image under `dir`, keyed under `date` (the folder name when `None`).
    ///
    /// Hidden entries are skipped. Items are sorted by key.
    pub fn plan(&self, dir: &Path, date: Option<&str>) -> Vec<UploadItem> {
        let folder = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let date = date.unwrap_or(&folder).trim_matches('/');

        let mut items = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !is_image(&rel) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            items.push(UploadItem {
                path: entry.path().to_path_buf(),
                key: format!("{}/{date}/{rel}", self.image_prefix),
                size: meta.len(),
            });
        }

        items.sort_by(|a, b| a.key.cmp(&b.key));
        items
    }

    /// Upload one item unless an object of the same size is already there.
    pub async fn upload(&self, item: &UploadItem) -> StoreResult<UploadOutcome> {
        if self.store.size(&item.key).await? == Some(item.size) {
            tracing::debug!("Skipping {} (already uploaded)", item.key);
            return Ok(UploadOutcome::Skipped);
        }

        let bytes = tokio::fs::read(&item.path)
            .await
            .map_err(|source| StoreError::Io {
                key: item.key.clone(),
                source,
            })?;
        self.store
            .write(&item.key, bytes, content_type(&item.key), ObjectTags::new())
            .await?;
        Ok(UploadOutcome::Uploaded)
    }
}

/// MIME type from the key's extension.
fn content_type(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
