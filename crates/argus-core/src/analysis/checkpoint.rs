//! Durable run checkpoints.
//!
//! One JSON document per run, always written to the same key, so repeated
//! flushes overwrite instead of accumulating history. Running totals are also
//! written as object tags, which lets `list_checkpoints` describe runs without
//! downloading any document.

use crate::error::{StoreError, StoreResult};
use crate::store::{ObjectStore, ObjectTags};
use crate::types::{ImageAnalysisResult, RunSummary};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Run-level identifiers recorded in every checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub date: String,
    pub camera_type: String,
}

impl RunMetadata {
    pub fn new(date: impl Into<String>, camera_type: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            camera_type: camera_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointMetadata {
    pub date: String,
    pub camera_type: String,
    pub total_images: usize,
    pub processed_images: usize,
}

/// The persisted form of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointDocument {
    pub id: String,
    /// RFC 3339 time of this flush
    pub timestamp: String,
    pub metadata: CheckpointMetadata,
    pub results: Vec<ImageAnalysisResult>,
    pub summary: RunSummary,
    pub is_partial: bool,
}

/// Tag-only view of a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointInfo {
    pub key: String,
    pub date: String,
    pub camera_type: String,
    pub total_images: usize,
    pub processed_images: usize,
    pub successful: usize,
    pub failed: usize,
    pub is_partial: bool,
}

impl CheckpointInfo {
    fn from_tags(key: String, tags: &ObjectTags) -> Self {
        let text = |name: &str| tags.get(name).cloned().unwrap_or_default();
        let number = |name: &str| {
            tags.get(name)
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0)
        };
        Self {
            date: text("date"),
            camera_type: text("cameraType"),
            total_images: number("totalImages"),
            processed_images: number("processedImages"),
            successful: number("successful"),
            failed: number("failed"),
            // Missing tag means the writer never finalized it
            is_partial: tags.get("isPartial").map(|v| v != "false").unwrap_or(true),
            key,
        }
    }
}

/// Build a unique, key-safe run id: `analysis_<date>_<camera>_<utc stamp>_<suffix>`.
pub fn new_run_id(metadata: &RunMetadata) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let suffix: u32 = rand::thread_rng().gen();
    sanitize(&format!(
        "analysis_{}_{}_{stamp}_{:06x}",
        metadata.date,
        metadata.camera_type,
        suffix & 0xFF_FFFF
    ))
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes every flush of one run to a single stable key.
///
/// Flushes are sequenced by the number of results in their snapshot. A flush
/// whose snapshot is older than the last one written is skipped, so a slow
/// detached flush can never overwrite newer state.
pub struct CheckpointWriter {
    store: Arc<dyn ObjectStore>,
    run_id: String,
    key: String,
    metadata: RunMetadata,
    total_images: usize,
    last_written: Mutex<Option<usize>>,
}

impl CheckpointWriter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: &str,
        run_id: impl Into<String>,
        metadata: RunMetadata,
        total_images: usize,
    ) -> Self {
        let run_id = run_id.into();
        let key = format!("{}/{run_id}.json", prefix.trim_matches('/'));
        Self {
            store,
            run_id,
            key,
            metadata,
            total_images,
            last_written: Mutex::new(None),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Object key every flush of this run writes to.
    pub fn path(&self) -> &str {
        &self.key
    }

    /// Whether any flush has reached the store.
    pub async fn has_written(&self) -> bool {
        self.last_written.lock().await.is_some()
    }

    /// Persist `results` as the run's current state.
    ///
    /// `seq` is the results count at snapshot time. Returns `Ok(false)` if the
    /// flush was stale and skipped.
    pub async fn flush(
        &self,
        seq: usize,
        results: &[ImageAnalysisResult],
        partial: bool,
    ) -> StoreResult<bool> {
        let mut last = self.last_written.lock().await;
        if last.is_some_and(|written| seq < written) {
            tracing::debug!("Skipping stale checkpoint flush ({seq} < {:?})", *last);
            return Ok(false);
        }

        let summary = RunSummary::from_results(results);
        let document = CheckpointDocument {
            id: self.run_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            metadata: CheckpointMetadata {
                date: self.metadata.date.clone(),
                camera_type: self.metadata.camera_type.clone(),
                total_images: self.total_images,
                processed_images: results.len(),
            },
            results: results.to_vec(),
            summary,
            is_partial: partial,
        };
        let bytes = serde_json::to_vec_pretty(&document).map_err(|e| StoreError::Serialization {
            key: self.key.clone(),
            message: e.to_string(),
        })?;

        let tags = ObjectTags::from([
            ("date".to_string(), self.metadata.date.clone()),
            ("cameraType".to_string(), self.metadata.camera_type.clone()),
            ("totalImages".to_string(), self.total_images.to_string()),
            ("processedImages".to_string(), results.len().to_string()),
            ("successful".to_string(), summary.successful.to_string()),
            ("failed".to_string(), summary.failed.to_string()),
            ("isPartial".to_string(), partial.to_string()),
        ]);

        self.store
            .write(&self.key, bytes, "application/json", tags)
            .await?;
        *last = Some(seq);

        tracing::debug!(
            "Checkpoint {} written ({}/{} images, partial={partial})",
            self.key,
            results.len(),
            self.total_images
        );
        Ok(true)
    }
}

/// Describe every checkpoint under `prefix` from its tags alone.
pub async fn list_checkpoints(
    store: &dyn ObjectStore,
    prefix: &str,
) -> StoreResult<Vec<CheckpointInfo>> {
    let mut infos = Vec::new();
    for key in store.list(prefix.trim_matches('/')).await? {
        if !key.ends_with(".json") {
            continue;
        }
        let tags = store.tags(&key).await?;
        infos.push(CheckpointInfo::from_tags(key, &tags));
    }
    Ok(infos)
}

/// Download and parse one checkpoint document.
pub async fn read_checkpoint(store: &dyn ObjectStore, key: &str) -> StoreResult<CheckpointDocument> {
    let bytes = store.read(key).await?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })
}
