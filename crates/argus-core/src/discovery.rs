//! Task discovery over the object store.
//!
//! Images are laid out as `<prefix>/<date>[_location]/<CAMERA_TYPE>/<file>`.
//! Discovery lists one date (optionally one camera type) and turns every
//! image key into an [`ImageTask`].

use crate::error::StoreResult;
use crate::store::ObjectStore;
use crate::types::ImageTask;
use std::collections::BTreeSet;
use std::sync::Arc;

/// File extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Finds image tasks under the image prefix of a store.
pub struct TaskDiscovery {
    store: Arc<dyn ObjectStore>,
    image_prefix: String,
}

impl TaskDiscovery {
    pub fn new(store: Arc<dyn ObjectStore>, image_prefix: &str) -> Self {
        Self {
            store,
            image_prefix: image_prefix.trim_matches('/').to_string(),
        }
    }

    /// All images for `date`, restricted to `camera_type` when given.
    ///
    /// Camera types are matched case-insensitively. Tasks are sorted by key.
    pub async fn discover(&self, date: &str, camera_type: Option<&str>) -> StoreResult<Vec<ImageTask>> {
        let prefix = format!("{}/{}/", self.image_prefix, date.trim_matches('/'));
        let camera = camera_type.map(str::to_uppercase);

        let mut tasks: Vec<ImageTask> = self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|key| is_image(key))
            .filter_map(|key| self.parse_key(&key))
            .filter(|task| camera.as_ref().map_or(true, |c| &task.camera_type == c))
            .collect();
        tasks.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!("Discovered {} images under {prefix}", tasks.len());
        Ok(tasks)
    }

    /// Date folders that contain at least one image, sorted.
    pub async fn dates(&self) -> StoreResult<Vec<String>> {
        let keys = self.store.list(&format!("{}/", self.image_prefix)).await?;
        let dates: BTreeSet<String> = keys
            .iter()
            .filter(|key| is_image(key))
            .filter_map(|key| self.parse_key(key))
            .map(|task| task.date)
            .collect();
        Ok(dates.into_iter().collect())
    }

    /// Build a task from `<prefix>/<date>/<CAMERA>/…/<file>`.
    ///
    /// Returns `None` for keys outside the prefix or too shallow to carry a
    /// camera folder.
    pub fn parse_key(&self, key: &str) -> Option<ImageTask> {
        let rest = key
            .strip_prefix(self.image_prefix.as_str())?
            .strip_prefix('/')?;
        let mut segments = rest.split('/');
        let date = segments.next().filter(|s| !s.is_empty())?;
        let camera = segments.next().filter(|s| !s.is_empty())?;
        // At least the filename must follow the camera folder
        segments.next()?;
        Some(ImageTask::new(key, date, camera.to_uppercase()))
    }
}

/// Whether the key's extension is a known image type.
pub fn is_image(key: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        for key in [
            "images/2025-11-26/PTZ/cam_1.jpg",
            "images/2025-11-26/PTZ/cam_2.JPEG",
            "images/2025-11-26/FIXED/gate.png",
            "images/2025-11-26/FIXED/missing.xlsx",
            "images/2025-11-26_chittoor/ANALYTICS/junction.webp",
            "images/2025-11-25/PTZ/nested/deeper.bmp",
            "images/loose.jpg",
        ] {
            store.insert(key, vec![0], "application/octet-stream");
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_discover_date() {
        let discovery = TaskDiscovery::new(store(), "images");
        let tasks = discovery.discover("2025-11-26", None).await.unwrap();
        let paths: Vec<&str> = tasks.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "images/2025-11-26/FIXED/gate.png",
                "images/2025-11-26/PTZ/cam_1.jpg",
                "images/2025-11-26/PTZ/cam_2.JPEG",
            ]
        );
        assert_eq!(tasks[1].camera_type, "PTZ");
        assert_eq!(tasks[1].date, "2025-11-26");
        assert_eq!(tasks[1].filename, "cam_1.jpg");
    }

    #[tokio::test]
    async fn test_discover_camera_type_case_insensitive() {
        let discovery = TaskDiscovery::new(store(), "/images/");
        let tasks = discovery.discover("2025-11-26", Some("fixed")).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].filename, "gate.png");
    }

    #[tokio::test]
    async fn test_discover_lowercase_camera_folder() {
        let store = MemoryStore::new();
        store.insert("images/2025-11-27/ptz/cam_1.jpg", vec![0], "image/jpeg");
        store.insert("images/2025-11-27/Fixed/gate.jpg", vec![0], "image/jpeg");
        let discovery = TaskDiscovery::new(Arc::new(store), "images");

        let tasks = discovery.discover("2025-11-27", Some("PTZ")).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].path, "images/2025-11-27/ptz/cam_1.jpg");
        assert_eq!(tasks[0].camera_type, "PTZ");

        let tasks = discovery.discover("2025-11-27", Some("fixed")).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].filename, "gate.jpg");
    }

    #[tokio::test]
    async fn test_location_suffixed_date_is_separate() {
        let discovery = TaskDiscovery::new(store(), "images");
        let tasks = discovery.discover("2025-11-26_chittoor", None).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].camera_type, "ANALYTICS");
    }

    #[tokio::test]
    async fn test_dates() {
        let discovery = TaskDiscovery::new(store(), "images");
        assert_eq!(
            discovery.dates().await.unwrap(),
            vec!["2025-11-25", "2025-11-26", "2025-11-26_chittoor"]
        );
    }

    #[test]
    fn test_parse_key_rejects_shallow_keys() {
        let discovery = TaskDiscovery::new(Arc::new(MemoryStore::new()), "images");
        assert!(discovery.parse_key("images/loose.jpg").is_none());
        assert!(discovery.parse_key("images/2025-11-26/cam.jpg").is_none());
        assert!(discovery.parse_key("other/2025-11-26/PTZ/cam.jpg").is_none());
        let task = discovery.parse_key("images/2025-11-25/ptz/nested/deeper.bmp").unwrap();
        assert_eq!(task.camera_type, "PTZ");
        assert_eq!(task.filename, "deeper.bmp");
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("a/b.JPG"));
        assert!(is_image("a/b.webp"));
        assert!(!is_image("a/b.xlsx"));
        assert!(!is_image("a/noext"));
    }
}
