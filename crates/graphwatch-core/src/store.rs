//! File-backed poll state.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use graphwatch::{PollStateStore, StateError};
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Stores each instance's poll state as a JSON file in one directory.
///
/// File names are the SHA-256 of the instance id, so any id is a safe file
/// name. Writes go to a temporary file in the same directory and are renamed
/// into place, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, instance_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", sha256::digest(instance_id)))
    }
}

#[async_trait]
impl PollStateStore for FileStateStore {
    #[instrument(skip(self), fields(instance_id = %instance_id))]
    async fn load(&self, instance_id: &str) -> Result<Option<JsonValue>, StateError> {
        let path = self.path_for(instance_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StateError::Storage(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), bytes = bytes.len(), "loaded poll state");
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    #[instrument(skip(self, state), fields(instance_id = %instance_id))]
    async fn save(&self, instance_id: &str, state: &JsonValue) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let dir = self.dir.clone();
        let path = self.path_for(instance_id);

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &bytes))
            .await
            .map_err(|e| StateError::Storage(format!("state writer task failed: {e}")))?
    }
}

fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StateError> {
    let storage = |e: std::io::Error| StateError::Storage(format!("{}: {e}", path.display()));

    std::fs::create_dir_all(dir).map_err(storage)?;
    let mut file = NamedTempFile::new_in(dir).map_err(storage)?;
    file.write_all(bytes).map_err(storage)?;
    file.as_file().sync_all().map_err(storage)?;
    file.persist(path).map_err(|e| storage(e.error))?;
    debug!(path = %path.display(), "saved poll state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_load_returns_none_before_first_save() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path());

        let loaded = store.load("contracts").await.unwrap();

        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_returns_saved_document() {
        // Arrange
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path().join("nested/state"));
        let state = json!({
            "lastPollTime": "2024-01-01T00:00:00Z",
            "lastKnownFiles": [{"id": "1", "name": "a.pdf"}],
        });

        // Act
        store.save("contracts", &state).await.unwrap();
        let loaded = store.load("contracts").await.unwrap();

        // Assert
        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn test_state_survives_a_new_store_instance() {
        let temp = TempDir::new().unwrap();
        FileStateStore::new(temp.path())
            .save("contracts", &json!({"n": 1}))
            .await
            .unwrap();

        let reopened = FileStateStore::new(temp.path());
        let loaded = reopened.load("contracts").await.unwrap();

        assert_eq!(loaded, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_instance_ids_with_path_characters_map_to_distinct_files() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path());

        store.save("../escape", &json!(1)).await.unwrap();
        store.save("a/b", &json!(2)).await.unwrap();

        assert_eq!(store.load("../escape").await.unwrap(), Some(json!(1)));
        assert_eq!(store.load("a/b").await.unwrap(), Some(json!(2)));
        let files = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(files, 2);
    }

    #[tokio::test]
    async fn test_corrupt_state_file_returns_serialization_error() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path());
        std::fs::write(store.path_for("contracts"), b"{not json").unwrap();

        let result = store.load("contracts").await;

        assert!(matches!(result, Err(StateError::Serialization(_))));
    }
}
