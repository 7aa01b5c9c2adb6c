//! Local file backend for state storage
//!
//! State lives in a local JSON file (default: cirrus.state.json) next to a
//! `.lock` file holding the current lock.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

/// Local file backend
pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

fn read_lock(path: &Path) -> BackendResult<Option<LockInfo>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| BackendError::Io(format!("Failed to read lock file: {}", e)))?;
    Ok(serde_json::from_str(&content).ok())
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "cirrus.state.json";

    /// Backend using cirrus.state.json in the current directory
    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let path = match config.attributes.get("path") {
            None => PathBuf::from(Self::DEFAULT_STATE_FILE),
            Some(value) => value.as_str().filter(|p| !p.is_empty()).map(PathBuf::from).ok_or_else(
                || BackendError::configuration("`path` must be a non-empty string"),
            )?,
        };
        Ok(Self::with_path(path))
    }

    pub fn state_path(&self) -> &PathBuf {
        &self.state_path
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        if !self.state_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.state_path)
            .map_err(|e| BackendError::Io(format!("Failed to read state file: {}", e)))?;

        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;

        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(existing) = self.read_state().await?
            && existing.lineage != state.lineage
        {
            return Err(BackendError::LineageMismatch {
                expected: existing.lineage,
                actual: state.lineage.clone(),
            });
        }

        let content = serde_json::to_string_pretty(state).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize state: {}", e))
        })?;

        // Write beside the target, then rename over it
        let tmp_path = self.state_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .map_err(|e| BackendError::Io(format!("Failed to write state file: {}", e)))?;
        std::fs::rename(&tmp_path, &self.state_path)
            .map_err(|e| BackendError::Io(format!("Failed to replace state file: {}", e)))?;

        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        if let Some(existing) = read_lock(&self.lock_path)?
            && !existing.is_expired()
        {
            return Err(BackendError::locked(&existing));
        }

        let lock = LockInfo::new(operation);
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        std::fs::write(&self.lock_path, content)
            .map_err(|e| BackendError::Io(format!("Failed to write lock file: {}", e)))?;

        Ok(lock)
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = read_lock(&self.lock_path)?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;

        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }

        std::fs::remove_file(&self.lock_path)
            .map_err(|e| BackendError::Io(format!("Failed to remove lock file: {}", e)))
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        if !self.lock_path.exists() {
            return Err(BackendError::LockNotFound(lock_id.to_string()));
        }

        if let Some(existing) = read_lock(&self.lock_path)?
            && existing.id != lock_id
        {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }

        std::fs::remove_file(&self.lock_path)
            .map_err(|e| BackendError::Io(format!("Failed to remove lock file: {}", e)))
    }

    async fn init(&self) -> BackendResult<()> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| BackendError::Io(format!("Failed to create state directory: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_backend_read_write() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        assert!(backend.read_state().await.unwrap().is_none());

        let mut state_file = StateFile::new();
        state_file.increment_serial();
        backend.write_state(&state_file).await.unwrap();

        let read_state = backend.read_state().await.unwrap().unwrap();
        assert_eq!(read_state.serial, 1);
        assert!(!dir.path().join("test.state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_local_backend_rejects_foreign_lineage() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        backend.write_state(&StateFile::new()).await.unwrap();

        let result = backend.write_state(&StateFile::new()).await;
        assert!(matches!(result, Err(BackendError::LineageMismatch { .. })));
    }

    #[tokio::test]
    async fn test_local_backend_invalid_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let backend = LocalBackend::with_path(path);
        assert!(matches!(
            backend.read_state().await,
            Err(BackendError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_local_backend_locking() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert_eq!(lock.operation, "apply");

        assert!(matches!(
            backend.acquire_lock("plan").await,
            Err(BackendError::Locked(_))
        ));

        backend.release_lock(&lock).await.unwrap();

        let lock2 = backend.acquire_lock("destroy").await.unwrap();
        assert_eq!(lock2.operation, "destroy");
        assert!(matches!(
            backend.release_lock(&lock).await,
            Err(BackendError::LockMismatch { .. })
        ));
        backend.release_lock(&lock2).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_backend_expired_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let stale = LockInfo::leased_for("apply", chrono::Duration::seconds(-1));
        std::fs::write(
            dir.path().join("test.state.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert_ne!(lock.id, stale.id);
    }

    #[tokio::test]
    async fn test_local_backend_force_unlock() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        assert!(matches!(
            backend.force_unlock("nope").await,
            Err(BackendError::LockNotFound(_))
        ));

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert!(backend.force_unlock("other").await.is_err());
        backend.force_unlock(&lock.id).await.unwrap();
        assert!(backend.acquire_lock("apply").await.is_ok());
    }

    #[tokio::test]
    async fn test_local_backend_init_creates_directory() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("state/prod/cirrus.state.json"));

        backend.init().await.unwrap();
        assert!(dir.path().join("state/prod").is_dir());
        backend.write_state(&StateFile::new()).await.unwrap();
    }

    #[test]
    fn test_local_backend_from_config() {
        let backend = LocalBackend::from_config(&BackendConfig::local()).unwrap();
        assert_eq!(backend.state_path(), &PathBuf::from("cirrus.state.json"));

        let mut attributes = HashMap::new();
        attributes.insert("path".to_string(), json!("custom.state.json"));
        let config = BackendConfig {
            backend_type: "local".to_string(),
            attributes,
        };
        let backend = LocalBackend::from_config(&config).unwrap();
        assert_eq!(backend.state_path(), &PathBuf::from("custom.state.json"));

        let mut attributes = HashMap::new();
        attributes.insert("path".to_string(), json!(42));
        let config = BackendConfig {
            backend_type: "local".to_string(),
            attributes,
        };
        assert!(matches!(
            LocalBackend::from_config(&config),
            Err(BackendError::Configuration(_))
        ));
    }
}
