use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::models::AppData;
use crate::utils::error::Result;

/// Durable home of [`AppData`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Missing or unreadable state yields an empty history.
    async fn load(&self) -> AppData;
    async fn save(&self, data: &AppData) -> Result<()>;
}

/// JSON file, replaced atomically on every save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> AppData {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No saved state, starting fresh");
                return AppData::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Could not read state: {}", e);
                return AppData::default();
            }
        };

        match serde_json::from_slice::<AppData>(&bytes) {
            Ok(data) => {
                tracing::info!(path = %self.path.display(), assets = data.len(), "Loaded saved state");
                data
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Saved state is corrupt, ignoring it: {}", e);
                AppData::default()
            }
        }
    }

    async fn save(&self, data: &AppData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(data)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), assets = data.len(), "Saved state");
        Ok(())
    }
}

/// Keeps state in memory only; used for dry runs.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Option<AppData>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: AppData) -> Self {
        Self {
            data: Mutex::new(Some(data)),
            saves: Mutex::new(0),
        }
    }

    pub async fn saved(&self) -> Option<AppData> {
        self.data.lock().await.clone()
    }

    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> AppData {
        self.data.lock().await.clone().unwrap_or_default()
    }

    async fn save(&self, data: &AppData) -> Result<()> {
        *self.data.lock().await = Some(data.clone());
        *self.saves.lock().await += 1;
        Ok(())
    }
}
