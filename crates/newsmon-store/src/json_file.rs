use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use newsmon_core::error::AppError;
use newsmon_core::traits::SettingsStore;
use tokio::sync::Mutex;

/// Settings store backed by a single JSON object on disk.
///
/// Layout: `{"filters.keywords": ["AI", "rust"], "filters.topics": []}`.
/// A missing file reads as empty. Every `save_all` goes to a sibling temp
/// file that is then renamed over the original, so all of its entries land
/// together or not at all.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Arc<Mutex<()>>,
}

type SettingsMap = BTreeMap<String, Vec<String>>;

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<SettingsMap, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SettingsMap::new()),
            Err(e) => {
                return Err(AppError::SettingsError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        if raw.trim().is_empty() {
            return Ok(SettingsMap::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            AppError::SettingsError(format!("Invalid settings file {}: {e}", self.path.display()))
        })
    }

    async fn write_all(&self, map: &SettingsMap) -> Result<(), AppError> {
        let io_err = |e: std::io::Error| {
            AppError::SettingsError(format!("Failed to write {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(map)
            .map_err(|e| AppError::SettingsError(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<String>>, AppError> {
        let mut map = self.read_all().await?;
        Ok(map.remove(key))
    }

    async fn save_all(&self, entries: &[(&str, Vec<String>)]) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_all().await?;
        for (key, values) in entries {
            map.insert(key.to_string(), values.clone());
        }
        self.write_all(&map).await?;
        tracing::debug!(keys = entries.len(), path = %self.path.display(), "Saved settings");
        Ok(())
    }
}
