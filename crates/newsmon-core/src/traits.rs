use std::future::Future;

use crate::error::AppError;
use crate::models::Story;

/// Read-only access to the story-ranking service.
pub trait StorySource: Send + Sync + Clone {
    /// The current top-stories ranking, as the service orders it.
    fn top_story_ids(&self) -> impl Future<Output = Result<Vec<u64>, AppError>> + Send;

    /// Fetch one story. A missing or deleted item is `AppError::NotFound`.
    fn story(&self, id: u64) -> impl Future<Output = Result<Story, AppError>> + Send;
}

/// Key-value store for user preferences.
pub trait SettingsStore: Send + Sync + Clone {
    fn load(&self, key: &str)
    -> impl Future<Output = Result<Option<Vec<String>>, AppError>> + Send;

    /// Write every entry or none of them.
    fn save_all(
        &self,
        entries: &[(&str, Vec<String>)],
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op SettingsStore for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullSettings;

impl SettingsStore for NullSettings {
    async fn load(&self, _key: &str) -> Result<Option<Vec<String>>, AppError> {
        Ok(None)
    }

    async fn save_all(&self, _entries: &[(&str, Vec<String>)]) -> Result<(), AppError> {
        Ok(())
    }
}
