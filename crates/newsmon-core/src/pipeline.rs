use std::sync::Arc;

use crate::error::AppError;
use crate::fetch::{FetchConfig, FetchCoordinator, FetchReporter};
use crate::filter::FilterEngine;
use crate::models::Story;
use crate::traits::{SettingsStore, StorySource};

/// Orchestrates one refresh: ids → concurrent fetch → rank → filter.
///
/// Generic over the story source and settings store via traits, so it can
/// be driven by mocks in tests.
pub struct NewsPipeline<S, T>
where
    S: StorySource,
    T: SettingsStore,
{
    source: S,
    coordinator: FetchCoordinator<S>,
    filters: Arc<FilterEngine<T>>,
}

impl<S, T> NewsPipeline<S, T>
where
    S: StorySource,
    T: SettingsStore,
{
    pub fn new(source: S, filters: Arc<FilterEngine<T>>, config: FetchConfig) -> Self {
        Self {
            coordinator: FetchCoordinator::new(source.clone(), config),
            source,
            filters,
        }
    }

    pub fn filters(&self) -> &Arc<FilterEngine<T>> {
        &self.filters
    }

    /// Run the pipeline once.
    ///
    /// 1. Fetch the top-stories id list (failure is fatal)
    /// 2. Fetch story details concurrently (failures are dropped)
    /// 3. Sort by score, highest first
    /// 4. Keep the stories matching the current filter
    pub async fn run<R: FetchReporter>(&self, reporter: &R) -> Result<Vec<Story>, AppError> {
        // 1. Ids
        let ids = self
            .source
            .top_story_ids()
            .await
            .map_err(AppError::pipeline)?;
        tracing::debug!(count = ids.len(), "Fetched top story ids");

        // 2. Details
        let mut stories = self.coordinator.fetch_all(&ids, reporter).await;

        // 3. Rank
        rank_by_score(&mut stories);

        // 4. Filter, against one snapshot for the whole batch
        let filters = self.filters.current();
        let fetched = stories.len();
        stories.retain(|story| filters.matches(story));

        tracing::info!(
            fetched,
            shown = stories.len(),
            filtered = !filters.is_empty(),
            "Pipeline complete"
        );

        Ok(stories)
    }
}

/// Stable sort by score, highest first. Equal scores keep their order.
pub fn rank_by_score(stories: &mut [Story]) {
    stories.sort_by(|a, b| b.score.cmp(&a.score));
}
