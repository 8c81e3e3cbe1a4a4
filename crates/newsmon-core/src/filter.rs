//! Shared filter state.
//!
//! The active [`FilterSet`] is the only mutable state shared between the
//! pipeline and the configuration surface. It is held as an `Arc` and
//! replaced whole, so readers always see a complete filter.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::{FilterSet, Story};
use crate::traits::SettingsStore;

/// Settings key for saved keyword tokens.
pub const KEYWORDS_KEY: &str = "filters.keywords";
/// Settings key for saved topic tokens.
pub const TOPICS_KEY: &str = "filters.topics";

/// Holds the current filter and persists changes to a [`SettingsStore`].
pub struct FilterEngine<S: SettingsStore> {
    current: RwLock<Arc<FilterSet>>,
    store: S,
    /// Serialises `set_filters` so the in-memory swap and the persisted
    /// write happen in the same order for every writer.
    write_lock: Mutex<()>,
}

impl<S: SettingsStore> FilterEngine<S> {
    /// Create an engine with an in-memory initial filter. Nothing is loaded.
    pub fn new(store: S, initial: FilterSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Create an engine from the filters saved in `store`.
    ///
    /// Missing keys load as empty sets.
    pub async fn load(store: S) -> Result<Self, AppError> {
        let filters = read_saved(&store).await?;

        tracing::debug!(
            keywords = filters.keywords.len(),
            topics = filters.topics.len(),
            "Loaded saved filters"
        );

        Ok(Self::new(store, filters))
    }

    /// Snapshot of the active filter.
    pub fn current(&self) -> Arc<FilterSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn matches(&self, story: &Story) -> bool {
        self.current().matches(story)
    }

    /// Re-read the saved filters and make them active if they changed.
    ///
    /// Picks up edits made by another process. Returns `true` when the
    /// active filter was replaced.
    pub async fn reload(&self) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let saved = read_saved(&self.store).await?;
        if *self.current() == saved {
            return Ok(false);
        }

        tracing::info!(
            keywords = ?saved.keywords,
            topics = ?saved.topics,
            "Saved filters changed"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(saved);
        Ok(true)
    }

    /// Replace both filter sets and persist them.
    ///
    /// Both keys are written in one `save_all`, so the store holds either
    /// the previous pair or the new one. The in-memory filter is swapped
    /// before saving; a store failure leaves the new filter active for this
    /// process and returns `SettingsError`.
    pub async fn set_filters(&self, filters: FilterSet) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        let filters = Arc::new(filters);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&filters);

        tracing::info!(
            keywords = ?filters.keywords,
            topics = ?filters.topics,
            "Filters updated"
        );

        let entries: [(&str, Vec<String>); 2] = [
            (KEYWORDS_KEY, filters.keywords.iter().cloned().collect()),
            (TOPICS_KEY, filters.topics.iter().cloned().collect()),
        ];
        self.store.save_all(&entries).await
    }
}

async fn read_saved<S: SettingsStore>(store: &S) -> Result<FilterSet, AppError> {
    let keywords = store.load(KEYWORDS_KEY).await?.unwrap_or_default();
    let topics = store.load(TOPICS_KEY).await?.unwrap_or_default();
    Ok(FilterSet::new(keywords, topics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockSettingsStore, make_story};
    use crate::traits::NullSettings;

    #[tokio::test]
    async fn load_from_empty_store_means_no_filtering() {
        let engine = FilterEngine::load(MockSettingsStore::empty()).await.unwrap();
        assert!(engine.current().is_empty());
        assert!(engine.matches(&make_story(1, "Anything", 1)));
    }

    #[tokio::test]
    async fn load_restores_saved_tokens() {
        let store = MockSettingsStore::empty()
            .with_value(KEYWORDS_KEY, &["rust", " "])
            .with_value(TOPICS_KEY, &["Science"]);

        let engine = FilterEngine::load(store).await.unwrap();
        let filters = engine.current();

        assert_eq!(filters.keywords.len(), 1);
        assert!(filters.keywords.contains("rust"));
        assert!(filters.topics.contains("Science"));
    }

    #[tokio::test]
    async fn load_propagates_store_errors() {
        let store = MockSettingsStore::with_load_error(AppError::SettingsError("corrupt".into()));
        let err = FilterEngine::load(store).await.err().unwrap();
        assert!(matches!(err, AppError::SettingsError(_)));
    }

    #[tokio::test]
    async fn set_filters_replaces_and_persists() {
        let store = MockSettingsStore::empty();
        let engine = FilterEngine::new(store.clone(), FilterSet::parse("old", "stale"));

        engine
            .set_filters(FilterSet::parse("AI, python", ""))
            .await
            .unwrap();

        let filters = engine.current();
        assert!(filters.keywords.contains("AI"));
        assert!(filters.topics.is_empty(), "previous topics must not be merged");

        assert_eq!(
            store.value(KEYWORDS_KEY),
            Some(vec!["AI".to_string(), "python".to_string()])
        );
        assert_eq!(store.value(TOPICS_KEY), Some(vec![]));
    }

    #[tokio::test]
    async fn set_filters_reports_store_failure_but_keeps_new_filter() {
        let store = MockSettingsStore::with_save_error(AppError::SettingsError("disk full".into()));
        let engine = FilterEngine::new(store, FilterSet::default());

        let err = engine
            .set_filters(FilterSet::parse("rust", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SettingsError(_)));
        assert!(engine.current().keywords.contains("rust"));
    }

    #[tokio::test]
    async fn failed_save_leaves_previous_pair_on_disk() {
        let store = MockSettingsStore::empty()
            .with_value(KEYWORDS_KEY, &["old"])
            .with_value(TOPICS_KEY, &["science"])
            .with_failing_key(TOPICS_KEY, AppError::SettingsError("disk full".into()));
        let engine = FilterEngine::new(store.clone(), FilterSet::parse("old", "science"));

        let err = engine
            .set_filters(FilterSet::parse("rust", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SettingsError(_)));

        let reloaded = FilterEngine::load(store.clone()).await.unwrap().current();
        assert_eq!(reloaded.as_ref(), &FilterSet::parse("old", "science"));
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reload_picks_up_external_changes() {
        let store = MockSettingsStore::empty().with_value(KEYWORDS_KEY, &["rust"]);
        let engine = FilterEngine::load(store.clone()).await.unwrap();

        assert!(!engine.reload().await.unwrap());

        let other = FilterEngine::new(store, FilterSet::default());
        other
            .set_filters(FilterSet::parse("", "science"))
            .await
            .unwrap();

        assert!(engine.reload().await.unwrap());
        assert_eq!(engine.current().as_ref(), &FilterSet::parse("", "science"));
    }

    #[tokio::test]
    async fn snapshot_is_unaffected_by_later_updates() {
        let engine = FilterEngine::new(NullSettings, FilterSet::parse("rust", "systems"));
        let before = engine.current();

        engine.set_filters(FilterSet::default()).await.unwrap();

        assert!(before.keywords.contains("rust"));
        assert!(before.topics.contains("systems"));
        assert!(engine.current().is_empty());
    }

    #[tokio::test]
    async fn concurrent_updates_never_mix_sets() {
        let engine = Arc::new(FilterEngine::new(NullSettings, FilterSet::default()));

        let mut handles = Vec::new();
        for i in 0..20 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let token = format!("t{i}");
                engine
                    .set_filters(FilterSet::new([token.clone()], [token]))
                    .await
                    .unwrap();
                let seen = engine.current();
                assert_eq!(seen.keywords, seen.topics);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let last = engine.current();
        assert_eq!(last.keywords, last.topics);
    }
}
