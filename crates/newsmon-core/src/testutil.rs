//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};

use crate::error::AppError;
use crate::fetch::{FetchEvent, FetchReporter};
use crate::models::Story;
use crate::monitor::{MonitorEvent, MonitorReporter};
use crate::traits::{SettingsStore, StorySource};

// ---------------------------------------------------------------------------
// MockStorySource
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MockItem {
    result: Result<Story, AppError>,
    delay: Duration,
}

/// Mock story source with per-id responses and optional delays.
///
/// Unknown ids return `NotFound`. Tracks how many `story` calls were made
/// and the peak number running at once.
#[derive(Clone)]
pub struct MockStorySource {
    /// Queue of id-list responses. Each call pops the first element.
    /// If empty, returns the ids of the configured items in insertion order.
    id_responses: Arc<Mutex<Vec<Result<Vec<u64>, AppError>>>>,
    order: Arc<Mutex<Vec<u64>>>,
    items: Arc<Mutex<HashMap<u64, MockItem>>>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockStorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorySource {
    pub fn new() -> Self {
        Self {
            id_responses: Arc::new(Mutex::new(Vec::new())),
            order: Arc::new(Mutex::new(Vec::new())),
            items: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn insert(self, id: u64, result: Result<Story, AppError>, delay: Duration) -> Self {
        self.order.lock().unwrap().push(id);
        self.items
            .lock()
            .unwrap()
            .insert(id, MockItem { result, delay });
        self
    }

    pub fn with_story(self, story: Story) -> Self {
        let id = story.id;
        self.insert(id, Ok(story), Duration::ZERO)
    }

    /// Respond to `id` with `story`, even if the ids differ.
    pub fn with_story_for(self, id: u64, story: Story) -> Self {
        self.insert(id, Ok(story), Duration::ZERO)
    }

    pub fn with_delayed_story(self, story: Story, delay: Duration) -> Self {
        let id = story.id;
        self.insert(id, Ok(story), delay)
    }

    pub fn with_failure(self, id: u64, error: AppError) -> Self {
        self.insert(id, Err(error), Duration::ZERO)
    }

    /// Queue an explicit id-list response.
    pub fn with_ids(self, ids: Vec<u64>) -> Self {
        self.id_responses.lock().unwrap().push(Ok(ids));
        self
    }

    /// Queue an id-list failure.
    pub fn with_ids_error(self, error: AppError) -> Self {
        self.id_responses.lock().unwrap().push(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Calls currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl StorySource for MockStorySource {
    async fn top_story_ids(&self) -> Result<Vec<u64>, AppError> {
        let mut responses = self.id_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.order.lock().unwrap().clone())
        } else {
            responses.remove(0)
        }
    }

    async fn story(&self, id: u64) -> Result<Story, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Released on drop so timed-out and cancelled calls are counted too.
        let _in_flight = InFlight(Arc::clone(&self.in_flight));

        let item = self.items.lock().unwrap().get(&id).cloned();
        let result = match item {
            Some(item) => {
                if !item.delay.is_zero() {
                    tokio::time::sleep(item.delay).await;
                }
                item.result
            }
            None => Err(AppError::NotFound(id)),
        };
        result
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockSettingsStore
// ---------------------------------------------------------------------------

/// In-memory settings store that records saves.
#[derive(Clone)]
pub struct MockSettingsStore {
    values: Arc<Mutex<HashMap<String, Vec<String>>>>,
    load_error: Arc<Mutex<Option<AppError>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
    /// Any save touching one of these keys fails and writes nothing.
    failing_keys: Arc<Mutex<HashMap<String, AppError>>>,
    pub saves: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl MockSettingsStore {
    pub fn empty() -> Self {
        Self {
            values: Arc::new(Mutex::new(HashMap::new())),
            load_error: Arc::new(Mutex::new(None)),
            save_error: Arc::new(Mutex::new(None)),
            failing_keys: Arc::new(Mutex::new(HashMap::new())),
            saves: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_value(self, key: &str, values: &[&str]) -> Self {
        self.values.lock().unwrap().insert(
            key.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Store that returns an error on the first load.
    pub fn with_load_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.load_error.lock().unwrap() = Some(error);
        store
    }

    /// Store that returns an error on the first save.
    pub fn with_save_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.save_error.lock().unwrap() = Some(error);
        store
    }

    /// Reject every save that includes `key`.
    pub fn with_failing_key(self, key: &str, error: AppError) -> Self {
        self.failing_keys
            .lock()
            .unwrap()
            .insert(key.to_string(), error);
        self
    }

    pub fn value(&self, key: &str) -> Option<Vec<String>> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

impl SettingsStore for MockSettingsStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<String>>, AppError> {
        if let Some(e) = self.load_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn save_all(&self, entries: &[(&str, Vec<String>)]) -> Result<(), AppError> {
        if let Some(e) = self.save_error.lock().unwrap().take() {
            return Err(e);
        }
        {
            let failing = self.failing_keys.lock().unwrap();
            if let Some(e) = entries.iter().find_map(|(key, _)| failing.get(*key)) {
                return Err(e.clone());
            }
        }

        let mut saves = self.saves.lock().unwrap();
        let mut values = self.values.lock().unwrap();
        for (key, entry) in entries {
            saves.push((key.to_string(), entry.clone()));
            values.insert(key.to_string(), entry.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockFetchReporter
// ---------------------------------------------------------------------------

/// Mock fetch reporter that records events.
#[derive(Default)]
pub struct MockFetchReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    fetched: Arc<Mutex<Vec<u64>>>,
    failed: Arc<Mutex<Vec<u64>>>,
}

impl MockFetchReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }

    /// Ids in completion order.
    pub fn fetched_ids(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn failed_ids(&self) -> Vec<u64> {
        let mut ids = self.failed.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }
}

impl FetchReporter for MockFetchReporter {
    fn report(&self, event: FetchEvent<'_>) {
        let label = match &event {
            FetchEvent::BatchStarted { .. } => "BatchStarted",
            FetchEvent::StoryFetched { id } => {
                self.fetched.lock().unwrap().push(*id);
                "StoryFetched"
            }
            FetchEvent::StoryFailed { id, .. } => {
                self.failed.lock().unwrap().push(*id);
                "StoryFailed"
            }
            FetchEvent::DeadlineExceeded { .. } => "DeadlineExceeded",
            FetchEvent::BatchCompleted { .. } => "BatchCompleted",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// MockMonitorReporter
// ---------------------------------------------------------------------------

/// Mock monitor reporter that records events.
#[derive(Default)]
pub struct MockMonitorReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockMonitorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }
}

impl MonitorReporter for MockMonitorReporter {
    fn report(&self, event: MonitorEvent<'_>) {
        let label = match &event {
            MonitorEvent::Started { .. } => "Started",
            MonitorEvent::RefreshStarted => "RefreshStarted",
            MonitorEvent::RefreshSucceeded { .. } => "RefreshSucceeded",
            MonitorEvent::RefreshFailed { .. } => "RefreshFailed",
            MonitorEvent::Stopped => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a story with a fixed timestamp and a URL.
pub fn make_story(id: u64, title: &str, score: i64) -> Story {
    Story {
        id,
        title: title.to_string(),
        url: Some(format!("https://example.com/{id}")),
        score,
        published_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}
