//! Concurrent story fetching with per-item failure isolation.
//!
//! Every id becomes one request whose result is captured as a
//! [`FetchOutcome`]; a failing id never aborts its siblings. The batch
//! completes once every request has settled, or when the optional batch
//! deadline fires.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::AppError;
use crate::models::Story;
use crate::traits::StorySource;

/// Default number of ids fetched per batch.
pub const DEFAULT_STORY_LIMIT: usize = 100;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one fetch batch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Only the first `limit` ids are fetched.
    pub limit: usize,
    /// Maximum simultaneous in-flight requests.
    pub max_concurrent: usize,
    /// Per-request timeout; a timed-out request counts as failed.
    pub request_timeout: Duration,
    /// Overall deadline for the batch. `None` waits for every request.
    pub batch_deadline: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_STORY_LIMIT,
            max_concurrent: DEFAULT_STORY_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            batch_deadline: None,
        }
    }
}

impl FetchConfig {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = Some(deadline);
        self
    }
}

/// Result of fetching a single id.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(Story),
    Failed { id: u64, error: AppError },
}

impl FetchOutcome {
    pub fn id(&self) -> u64 {
        match self {
            FetchOutcome::Fetched(story) => story.id,
            FetchOutcome::Failed { id, .. } => *id,
        }
    }

    pub fn into_story(self) -> Option<Story> {
        match self {
            FetchOutcome::Fetched(story) => Some(story),
            FetchOutcome::Failed { .. } => None,
        }
    }
}

/// Events emitted by the coordinator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum FetchEvent<'a> {
    BatchStarted {
        requested: usize,
        dispatched: usize,
    },
    StoryFetched {
        id: u64,
    },
    StoryFailed {
        id: u64,
        error: &'a AppError,
    },
    DeadlineExceeded {
        pending: usize,
    },
    BatchCompleted {
        succeeded: usize,
        failed: usize,
    },
}

/// Trait for receiving fetch events (decoupled logging).
pub trait FetchReporter: Send + Sync {
    fn report(&self, event: FetchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFetchReporter;

impl FetchReporter for TracingFetchReporter {
    fn report(&self, event: FetchEvent<'_>) {
        match event {
            FetchEvent::BatchStarted {
                requested,
                dispatched,
            } => {
                tracing::info!(%requested, %dispatched, "Fetching story batch");
            }
            FetchEvent::StoryFetched { id } => {
                tracing::debug!(%id, "Story fetched");
            }
            FetchEvent::StoryFailed { id, error } if error.is_not_found() => {
                tracing::debug!(%id, "Story missing, skipped");
            }
            FetchEvent::StoryFailed { id, error } => {
                tracing::warn!(%id, %error, "Story fetch failed, skipped");
            }
            FetchEvent::DeadlineExceeded { pending } => {
                tracing::warn!(%pending, "Batch deadline exceeded, dropping pending stories");
            }
            FetchEvent::BatchCompleted { succeeded, failed } => {
                tracing::info!(%succeeded, %failed, "Story batch settled");
            }
        }
    }
}

/// Fans story lookups out over a [`StorySource`].
#[derive(Clone)]
pub struct FetchCoordinator<S: StorySource> {
    source: S,
    config: FetchConfig,
}

impl<S: StorySource> FetchCoordinator<S> {
    pub fn new(source: S, config: FetchConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch the first `limit` ids and return the stories that decoded.
    ///
    /// Never fails. Successes come back in the order of `ids`.
    pub async fn fetch_all<R: FetchReporter>(&self, ids: &[u64], reporter: &R) -> Vec<Story> {
        self.fetch_outcomes(ids, reporter)
            .await
            .into_iter()
            .filter_map(FetchOutcome::into_story)
            .collect()
    }

    /// Like [`fetch_all`](Self::fetch_all) but keeps the failures.
    ///
    /// Ids still pending when the batch deadline fires are returned as
    /// `Timeout` failures.
    pub async fn fetch_outcomes<R: FetchReporter>(
        &self,
        ids: &[u64],
        reporter: &R,
    ) -> Vec<FetchOutcome> {
        let batch = dedupe(ids.iter().copied().take(self.config.limit));
        reporter.report(FetchEvent::BatchStarted {
            requested: ids.len(),
            dispatched: batch.len(),
        });

        let concurrency = self.config.max_concurrent.max(1);
        let mut pending = stream::iter(batch.iter().copied().enumerate())
            .map(|(index, id)| async move { (index, self.fetch_one(id).await) })
            .buffer_unordered(concurrency);

        let mut settled: Vec<Option<FetchOutcome>> = vec![None; batch.len()];
        let deadline = self.config.batch_deadline.map(|d| tokio::time::Instant::now() + d);

        loop {
            let next = match deadline {
                Some(deadline) => {
                    tokio::select! {
                        next = pending.next() => next,
                        () = tokio::time::sleep_until(deadline) => {
                            let remaining = settled.iter().filter(|o| o.is_none()).count();
                            reporter.report(FetchEvent::DeadlineExceeded { pending: remaining });
                            break;
                        }
                    }
                }
                None => pending.next().await,
            };

            let Some((index, outcome)) = next else {
                break;
            };
            match &outcome {
                FetchOutcome::Fetched(story) => {
                    reporter.report(FetchEvent::StoryFetched { id: story.id });
                }
                FetchOutcome::Failed { id, error } => {
                    reporter.report(FetchEvent::StoryFailed { id: *id, error });
                }
            }
            settled[index] = Some(outcome);
        }
        drop(pending);

        let deadline = self.config.batch_deadline.unwrap_or_default();
        let outcomes: Vec<FetchOutcome> = settled
            .into_iter()
            .zip(batch)
            .map(|(outcome, id)| {
                outcome.unwrap_or_else(|| {
                    let error = AppError::Timeout(deadline);
                    reporter.report(FetchEvent::StoryFailed { id, error: &error });
                    FetchOutcome::Failed { id, error }
                })
            })
            .collect();

        let succeeded = outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Fetched(_)))
            .count();
        reporter.report(FetchEvent::BatchCompleted {
            succeeded,
            failed: outcomes.len() - succeeded,
        });

        outcomes
    }

    async fn fetch_one(&self, id: u64) -> FetchOutcome {
        let result =
            match tokio::time::timeout(self.config.request_timeout, self.source.story(id)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(self.config.request_timeout)),
            };

        match result {
            Ok(story) if story.id != id => FetchOutcome::Failed {
                id,
                error: AppError::DecodeError(format!(
                    "requested story {id} but received story {}",
                    story.id
                )),
            },
            Ok(story) => FetchOutcome::Fetched(story),
            Err(error) => FetchOutcome::Failed { id, error },
        }
    }
}

/// Keep the first occurrence of each id.
fn dedupe(ids: impl Iterator<Item = u64>) -> Vec<u64> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
