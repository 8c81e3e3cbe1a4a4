//! Periodic refresh loop.
//!
//! Runs the pipeline on start, then on a fixed interval and whenever a
//! refresh is requested. The last successful result stays published when a
//! later run fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::fetch::FetchReporter;
use crate::models::{FilterSet, Story};
use crate::pipeline::NewsPipeline;
use crate::traits::{SettingsStore, StorySource};

/// A published pipeline result.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub stories: Vec<Story>,
    pub refreshed_at: DateTime<Utc>,
}

/// Events emitted by the monitor for monitoring/logging.
#[derive(Debug, Clone)]
pub enum MonitorEvent<'a> {
    Started { interval: Duration },
    RefreshStarted,
    RefreshSucceeded { count: usize },
    RefreshFailed { error: &'a AppError },
    Stopped,
}

/// Trait for receiving monitor events (decoupled logging).
pub trait MonitorReporter: Send + Sync {
    fn report(&self, event: MonitorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitorReporter;

impl MonitorReporter for TracingMonitorReporter {
    fn report(&self, event: MonitorEvent<'_>) {
        match event {
            MonitorEvent::Started { interval } => {
                tracing::info!(interval_secs = interval.as_secs(), "Monitor started");
            }
            MonitorEvent::RefreshStarted => {
                tracing::debug!("Refreshing stories");
            }
            MonitorEvent::RefreshSucceeded { count } => {
                tracing::info!(%count, "Stories refreshed");
            }
            MonitorEvent::RefreshFailed { error } => {
                tracing::error!(%error, "Refresh failed, keeping previous stories");
            }
            MonitorEvent::Stopped => {
                tracing::info!("Monitor stopped");
            }
        }
    }
}

/// Keeps a published story list fresh.
pub struct MonitorService<S, T>
where
    S: StorySource,
    T: SettingsStore,
{
    pipeline: NewsPipeline<S, T>,
    interval: Duration,
    latest: watch::Sender<Option<Arc<Snapshot>>>,
    refresh: Notify,
}

impl<S, T> MonitorService<S, T>
where
    S: StorySource,
    T: SettingsStore,
{
    pub fn new(pipeline: NewsPipeline<S, T>, interval: Duration) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            pipeline,
            interval,
            latest,
            refresh: Notify::new(),
        }
    }

    /// The last successful result, if any run has succeeded yet.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.borrow().clone()
    }

    /// Receive every newly published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.latest.subscribe()
    }

    /// Ask the running loop to refresh now instead of waiting.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Replace the filters, then trigger a refresh.
    ///
    /// The refresh is requested even when persisting the filters fails,
    /// since the new filter is already active in memory.
    pub async fn update_filters(&self, filters: FilterSet) -> Result<(), AppError> {
        let result = self.pipeline.filters().set_filters(filters).await;
        self.refresh_now();
        result
    }

    /// Pick up filters saved elsewhere, refreshing now if they changed.
    pub async fn reload_filters(&self) -> Result<bool, AppError> {
        let changed = self.pipeline.filters().reload().await?;
        if changed {
            self.refresh_now();
        }
        Ok(changed)
    }

    /// Run the pipeline once and publish the result on success.
    pub async fn refresh_once<MR, FR>(
        &self,
        reporter: &MR,
        fetch_reporter: &FR,
    ) -> Result<Arc<Snapshot>, AppError>
    where
        MR: MonitorReporter,
        FR: FetchReporter,
    {
        reporter.report(MonitorEvent::RefreshStarted);

        match self.pipeline.run(fetch_reporter).await {
            Ok(stories) => {
                let snapshot = Arc::new(Snapshot {
                    stories,
                    refreshed_at: Utc::now(),
                });
                reporter.report(MonitorEvent::RefreshSucceeded {
                    count: snapshot.stories.len(),
                });
                self.latest.send_replace(Some(Arc::clone(&snapshot)));
                Ok(snapshot)
            }
            Err(e) => {
                reporter.report(MonitorEvent::RefreshFailed { error: &e });
                Err(e)
            }
        }
    }

    /// Run the refresh loop until cancellation.
    pub async fn run<MR, FR>(
        &self,
        cancel_token: CancellationToken,
        reporter: &MR,
        fetch_reporter: &FR,
    ) where
        MR: MonitorReporter,
        FR: FetchReporter,
    {
        reporter.report(MonitorEvent::Started {
            interval: self.interval,
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            // Failures are reported; the previous snapshot stays published.
            let _ = self.refresh_once(reporter, fetch_reporter).await;

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.refresh.notified() => {}
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(MonitorEvent::Stopped);
    }
}
