pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::MonitorConfig;
pub use error::AppError;
pub use fetch::{FetchConfig, FetchCoordinator, FetchOutcome, TracingFetchReporter};
pub use filter::FilterEngine;
pub use models::{FilterSet, Story, parse_tokens};
pub use monitor::{MonitorService, Snapshot, TracingMonitorReporter};
pub use pipeline::NewsPipeline;
pub use traits::{NullSettings, SettingsStore, StorySource};
