use std::time::Duration;

use url::Url;

use crate::error::AppError;
use crate::fetch::{DEFAULT_STORY_LIMIT, FetchConfig};

/// Public Hacker News API host.
pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Runtime configuration for the story monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub base_url: String,
    pub fetch: FetchConfig,
    pub refresh_interval: Duration,
}

impl MonitorConfig {
    /// Read configuration from environment variables.
    ///
    /// - `NEWSMON_BASE_URL` (optional, defaults to the public HN API)
    /// - `NEWSMON_STORY_LIMIT` (optional, defaults to 100)
    /// - `NEWSMON_MAX_CONCURRENT` (optional, defaults to the story limit)
    /// - `NEWSMON_REQUEST_TIMEOUT_SECS` (optional, defaults to 10)
    /// - `NEWSMON_BATCH_DEADLINE_SECS` (optional, unset waits for every request)
    /// - `NEWSMON_REFRESH_INTERVAL_SECS` (optional, defaults to 3600)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let base_url = match lookup("NEWSMON_BASE_URL") {
            None => DEFAULT_BASE_URL.to_string(),
            Some(raw) => {
                let parsed = Url::parse(&raw).map_err(|e| {
                    AppError::ConfigError(format!("Invalid NEWSMON_BASE_URL '{raw}': {e}"))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::ConfigError(format!(
                        "NEWSMON_BASE_URL must be http or https, got '{raw}'"
                    )));
                }
                raw.trim_end_matches('/').to_string()
            }
        };

        let limit = positive(&lookup, "NEWSMON_STORY_LIMIT")?.unwrap_or(DEFAULT_STORY_LIMIT as u64)
            as usize;
        let max_concurrent =
            positive(&lookup, "NEWSMON_MAX_CONCURRENT")?.map_or(limit, |n| n as usize);
        let request_timeout = positive(&lookup, "NEWSMON_REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let batch_deadline = positive(&lookup, "NEWSMON_BATCH_DEADLINE_SECS")?;
        let refresh_interval = positive(&lookup, "NEWSMON_REFRESH_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);

        let mut fetch = FetchConfig::default()
            .with_limit(limit)
            .with_max_concurrent(max_concurrent)
            .with_request_timeout(Duration::from_secs(request_timeout));
        if let Some(secs) = batch_deadline {
            fetch = fetch.with_batch_deadline(Duration::from_secs(secs));
        }

        Ok(Self {
            base_url,
            fetch,
            refresh_interval: Duration::from_secs(refresh_interval),
        })
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let parsed: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Some(parsed))
}
