use std::time::Duration;

use chrono::{DateTime, Utc};
use newsmon_core::config::DEFAULT_BASE_URL;
use newsmon_core::error::AppError;
use newsmon_core::models::Story;
use newsmon_core::traits::StorySource;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hacker News API client.
///
/// Reads `/v0/topstories.json` and `/v0/item/{id}.json` relative to a
/// configurable base URL. Holds no state besides the connection pool.
#[derive(Clone)]
pub struct HnClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HnClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        Self::build(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.base_url, timeout)
    }

    fn build(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid base URL '{base_url}': {e}")))?;

        let client = Client::builder()
            .user_agent(concat!("newsmon/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn top_stories_url(&self) -> String {
        format!("{}/v0/topstories.json", self.base_url)
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}/v0/item/{id}.json", self.base_url)
    }

    /// GET `url` and return the body of a successful response.
    async fn get_body(&self, url: &str) -> Result<String, AppError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::NetworkError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout)
            } else {
                AppError::NetworkError(format!("Failed to read response body: {e}"))
            }
        })
    }
}

impl StorySource for HnClient {
    async fn top_story_ids(&self) -> Result<Vec<u64>, AppError> {
        let body = self.get_body(&self.top_stories_url()).await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::DecodeError(format!("Top stories is not a list of ids: {e}")))
    }

    async fn story(&self, id: u64) -> Result<Story, AppError> {
        let body = self.get_body(&self.item_url(id)).await?;
        decode_item(id, &body)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Item payload as served by the API. Only the fields we use.
#[derive(Debug, Deserialize)]
struct ItemPayload {
    id: u64,
    title: Option<String>,
    url: Option<String>,
    score: Option<i64>,
    time: Option<i64>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    dead: bool,
}

/// Decode an item body. `null`, deleted and dead items are `NotFound`.
fn decode_item(id: u64, body: &str) -> Result<Story, AppError> {
    let payload: Option<ItemPayload> = serde_json::from_str(body)
        .map_err(|e| AppError::DecodeError(format!("Story {id}: {e}")))?;

    let Some(item) = payload else {
        return Err(AppError::NotFound(id));
    };
    if item.deleted || item.dead {
        return Err(AppError::NotFound(id));
    }

    let missing = |field: &str| AppError::DecodeError(format!("Story {id}: missing field `{field}`"));
    let title = item.title.ok_or_else(|| missing("title"))?;
    let score = item.score.ok_or_else(|| missing("score"))?;
    let time = item.time.ok_or_else(|| missing("time"))?;
    let published_at = DateTime::<Utc>::from_timestamp(time, 0)
        .ok_or_else(|| AppError::DecodeError(format!("Story {id}: invalid time {time}")))?;

    Ok(Story {
        id: item.id,
        title,
        url: item.url,
        score,
        published_at,
    })
}
