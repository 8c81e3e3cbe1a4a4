//! End-to-end pipeline runs against a local mock of the HN API.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use newsmon_client::HnClient;
use newsmon_core::testutil::{MockFetchReporter, MockSettingsStore};
use newsmon_core::{AppError, FetchConfig, FilterEngine, FilterSet, NewsPipeline};

async fn mock_hn() -> MockServer {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/topstories.json");
            then.status(200).json_body(json!([1, 2, 3, 4]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/item/1.json");
            then.status(200).json_body(json!({
                "id": 1, "title": "Rust async runtime", "url": "https://example.com/1",
                "score": 50, "time": 1_700_000_000
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/item/2.json");
            then.status(200).json_body(json!({
                "id": 2, "title": "Cooking tips", "score": 80, "time": 1_700_000_100
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/item/3.json");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/item/4.json");
            then.status(200).body("null");
        })
        .await;

    server
}

fn pipeline(
    server: &MockServer,
    filters: FilterSet,
) -> anyhow::Result<NewsPipeline<HnClient, MockSettingsStore>> {
    let client = HnClient::with_base_url(&server.base_url())?;
    let engine = Arc::new(FilterEngine::new(MockSettingsStore::empty(), filters));
    Ok(NewsPipeline::new(client, engine, FetchConfig::default()))
}

#[tokio::test]
async fn keyword_filter_over_http() -> anyhow::Result<()> {
    let server = mock_hn().await;
    let reporter = MockFetchReporter::new();

    let stories = pipeline(&server, FilterSet::parse("rust", ""))?
        .run(&reporter)
        .await?;

    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].id, 1);
    assert_eq!(reporter.failed_ids(), vec![3, 4]);
    Ok(())
}

#[tokio::test]
async fn unfiltered_run_over_http_is_ranked() -> anyhow::Result<()> {
    let server = mock_hn().await;

    let stories = pipeline(&server, FilterSet::default())?
        .run(&MockFetchReporter::new())
        .await?;

    let ids: Vec<u64> = stories.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert!(stories[0].url.is_none());
    Ok(())
}

#[tokio::test]
async fn id_list_outage_fails_the_run() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/topstories.json");
            then.status(502);
        })
        .await;

    let err = pipeline(&server, FilterSet::default())?
        .run(&MockFetchReporter::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PipelineError(_)));
    Ok(())
}

#[tokio::test]
async fn slow_item_is_dropped_after_request_timeout() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/topstories.json");
            then.status(200).json_body(json!([1, 2]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/item/1.json");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({"id": 1, "title": "slow", "score": 1, "time": 1}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/item/2.json");
            then.status(200)
                .json_body(json!({"id": 2, "title": "fast", "score": 2, "time": 2}));
        })
        .await;

    let client = HnClient::with_base_url(&server.base_url())?;
    let engine = Arc::new(FilterEngine::new(MockSettingsStore::empty(), FilterSet::default()));
    let config = FetchConfig::default().with_request_timeout(Duration::from_millis(300));
    let pipeline = NewsPipeline::new(client, engine, config);

    let stories = pipeline.run(&MockFetchReporter::new()).await?;

    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].id, 2);
    Ok(())
}
