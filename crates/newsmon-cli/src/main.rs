use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use newsmon_client::HnClient;
use newsmon_core::{
    FilterEngine, FilterSet, MonitorConfig, MonitorService, NewsPipeline, Story, StorySource,
    TracingFetchReporter, TracingMonitorReporter,
};
use newsmon_store::JsonFileStore;

/// How often `watch` checks the settings file for filter edits.
const FILTER_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "newsmon", version, about = "Hacker News top stories, filtered")]
struct Cli {
    /// Settings file holding saved filters
    #[arg(
        long,
        global = true,
        env = "NEWSMON_SETTINGS",
        default_value = "newsmon-settings.json"
    )]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, rank and filter the current top stories once
    Top {
        /// Print stories as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Number of top stories to fetch (overrides NEWSMON_STORY_LIMIT)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,
    },

    /// Keep the list fresh, printing it after every refresh.
    /// Filters saved with `newsmon filters` trigger an immediate refresh.
    Watch,

    /// Show or change the saved keyword/topic filters
    Filters {
        #[command(subcommand)]
        action: FilterAction,
    },

    /// Open a story's link in the system browser
    Open {
        /// Story id
        id: u64,
    },
}

#[derive(Subcommand)]
enum FilterAction {
    /// Print the saved filters
    Show,

    /// Replace the saved filters
    Set {
        /// Comma-separated keywords (e.g. "AI, Python, Rust")
        #[arg(short, long, default_value = "")]
        keywords: String,

        /// Comma-separated topics (e.g. "Programming, Science")
        #[arg(short, long, default_value = "")]
        topics: String,
    },

    /// Remove all filters
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newsmon=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let store = JsonFileStore::new(&cli.settings);

    match cli.command {
        Commands::Top { json, limit } => {
            let mut config = config;
            if let Some(limit) = limit {
                config.fetch = config.fetch.with_limit(limit as usize);
            }
            cmd_top(&config, store, json).await?;
        }
        Commands::Watch => cmd_watch(config, store).await?,
        Commands::Filters { action } => cmd_filters(action, store).await?,
        Commands::Open { id } => cmd_open(&config, id).await?,
    }

    Ok(())
}

/// Build the pipeline from config and the saved filters.
async fn build_pipeline(
    config: &MonitorConfig,
    store: JsonFileStore,
) -> Result<NewsPipeline<HnClient, JsonFileStore>> {
    let client = HnClient::with_base_url(&config.base_url)
        .and_then(|c| c.with_timeout(config.fetch.request_timeout))
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to create HTTP client")?;

    let filters = FilterEngine::load(store)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to load saved filters")?;

    Ok(NewsPipeline::new(
        client,
        Arc::new(filters),
        config.fetch.clone(),
    ))
}

async fn cmd_top(config: &MonitorConfig, store: JsonFileStore, json: bool) -> Result<()> {
    let pipeline = build_pipeline(config, store).await?;
    let stories = pipeline
        .run(&TracingFetchReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stories)?);
    } else {
        print_stories(&stories);
    }

    Ok(())
}

async fn cmd_watch(config: MonitorConfig, store: JsonFileStore) -> Result<()> {
    let pipeline = build_pipeline(&config, store).await?;
    let monitor = Arc::new(MonitorService::new(pipeline, config.refresh_interval));
    let cancel = CancellationToken::new();
    let mut updates = monitor.subscribe();

    let handle = {
        let monitor = Arc::clone(&monitor);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            monitor
                .run(cancel, &TracingMonitorReporter, &TracingFetchReporter)
                .await;
        })
    };

    let mut filter_poll = tokio::time::interval(FILTER_POLL_INTERVAL);
    filter_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = filter_poll.tick() => {
                if let Err(error) = monitor.reload_filters().await {
                    tracing::warn!(%error, "Could not re-read saved filters");
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    println!(
                        "\n=== {} stories @ {} ===",
                        snapshot.stories.len(),
                        snapshot.refreshed_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    print_stories(&snapshot.stories);
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    cancel.cancel();
    handle.await.context("Monitor task panicked")?;
    Ok(())
}

async fn cmd_filters(action: FilterAction, store: JsonFileStore) -> Result<()> {
    let engine = FilterEngine::load(store)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to load saved filters")?;

    let next = match action {
        FilterAction::Show => None,
        FilterAction::Set { keywords, topics } => Some(FilterSet::parse(&keywords, &topics)),
        FilterAction::Clear => Some(FilterSet::default()),
    };

    if let Some(filters) = next {
        engine
            .set_filters(filters)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to save filters")?;
    }

    let filters = engine.current();
    if filters.is_empty() {
        println!("No filters set; every story is shown.");
    } else {
        println!("Keywords: {}", join(&filters.keywords));
        println!("Topics:   {}", join(&filters.topics));
    }

    Ok(())
}

async fn cmd_open(config: &MonitorConfig, id: u64) -> Result<()> {
    let client = HnClient::with_base_url(&config.base_url)
        .and_then(|c| c.with_timeout(config.fetch.request_timeout))
        .map_err(|e| anyhow::anyhow!(e))?;
    let story = client
        .story(id)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("Failed to fetch story {id}"))?;

    match story.open_target() {
        Some(url) => {
            tracing::info!(%id, %url, "Opening story");
            open_in_browser(url)?;
        }
        None => {
            tracing::info!(%id, "Story has no link, nothing to open");
        }
    }

    Ok(())
}

fn print_stories(stories: &[Story]) {
    if stories.is_empty() {
        println!("No stories match the current filters.");
        return;
    }
    for story in stories {
        println!("{}", story.label());
        if let Some(url) = story.open_target() {
            println!("    {url}");
        }
    }
}

fn join(tokens: &std::collections::BTreeSet<String>) -> String {
    if tokens.is_empty() {
        "-".to_string()
    } else {
        tokens.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn open_in_browser(url: &str) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        std::process::Command::new("xdg-open")
    };

    let status = command
        .arg(url)
        .status()
        .context("Failed to launch the system browser")?;
    if !status.success() {
        anyhow::bail!("Browser launcher exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_accepts_positive_limit() {
        let cli = Cli::try_parse_from(["newsmon", "top", "--limit", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Top { limit: Some(5), .. }));
    }

    #[test]
    fn top_rejects_zero_limit() {
        let err = Cli::try_parse_from(["newsmon", "top", "--limit", "0"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn filters_set_parses_both_lists() {
        let cli =
            Cli::try_parse_from(["newsmon", "filters", "set", "-k", "AI, Rust", "-t", "Science"])
                .unwrap();
        match cli.command {
            Commands::Filters {
                action: FilterAction::Set { keywords, topics },
            } => {
                assert_eq!(keywords, "AI, Rust");
                assert_eq!(topics, "Science");
            }
            _ => panic!("expected filters set"),
        }
    }
}
