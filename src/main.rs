use anyhow::Context;
use database::SqliteStore;
use reddit_client::{KeywordSet, RedditClient, ReqwestTransport, ResilientFetcher, RetryConfig};
use redsift_core::ScraperConfig;
use scraper_service::ScraperService;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "redsift=info,reddit_client=info,scraper_service=info,database=info,exporter=info"
                    .into()
            }),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ScraperConfig::from_toml_file(Path::new(&path))
            .with_context(|| format!("loading config from {path}"))?,
        None => ScraperConfig::default(),
    };

    tracing::info!(subreddit = %config.subreddit_url, "starting scrape");

    let keywords =
        KeywordSet::compile(&config.patterns).context("compiling keyword patterns")?;
    let transport = ReqwestTransport::new(
        &config.user_agent,
        Duration::from_secs(config.request_timeout_secs),
    )
    .context("building HTTP client")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, finishing current post");
            signal_token.cancel();
        }
    });

    let fetcher = ResilientFetcher::with_cancellation(
        transport,
        RetryConfig {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_secs_f64(config.initial_backoff_secs),
        },
        cancel.clone(),
    );
    let client = RedditClient::new(fetcher, config.subreddit_url.clone());

    let store = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("opening store at {}", config.database_url))?;

    let service = ScraperService::with_cancellation(
        client,
        &store,
        keywords,
        Duration::from_secs_f64(config.inter_post_delay_secs),
        cancel,
    );

    let summary = service.run().await.context("scrape run failed")?;
    tracing::info!(
        included = summary.included,
        skipped = summary.skipped,
        failed = summary.failed,
        "scrape complete"
    );

    let rows = exporter::export_jsonl(&store, Path::new(&config.export_path))
        .await
        .with_context(|| format!("exporting to {}", config.export_path))?;
    tracing::info!(rows, "export complete");

    Ok(())
}
