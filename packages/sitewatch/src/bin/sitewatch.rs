//! Batch runner: classify every registered target once.
//!
//! Reads configuration from the environment (see `sitewatch::config`),
//! processes targets sequentially and prints the batch report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use sitewatch::backends::{BackendExt, FirecrawlBackend, GuardedBackend, HttpBackend};
use sitewatch::config::Config;
use sitewatch::pipeline::{AdaptiveScraper, BatchProcessor};
use sitewatch::stores::SqliteStore;
use sitewatch::traits::store::TargetRegistry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sitewatch")]
#[command(about = "Check whether tracked companies are still operating")]
struct Cli {
    /// Process at most this many targets
    #[arg(long)]
    limit: Option<usize>,

    /// List targets and their active URLs without scraping
    #[arg(long)]
    dry_list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sitewatch=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = SqliteStore::new(&config.database_url)
        .await
        .context("Failed to open database")?;

    if cli.dry_list {
        let targets = store.list_targets(cli.limit).await?;
        for target in &targets {
            let urls = store.active_urls(target.id).await?;
            println!(
                "{}\t{}\t{}\t{} active URLs",
                target.id,
                target.name,
                target.status,
                urls.len()
            );
        }
        return Ok(());
    }

    let fast = GuardedBackend::new(HttpBackend::new().context("Failed to build HTTP client")?)
        .rate_limited(config.requests_per_second);
    let mut scraper = AdaptiveScraper::new(fast);

    match config.firecrawl_api_key {
        Some(api_key) => {
            let heavy = FirecrawlBackend::from_secret(api_key)
                .context("Failed to build Firecrawl client")?;
            scraper = scraper.with_heavy(GuardedBackend::new(heavy).rate_limited(config.requests_per_second));
        }
        None => tracing::info!("FIRECRAWL_API_KEY not set, running without heavy backend"),
    }

    let processor = BatchProcessor::new(store, scraper).with_config(config.pipeline);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current target");
            on_signal.cancel();
        }
    });

    let report = processor.run(cli.limit, &cancel).await?;

    tracing::info!(
        completed = report.summary.completed,
        skipped = report.summary.skipped,
        failed = report.summary.failed,
        not_processed = report.summary.not_processed,
        "Done"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    Ok(())
}
