//! Cover Repair CLI
//!
//! The `cover-repair` command verifies news cover images and repairs the
//! ones that are blank or half loaded.
//!
//! ## Commands
//!
//! - `run`: check every pending news item once
//! - `watch`: run batches on an interval until interrupted
//! - `key`: print the storage key for an article URL
//! - `cover-url`: print the cover image a page advertises

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, Level};

use cover_capture::{
    find_cover_image_url, BrowserRenderingClient, GeminiJudge, HttpFetcher, OpenAiImageGenerator,
    PageFetcher,
};
use cover_core::RepairConfig;
use cover_flow::{FlowEngine, FlowGraph, ItemOutcome, RepairRun, RunReport, StageRunner};
use cover_state::{
    object_key_for_url, NewsRepository, R2ObjectStore, SupabaseNewsRepository,
};

#[derive(Parser)]
#[command(name = "cover-repair")]
#[command(author = "Koala News")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verify and repair news cover images", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check all pending news covers once
    Run(RunArgs),

    /// Check pending news covers on a fixed interval until Ctrl-C
    Watch {
        /// Seconds between batch starts
        #[arg(long, default_value_t = 3600, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the object key a news URL's cover is stored under
    Key {
        /// Article URL
        url: String,
    },

    /// Fetch a page and print the cover image URL found in its metadata
    CoverUrl {
        /// Page URL
        url: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Process at most N pending items (newest first)
    #[arg(long)]
    limit: Option<usize>,

    /// Try AI image generation after HTML parsing fails
    #[arg(long)]
    ai_fallback: bool,

    /// Re-entries allowed per stage within one item's run
    #[arg(long)]
    max_retries: Option<u32>,

    /// Write <DIR>/<run_id>/report.json after each batch
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cover_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => {
            let run = build_run(&load_config(&args)?, args.limit);
            cmd_run(&run, args.report_dir.as_deref()).await
        }
        Commands::Watch { interval, run: args } => {
            let run = build_run(&load_config(&args)?, args.limit);
            cmd_watch(&run, Duration::from_secs(interval), args.report_dir.as_deref()).await
        }
        Commands::Key { url } => cmd_key(&url),
        Commands::CoverUrl { url } => cmd_cover_url(&HttpFetcher::default(), &url).await,
    }
}

fn load_config(args: &RunArgs) -> Result<RepairConfig> {
    let mut config = RepairConfig::from_env().context("Failed to load configuration")?;
    if args.ai_fallback {
        config = config.with_ai_fallback(true);
    }
    if let Some(max_retries) = args.max_retries {
        config = config.with_max_retries(max_retries);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_run(config: &RepairConfig, limit: Option<usize>) -> RepairRun {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::default());
    let repository: Arc<dyn NewsRepository> =
        Arc::new(SupabaseNewsRepository::new(config.supabase.clone()));

    let mut runner = StageRunner::new(
        Arc::new(BrowserRenderingClient::new(config.browser.clone())),
        fetcher.clone(),
        Arc::new(GeminiJudge::new(config.vision.clone(), fetcher)),
        repository.clone(),
        Arc::new(R2ObjectStore::new(config.r2.clone())),
        config.pipeline.clone(),
    );
    if let Some(image_gen) = &config.image_gen {
        runner = runner.with_generator(Arc::new(OpenAiImageGenerator::new(image_gen.clone())));
    }

    let graph = FlowGraph::for_ai_fallback(config.pipeline.ai_fallback);
    RepairRun::new(FlowEngine::new(graph, runner), repository).with_limit(limit)
}

async fn cmd_run(run: &RepairRun, report_dir: Option<&Path>) -> Result<()> {
    let report = run
        .execute()
        .await
        .context("Failed to list pending news")?;

    print_summary(&report);

    if let Some(dir) = report_dir {
        let path = report
            .write_json(dir)
            .context("Failed to write run report")?;
        println!("Report: {}", path.display());
    }

    Ok(())
}

async fn cmd_watch(run: &RepairRun, interval: Duration, report_dir: Option<&Path>) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "Watching for pending covers");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = cmd_run(run, report_dir).await {
                    let error = format!("{e:#}");
                    error!(error = %error, "Batch failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

fn cmd_key(url: &str) -> Result<()> {
    let key = object_key_for_url(url).with_context(|| format!("Cannot derive a key for {url}"))?;
    println!("{key}");
    Ok(())
}

async fn cmd_cover_url(fetcher: &dyn PageFetcher, url: &str) -> Result<()> {
    let html = fetcher
        .fetch_html(url)
        .await
        .with_context(|| format!("Failed to fetch {url}"))?;

    match find_cover_image_url(&html, url) {
        Some(cover) => println!("{cover}"),
        None => println!("No cover image found"),
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Run {}: {} checked, {} passed, {} rejected, {} escalated, {} failed ({} ms)",
        report.run_id,
        report.total(),
        report.passed_count(),
        report.rejected_count(),
        report.escalated_count(),
        report.failed_count(),
        report.duration_ms,
    );

    for item in &report.items {
        let detail = match &item.outcome {
            ItemOutcome::Passed {
                uploaded: Some(key),
            } => format!("uploaded {key}"),
            ItemOutcome::Escalated { reason } => format!("needs review: {reason}"),
            ItemOutcome::CeilingExceeded { stage } => format!("retry ceiling hit at {stage}"),
            ItemOutcome::Aborted { error, .. } => error.clone(),
            ItemOutcome::Unresolved { last_stage } => format!("stopped at {last_stage}"),
            ItemOutcome::Passed { uploaded: None } | ItemOutcome::Rejected => String::new(),
        };
        println!(
            "  #{:<6} {:<16} {} {}",
            item.news_id,
            item.outcome.name(),
            item.url,
            detail
        );
    }
}
