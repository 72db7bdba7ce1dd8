//! Gleaner main entry point
//!
//! This is the command-line interface for the Gleaner feed harvester.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use gleaner::config::{load_config_with_hash, Config};
use gleaner::output::{print_summary, HarvestSummary, OutputLayout, PartitionReport, ResourceManifest};
use gleaner::Downloader;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Gleaner: a resumable harvester for creator feeds
///
/// Gleaner walks a creator's post feed through a signed-in browser session,
/// expands every comment and reply thread, and archives snapshots, link
/// ledgers and media. Downloads recorded in a run directory can be resumed
/// at any time.
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version)]
#[command(about = "A resumable harvester for creator feeds", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested
    #[arg(long, conflicts_with = "download")]
    dry_run: bool,

    /// Resume the downloads recorded in an existing run directory
    #[arg(long, value_name = "RUN_DIR")]
    download: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match &cli.download {
        Some(run_dir) => handle_download(&config, run_dir).await,
        None => {
            if !cli.dry_run {
                tracing::info!("No rendering engine is linked into this binary; showing the plan");
            }
            handle_dry_run(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gleaner=info,warn"),
            1 => EnvFilter::new("gleaner=debug,info"),
            2 => EnvFilter::new("gleaner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) {
    let harvest = &config.harvest;

    println!("=== Gleaner Dry Run ===\n");

    println!("Harvest:");
    println!("  Creator: {}", harvest.creator);
    println!("  Feed: {}", config.feed_url());
    println!("  Sign-in: {}", config.login_url());
    println!("  Posts per partition: {}", harvest.posts_per_partition);
    if harvest.partition_by_year {
        if harvest.partitions.is_empty() {
            println!("  Partitions: every year offered by the feed");
        } else {
            println!("  Partitions: years matching {}", harvest.partitions.join(", "));
        }
    } else {
        println!("  Partitions: all");
    }
    println!("  Comments: {}", on_off(harvest.scrape_comments));
    println!("  Replies: {}", on_off(harvest.scrape_replies));
    println!("  Detail views: {}", on_off(harvest.capture_detail_views));

    println!("\nBrowser:");
    match config.browser.wait_timeout_secs {
        0 => println!("  Wait timeout: none"),
        secs => println!("  Wait timeout: {}s", secs),
    }
    println!("  Poll interval: {}ms", config.browser.poll_interval_ms);

    println!("\nPlatform:");
    println!("  Media host: {}", config.platform.user_content_host);
    println!("  Video hosts: {}", config.platform.video_hosts.join(", "));

    println!("\nOutput:");
    println!(
        "  Run directory: {}",
        OutputLayout::for_run(Path::new(&config.output.root), &harvest.creator, Utc::now())
            .run_dir()
            .display()
    );
    println!("  User agent: {}", config.download.user_agent);
    match config.download.timeout_secs {
        0 => println!("  Download deadline: none"),
        secs => println!("  Download deadline: {}s", secs),
    }

    if !config.debug.process_posts || !config.debug.post_allow_list.is_empty() {
        println!("\nDebug:");
        println!("  Process posts: {}", on_off(config.debug.process_posts));
        if !config.debug.post_allow_list.is_empty() {
            println!("  Post allow-list: {:?}", config.debug.post_allow_list);
        }
    }

    println!("\n✓ Configuration is valid");
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Handles the --download mode: resumes downloads from a run directory
async fn handle_download(config: &Config, run_dir: &Path) -> anyhow::Result<()> {
    let manifests = ResourceManifest::find_in(run_dir)
        .await
        .with_context(|| format!("Failed to read run directory {}", run_dir.display()))?;
    if manifests.is_empty() {
        bail!("No resource manifests found in {}", run_dir.display());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current file");
            on_interrupt.cancel();
        }
    });

    let layout = OutputLayout::new(run_dir);
    let downloader = Downloader::new(&config.download)?.with_cancel(cancel);
    let mut summary = HarvestSummary::new(&config.harvest.creator, run_dir, Utc::now());

    for path in manifests {
        let manifest = ResourceManifest::read(&path)
            .await
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        tracing::info!(
            "Resuming downloads for {} ({} media, {} image(s))",
            manifest.partition,
            manifest.media.len(),
            manifest.images.len()
        );

        let report = downloader.download_manifest(&manifest, &layout).await?;
        summary.partitions.push(PartitionReport {
            label: manifest.partition.clone(),
            slug: manifest.partition.clone(),
            media_urls: manifest.media.len(),
            image_urls: manifest.images.len(),
            download: Some(report),
            ..PartitionReport::default()
        });
    }

    summary.finish();
    print_summary(&summary);
    Ok(())
}
