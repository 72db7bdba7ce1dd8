//! Run summary reporting
//!
//! This module collects per-partition counts into a [`HarvestSummary`] and
//! renders it to stdout and to `summary.md` in the run directory.

use crate::download::DownloadReport;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};

/// Counts for one harvested partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub label: String,
    pub slug: String,

    /// Feed items walked, including skipped ones
    pub items_seen: usize,

    /// Items that went through comment and reply expansion
    pub items_processed: usize,

    /// Reply threads abandoned after repeated identical renders
    pub threads_exhausted: usize,

    pub media_urls: usize,
    pub image_urls: usize,
    pub links_found: usize,
    pub links_written: usize,

    /// `None` when the download pass did not run
    pub download: Option<DownloadReport>,
}

/// Summary of a whole harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub creator: String,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: Option<String>,
    pub partitions: Vec<PartitionReport>,
}

impl HarvestSummary {
    pub fn new(creator: &str, run_dir: &Path, started_at: DateTime<Utc>) -> Self {
        Self {
            creator: creator.to_string(),
            run_dir: run_dir.to_path_buf(),
            started_at,
            finished_at: None,
            config_hash: None,
            partitions: Vec::new(),
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    pub fn total_items(&self) -> usize {
        self.partitions.iter().map(|p| p.items_processed).sum()
    }

    pub fn total_links_written(&self) -> usize {
        self.partitions.iter().map(|p| p.links_written).sum()
    }

    /// Sums the download reports of every partition that ran a download pass
    pub fn total_downloads(&self) -> DownloadReport {
        self.partitions
            .iter()
            .filter_map(|p| p.download.as_ref())
            .fold(DownloadReport::default(), |mut total, report| {
                total.merge(report);
                total
            })
    }
}

/// Prints a summary to stdout in a formatted manner
pub fn print_summary(summary: &HarvestSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Overview:");
    println!("  Creator: {}", summary.creator);
    println!("  Output: {}", summary.run_dir.display());
    if let Some(duration) = summary.duration_seconds() {
        println!("  Duration: {}s", duration);
    }
    println!("  Posts processed: {}", summary.total_items());
    println!("  Links recorded: {}", summary.total_links_written());
    println!();

    println!("Partitions:");
    for partition in &summary.partitions {
        println!(
            "  {}: {} post(s), {} media, {} image(s), {} link(s) ({} new)",
            partition.label,
            partition.items_processed,
            partition.media_urls,
            partition.image_urls,
            partition.links_found,
            partition.links_written
        );
        if partition.threads_exhausted > 0 {
            println!(
                "    {} reply thread(s) skipped after repeated renders",
                partition.threads_exhausted
            );
        }
    }
    println!();

    let downloads = summary.total_downloads();
    if downloads.attempted() > 0 {
        println!(
            "Downloads: {} fetched ({} bytes), {} already present, {} failed",
            downloads.downloaded, downloads.bytes, downloads.skipped, downloads.failed
        );
        if downloads.collisions > 0 {
            println!(
                "  {} file(s) not downloaded because another file of the same post has the same name",
                downloads.collisions
            );
        }
    }
}

/// Writes the markdown form of `summary` to `output_path`
pub async fn write_markdown_summary(
    summary: &HarvestSummary,
    output_path: &Path,
) -> io::Result<()> {
    let markdown = format_markdown_summary(summary);
    tokio::fs::write(output_path, markdown).await
}

/// Formats a harvest summary as markdown
pub fn format_markdown_summary(summary: &HarvestSummary) -> String {
    let mut md = String::new();

    md.push_str("# Gleaner Harvest Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Creator**: {}\n", summary.creator));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = summary.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Partitions\n\n");
    if summary.partitions.is_empty() {
        md.push_str("No partitions were harvested.\n\n");
    } else {
        md.push_str("| Partition | Posts | Media | Images | Links (new) | Downloaded | Skipped | Failed |\n");
        md.push_str("|---|---|---|---|---|---|---|---|\n");
        for p in &summary.partitions {
            let (downloaded, skipped, failed) = match &p.download {
                Some(d) => (
                    d.downloaded.to_string(),
                    d.skipped.to_string(),
                    d.failed.to_string(),
                ),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} ({}) | {} | {} | {} |\n",
                p.label,
                p.items_processed,
                p.media_urls,
                p.image_urls,
                p.links_found,
                p.links_written,
                downloaded,
                skipped,
                failed
            ));
        }
        md.push('\n');
    }

    let downloads = summary.total_downloads();
    md.push_str("## Downloads\n\n");
    md.push_str(&format!("- **Fetched**: {}\n", downloads.downloaded));
    md.push_str(&format!("- **Bytes**: {}\n", downloads.bytes));
    md.push_str(&format!("- **Already Present**: {}\n", downloads.skipped));
    md.push_str(&format!("- **Failed**: {}\n", downloads.failed));
    md.push_str(&format!("- **Name Collisions**: {}\n", downloads.collisions));

    md
}
