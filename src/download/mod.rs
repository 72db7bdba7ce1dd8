//! Resumable download of collected media and images
//!
//! Every URL in a partition's media and image sets is mapped to a
//! deterministic destination. Existing destinations are skipped, so the pass
//! can be rerun at any time. A failed URL is logged and the pass moves on.

mod fetch;
mod target;

pub use fetch::{build_http_client, fetch_to_file, part_path};
pub use target::{
    content_hash, extension_for, fallback_hash, post_id_from_url, sanitize_title, DownloadTarget,
    ResourceKind,
};

use crate::collector::strip_query;
use crate::config::DownloadConfig;
use crate::output::{OutputLayout, ResourceManifest};
use crate::state::HarvestState;
use crate::{GleanError, Result};
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure of a single download; never aborts a batch
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome counts of a download pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    /// Destinations that already existed
    pub skipped: usize,
    pub failed: usize,
    /// URLs whose destination was already claimed earlier in the same pass
    pub collisions: usize,
    pub bytes: u64,
}

impl DownloadReport {
    pub fn merge(&mut self, other: &DownloadReport) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.collisions += other.collisions;
        self.bytes += other.bytes;
    }

    pub fn attempted(&self) -> usize {
        self.downloaded + self.skipped + self.failed + self.collisions
    }
}

/// Sequential, fail-soft downloader
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the pass between files once `cancel` fires
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Destinations for every media and image URL of a partition
    pub fn targets(state: &HarvestState, layout: &OutputLayout, slug: &str) -> Vec<DownloadTarget> {
        let media_dir = layout.media_dir(slug);
        let image_dir = layout.image_dir(slug);

        let media = state
            .media
            .iter()
            .map(|url| DownloadTarget::derive(url, ResourceKind::Media, &state.titles, &media_dir));
        let images = state
            .images
            .iter()
            .map(|url| DownloadTarget::derive(url, ResourceKind::Image, &state.titles, &image_dir));

        media.chain(images).collect()
    }

    /// Downloads a partition's media and images, then clears both sets
    pub async fn download_partition(
        &self,
        state: &mut HarvestState,
        layout: &OutputLayout,
        slug: &str,
    ) -> Result<DownloadReport> {
        let targets = Self::targets(state, layout, slug);
        if !state.media.is_empty() {
            tracing::info!("Downloading {} audio/video file(s)...", state.media.len());
        }
        if !state.images.is_empty() {
            tracing::info!("Downloading {} image(s)...", state.images.len());
        }

        let report = self.download_targets(&targets).await?;

        state.media.clear();
        state.images.clear();
        Ok(report)
    }

    /// Resumes the download pass recorded in a manifest
    pub async fn download_manifest(
        &self,
        manifest: &ResourceManifest,
        layout: &OutputLayout,
    ) -> Result<DownloadReport> {
        let mut state = manifest.to_state();
        self.download_partition(&mut state, layout, &manifest.partition)
            .await
    }

    /// Fetches each target whose destination does not exist yet
    ///
    /// A target whose destination another URL of this pass already claimed
    /// is counted as a collision, not as skipped.
    pub async fn download_targets(&self, targets: &[DownloadTarget]) -> Result<DownloadReport> {
        let mut report = DownloadReport::default();
        let mut claimed: HashSet<&Path> = HashSet::new();

        for target in targets {
            if self.cancel.is_cancelled() {
                return Err(GleanError::Cancelled);
            }

            if !claimed.insert(target.dest.as_path()) {
                tracing::warn!(
                    "Not downloading {}: {} is already taken by another file of this post",
                    strip_query(&target.url),
                    target.file_name
                );
                report.collisions += 1;
                continue;
            }

            if tokio::fs::try_exists(&target.dest).await? {
                tracing::debug!("Already downloaded: {}", target.file_name);
                report.skipped += 1;
                continue;
            }

            if let Some(dir) = target.dest.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }

            match fetch_to_file(&self.client, &target.url, &target.dest).await {
                Ok(bytes) => {
                    tracing::info!("Downloaded: {}", target.file_name);
                    report.downloaded += 1;
                    report.bytes += bytes;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to download {} from {}: {}",
                        target.file_name,
                        strip_query(&target.url),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
