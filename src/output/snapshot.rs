//! Partition finalization
//!
//! At the end of a partition the rendered page is scanned once more, links
//! seen in the markup are reconciled with links seen in API traffic, and the
//! snapshot, link ledger, and resource manifest are written.

use crate::browser::FeedPage;
use crate::collector::ClassificationRules;
use crate::config::PlatformConfig;
use crate::crawler::scan_page;
use crate::output::{LinkLedger, OutputLayout, ResourceManifest};
use crate::state::{HarvestSession, Partition};
use crate::{BrowserError, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use url::Url;

/// What one partition's finalization wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub snapshot_path: PathBuf,
    pub snapshot_bytes: usize,
    /// Distinct third-party links known for the partition
    pub links_found: usize,
    /// Links that were new to the ledger
    pub links_written: usize,
    /// Video sources added to the media set by the final scan
    pub media_added: usize,
}

/// Writes the per-partition snapshot, link ledger, and manifest
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    rules: ClassificationRules,
}

impl SnapshotWriter {
    pub fn new(platform: &PlatformConfig) -> Self {
        Self {
            rules: ClassificationRules::new(platform),
        }
    }

    /// Finalizes `partition` from the current page state
    ///
    /// The API-observed link set is consumed; media and image sets are left
    /// in place for the download pass.
    pub async fn finalize<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
        session: &mut HarvestSession,
        layout: &OutputLayout,
        partition: &Partition,
    ) -> Result<SnapshotReport> {
        let slug = partition.slug();
        session.drain();

        let html = page.content().await?;
        let page_url = page.current_url().await?;
        let base_url = Url::parse(&page_url).map_err(|e| {
            BrowserError::Protocol(format!("page reported invalid URL {}: {}", page_url, e))
        })?;

        let scan = scan_page(&html, &base_url);
        session.state.merge_titles(scan.titles);

        let mut media_added = 0;
        for src in scan.media_sources {
            if session.state.media.insert(src) {
                media_added += 1;
            }
        }

        let inline: Vec<String> = scan
            .inline_video_links
            .into_iter()
            .filter(|link| self.rules.is_video_link(link))
            .collect();
        let mut links: BTreeSet<String> = scan.embed_links.into_iter().chain(inline).collect();
        links.extend(std::mem::take(&mut session.state.third_party));

        let ledger = LinkLedger::new(layout.ledger_path(&slug));
        let links_written = ledger.append(&links).await?;
        if links_written > 0 {
            tracing::info!(
                "Saved {} third-party link(s) to {}",
                links_written,
                ledger.path().display()
            );
        }

        let snapshot = page.capture_snapshot().await?;
        let snapshot_path = layout.snapshot_path(&slug);
        tokio::fs::write(&snapshot_path, &snapshot).await?;
        tracing::info!("Snapshot saved to {}", snapshot_path.display());

        let manifest = ResourceManifest::from_state(&slug, &session.state);
        manifest.write(&layout.manifest_path(&slug)).await?;
        tracing::debug!(
            "Manifest for {} lists {} media and {} image URL(s)",
            partition.label,
            manifest.media.len(),
            manifest.images.len()
        );

        Ok(SnapshotReport {
            snapshot_path,
            snapshot_bytes: snapshot.len(),
            links_found: links.len(),
            links_written,
            media_added,
        })
    }
}
