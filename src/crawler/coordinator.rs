//! Harvest coordinator - partition orchestration
//!
//! This module drives one harvest run end to end:
//! - Waiting for sign-in and discarding anything captured before it
//! - Discovering the feed's time partitions
//! - Crawling, snapshotting and downloading each partition in turn
//! - Writing the run summary

use crate::browser::{FeedPage, WaitCondition, Waiter, LOGIN_PATH};
use crate::collector::{self, ResponseTap};
use crate::config::{validate, Config};
use crate::crawler::feed::FeedCrawler;
use crate::download::Downloader;
use crate::output::{
    write_markdown_summary, HarvestSummary, OutputLayout, PartitionReport, SnapshotWriter,
};
use crate::state::{HarvestSession, Partition};
use crate::Result;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Main harvest coordinator
///
/// Owns the session state for the whole run. The rendering engine is passed
/// to [`Harvester::run`]; the [`ResponseTap`] returned by
/// [`Harvester::new`] must be attached to it before the run starts.
pub struct Harvester {
    config: Config,
    waiter: Waiter,
    session: HarvestSession,
    layout: OutputLayout,
    snapshots: SnapshotWriter,
    downloader: Downloader,
    started_at: DateTime<Utc>,
    config_hash: Option<String>,
}

impl Harvester {
    /// Creates a harvester and the tap feeding its resource channel
    ///
    /// # Errors
    ///
    /// * `GleanError::Config` - the configuration is invalid
    /// * `GleanError::Http` - the download client could not be built
    pub fn new(config: Config, cancel: CancellationToken) -> Result<(Self, ResponseTap)> {
        validate(&config)?;

        let (tap, events) = collector::channel(config.platform.clone(), config.browser.event_buffer);
        let started_at = Utc::now();
        let layout = OutputLayout::for_run(
            Path::new(&config.output.root),
            &config.harvest.creator,
            started_at,
        );
        let downloader = Downloader::new(&config.download)?.with_cancel(cancel.clone());

        let harvester = Self {
            waiter: Waiter::from_config(&config.browser, cancel),
            session: HarvestSession::new(events),
            snapshots: SnapshotWriter::new(&config.platform),
            layout,
            downloader,
            started_at,
            config_hash: None,
            config,
        };

        Ok((harvester, tap))
    }

    /// Writes into `layout` instead of a fresh timestamped directory
    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Records the hash of the config file in the run summary
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn session(&self) -> &HarvestSession {
        &self.session
    }

    /// Runs the whole harvest against `page`
    pub async fn run<P: FeedPage + ?Sized>(&mut self, page: &mut P) -> Result<HarvestSummary> {
        self.layout.create().await?;
        tracing::info!(
            "Harvesting {} into {}",
            self.config.harvest.creator,
            self.layout.run_dir().display()
        );

        let mut summary = HarvestSummary::new(
            &self.config.harvest.creator,
            self.layout.run_dir(),
            self.started_at,
        );
        summary.config_hash = self.config_hash.clone();

        self.sign_in(page).await?;

        let feed_url = self.config.feed_url();
        tracing::info!("Navigating to {}", feed_url);
        page.navigate(&feed_url).await?;
        self.waiter
            .wait_for(page, &mut self.session, WaitCondition::FeedRendered)
            .await?;

        for partition in self.discover_partitions(page).await? {
            let report = self.harvest_partition(page, &partition).await?;
            summary.partitions.push(report);
        }

        summary.finish();
        write_markdown_summary(&summary, &self.layout.summary_path()).await?;
        tracing::info!(
            "Harvest complete: {} post(s) across {} partition(s)",
            summary.total_items(),
            summary.partitions.len()
        );

        Ok(summary)
    }

    /// Waits for the operator to sign in, then resets the session
    async fn sign_in<P: FeedPage + ?Sized>(&mut self, page: &mut P) -> Result<()> {
        let login_url = self.config.login_url();
        page.navigate(&login_url).await?;

        if page.current_url().await?.contains(LOGIN_PATH) {
            tracing::info!("Please sign in through the browser window. Waiting...");
            self.waiter
                .wait_for(page, &mut self.session, WaitCondition::SignedIn)
                .await?;
        }

        self.session.reset();
        tracing::info!("Signed in.");
        Ok(())
    }

    /// Partitions to harvest, in the order the feed offers them
    pub async fn discover_partitions<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
    ) -> Result<Vec<Partition>> {
        let mut partitions: Vec<Partition> = if self.config.harvest.partition_by_year {
            page.partition_filters()
                .await?
                .into_iter()
                .map(Partition::from_filter)
                .collect()
        } else {
            Vec::new()
        };

        if partitions.is_empty() {
            partitions.push(Partition::all());
        }

        let allow_list = &self.config.harvest.partitions;
        if !allow_list.is_empty() {
            partitions.retain(|p| p.is_all() || p.is_selected(allow_list));
            let labels: Vec<&str> = partitions.iter().map(|p| p.label.as_str()).collect();
            tracing::info!("Filtering to partitions: {}", labels.join(", "));
        }

        Ok(partitions)
    }

    /// Crawls, snapshots and downloads one partition
    pub async fn harvest_partition<P: FeedPage + ?Sized>(
        &mut self,
        page: &mut P,
        partition: &Partition,
    ) -> Result<PartitionReport> {
        let slug = partition.slug();
        tracing::info!("Harvesting partition {}", partition.label);
        self.session.begin_partition(partition);

        match &partition.filter {
            Some(filter) => {
                page.apply_partition_filter(filter).await?;
                tracing::info!("Clicked filter for {}.", partition.label);
            }
            None => page.navigate(&self.config.feed_url()).await?,
        }
        self.waiter
            .wait_for(page, &mut self.session, WaitCondition::FeedRendered)
            .await?;

        let mut crawler = FeedCrawler::new(&self.config, &self.waiter);
        if self.config.output.dump_page_html {
            crawler = crawler.with_debug_dump(self.layout.debug_html_path());
        }
        let crawl = crawler.crawl(page, &mut self.session).await?;

        let snapshot = self
            .snapshots
            .finalize(page, &mut self.session, &self.layout, partition)
            .await?;

        let media_urls = self.session.state.media.len();
        let image_urls = self.session.state.images.len();
        let download = self
            .downloader
            .download_partition(&mut self.session.state, &self.layout, &slug)
            .await?;

        Ok(PartitionReport {
            label: partition.label.clone(),
            slug,
            items_seen: crawl.items_seen,
            items_processed: crawl.items_processed,
            threads_exhausted: crawl.threads_exhausted,
            media_urls,
            image_urls,
            links_found: snapshot.links_found,
            links_written: snapshot.links_written,
            download: Some(download),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{ScriptedFeed, ScriptedItem};
    use crate::browser::PartitionFilter;
    use crate::collector::ObservedResponse;
    use tempfile::TempDir;

    const BASE: &str = "https://www.patreon.com";

    fn harvester(config: Config, dir: &TempDir) -> (Harvester, ResponseTap) {
        let (harvester, tap) = Harvester::new(config, CancellationToken::new()).unwrap();
        (harvester.with_layout(OutputLayout::new(dir.path())), tap)
    }

    fn fast_config(posts: usize) -> Config {
        let mut config = Config::for_creator("somecreator", posts);
        config.browser.poll_interval_ms = 1;
        config.browser.wait_timeout_secs = 5;
        config
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config::for_creator("johndoe", 10);
        assert!(Harvester::new(config, CancellationToken::new()).is_err());
    }

    #[tokio::test]
    async fn test_partition_allow_list() {
        let dir = TempDir::new().unwrap();
        let mut config = fast_config(10);
        config.harvest.partitions = vec!["2023".to_string()];
        let (harvester, _tap) = harvester(config, &dir);

        let mut feed = ScriptedFeed::new(BASE, vec![])
            .with_partition("2024", "4", vec![])
            .with_partition("2023", "3", vec![]);
        let partitions = harvester.discover_partitions(&mut feed).await.unwrap();

        assert_eq!(
            partitions,
            vec![Partition::from_filter(PartitionFilter {
                label: "2023".to_string(),
                value: "3".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn test_no_filters_means_single_partition() {
        let dir = TempDir::new().unwrap();
        let (harvester, _tap) = harvester(fast_config(10), &dir);
        let mut feed = ScriptedFeed::new(BASE, vec![]);

        let partitions = harvester.discover_partitions(&mut feed).await.unwrap();
        assert_eq!(partitions, vec![Partition::all()]);
    }

    #[tokio::test]
    async fn test_partition_resources_do_not_leak() {
        let dir = TempDir::new().unwrap();
        let mut config = fast_config(10);
        config.harvest.capture_detail_views = false;
        let (harvester, tap) = harvester(config, &dir);
        let mut harvester = harvester.with_config_hash("cafe");

        let linked = |id: &str, link: &str| {
            ScriptedItem::new(id, &format!("Post {}", id)).on_render(ObservedResponse::with_body(
                format!("https://www.patreon.com/api/posts/{}", id),
                format!(r#"{{"data":{{"attributes":{{"main_video_url":"{}"}}}}}}"#, link),
            ))
        };
        let mut feed = ScriptedFeed::new(BASE, vec![vec![ScriptedItem::new("1", "Latest")]])
            .with_partition("2024", "4", vec![vec![linked("40", "https://youtu.be/a")]])
            .with_partition("2023", "3", vec![vec![linked("30", "https://youtu.be/b")]]);
        feed.attach(tap);

        let summary = harvester.run(&mut feed).await.unwrap();

        assert_eq!(summary.partitions.len(), 2);
        assert_eq!(summary.config_hash.as_deref(), Some("cafe"));
        let links_2024 = std::fs::read_to_string(dir.path().join("2024-links.txt")).unwrap();
        let links_2023 = std::fs::read_to_string(dir.path().join("2023-links.txt")).unwrap();
        assert_eq!(links_2024, "https://youtu.be/a\n");
        assert_eq!(links_2023, "https://youtu.be/b\n");
        assert!(dir.path().join("summary.md").exists());
    }
}
