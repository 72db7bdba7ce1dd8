//! Top-level pagination over a partition's feed

use crate::browser::{FeedPage, WaitCondition, Waiter};
use crate::config::Config;
use crate::crawler::item::ItemProcessor;
use crate::crawler::parser::scan_titles;
use crate::state::HarvestSession;
use crate::Result;
use std::path::PathBuf;

/// Counts for one partition's crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Items walked, including skipped ones
    pub items_seen: usize,
    pub items_processed: usize,
    pub batches: usize,
    pub comment_clicks: usize,
    pub reply_clicks: usize,
    pub threads_exhausted: usize,
}

/// Walks the feed batch by batch, processing items in encounter order
#[derive(Debug, Clone)]
pub struct FeedCrawler<'a> {
    config: &'a Config,
    waiter: &'a Waiter,
    debug_html: Option<PathBuf>,
}

impl<'a> FeedCrawler<'a> {
    pub fn new(config: &'a Config, waiter: &'a Waiter) -> Self {
        Self {
            config,
            waiter,
            debug_html: None,
        }
    }

    /// Writes the rendered markup to `path` before each batch
    pub fn with_debug_dump(mut self, path: PathBuf) -> Self {
        self.debug_html = Some(path);
        self
    }

    /// Crawls until the post limit is reached or the feed runs out
    ///
    /// The limit applies mid-batch: with a limit of N, item N-1 is the last
    /// one touched even if more are rendered.
    pub async fn crawl<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
        session: &mut HarvestSession,
    ) -> Result<CrawlReport> {
        let stop = self.config.harvest.posts_per_partition;
        let debug = &self.config.debug;
        let processor = ItemProcessor::new(self.config, self.waiter);
        let mut report = CrawlReport::default();
        let mut index = 0;

        loop {
            self.waiter.check_cancelled()?;

            let html = page.content().await?;
            if let Some(path) = &self.debug_html {
                tokio::fs::write(path, &html).await?;
                tracing::debug!("Dumped page HTML to {}", path.display());
            }

            let count = page.item_count().await?;
            let new_titles = session.state.merge_titles(scan_titles(&html));
            report.batches += 1;
            tracing::info!("Found {} posts ({} new titles).", count, new_titles);

            let end = count.min(stop);
            if end > index {
                tracing::info!("Processing post {} to {}...", index, end - 1);
            }

            while index < end {
                let selected =
                    debug.post_allow_list.is_empty() || debug.post_allow_list.contains(&index);
                if debug.process_posts && selected {
                    let item = processor.process(page, session, index).await?;
                    report.items_processed += 1;
                    report.comment_clicks += item.comment_clicks;
                    report.reply_clicks += item.replies.clicks;
                    report.threads_exhausted += item.replies.exhausted;
                } else if debug.process_posts {
                    tracing::info!("Post {}: Skipped.", index);
                }

                session.drain();
                index += 1;
                report.items_seen += 1;
            }

            if index >= stop {
                tracing::info!("Reached post limit of {}.", stop);
                break;
            }

            tracing::info!("Clicking button to load more posts...");
            if !page.load_more_items().await? {
                tracing::info!("All posts loaded.");
                break;
            }

            self.waiter
                .wait_for(page, session, WaitCondition::FeedGrewBeyond(index))
                .await?;
        }

        Ok(report)
    }
}
