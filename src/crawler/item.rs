//! Per-item processing

use crate::browser::{FeedPage, Waiter};
use crate::config::Config;
use crate::crawler::expander::{ReplyExpansion, ThreadExpander};
use crate::state::HarvestSession;
use crate::Result;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemReport {
    /// Whether the detail view opened successfully
    pub detail_view: bool,
    pub comment_clicks: usize,
    pub replies: ReplyExpansion,
}

/// Opens an item's detail view and expands its discussion
#[derive(Debug, Clone, Copy)]
pub struct ItemProcessor<'a> {
    config: &'a Config,
    waiter: &'a Waiter,
}

impl<'a> ItemProcessor<'a> {
    pub fn new(config: &'a Config, waiter: &'a Waiter) -> Self {
        Self { config, waiter }
    }

    /// Processes the item at `index`
    ///
    /// Detail view failures are ignored. Any other failure is returned
    /// wrapped with the item index.
    pub async fn process<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
        session: &mut HarvestSession,
        index: usize,
    ) -> Result<ItemReport> {
        self.process_inner(page, session, index)
            .await
            .map_err(|e| e.in_item(index))
    }

    async fn process_inner<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
        session: &mut HarvestSession,
        index: usize,
    ) -> Result<ItemReport> {
        let harvest = &self.config.harvest;
        let mut report = ItemReport::default();

        page.scroll_to_item(index).await?;
        let permalink = page.item_permalink(index).await?;

        if harvest.capture_detail_views {
            if let Some(url) = permalink {
                let timeout = Duration::from_secs(self.config.browser.detail_view_timeout_secs);
                match page.open_detail_view(&url, timeout).await {
                    Ok(()) => report.detail_view = true,
                    Err(e) => tracing::debug!("Post {}: Detail view {} failed: {}", index, url, e),
                }
            }
        }
        tracing::info!("Post {}: Full post loaded.", index);

        let expander = ThreadExpander::new(self.waiter);
        if harvest.scrape_comments {
            report.comment_clicks = expander.expand_comments(page, session, index).await?;
        }
        if harvest.scrape_replies {
            report.replies = expander.expand_replies(page, session, index).await?;
        }

        Ok(report)
    }
}
