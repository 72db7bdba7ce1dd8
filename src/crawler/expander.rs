//! Comment and reply expansion for one feed item
//!
//! Comments expose a reliable "exhausted" signal, so that loop simply clicks
//! until the control goes away. "Load replies" controls do not: some are
//! inert and re-render the same thread forever. The replies loop therefore
//! fingerprints every thread before each pass and stops clicking a thread
//! whose fingerprint has been seen [`MAX_REPLY_RETRIES`] times.
//!
//! [`MAX_REPLY_RETRIES`]: crate::state::MAX_REPLY_RETRIES

use crate::browser::{ControlState, FeedPage, ReplyAffordance, WaitCondition, Waiter};
use crate::state::{FingerprintKey, HarvestSession, RetryLedger};
use crate::{GleanError, Result};

/// Result of expanding the reply threads of one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyExpansion {
    pub clicks: usize,
    pub passes: usize,
    /// Fingerprints that hit the retry limit
    pub exhausted: usize,
}

/// Computes the progress fingerprint of a reply affordance
///
/// Uses the last rendered reply, falling back to the first child of the
/// thread's parent container.
pub fn fingerprint(affordance: &ReplyAffordance) -> Result<FingerprintKey> {
    let primary = affordance.last_reply_text.trim();
    let text = if !primary.is_empty() {
        primary
    } else {
        affordance
            .parent_reference_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GleanError::MissingElement {
                what: "text to be a reference point".to_string(),
            })?
    };

    Ok(FingerprintKey::new(affordance.thread.clone(), text))
}

/// Drives the expansion loops of a single item
#[derive(Debug, Clone, Copy)]
pub struct ThreadExpander<'a> {
    waiter: &'a Waiter,
}

impl<'a> ThreadExpander<'a> {
    pub fn new(waiter: &'a Waiter) -> Self {
        Self { waiter }
    }

    /// Clicks "load more comments" until the control is absent or exhausted
    ///
    /// Returns the number of clicks.
    pub async fn expand_comments<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
        session: &mut HarvestSession,
        index: usize,
    ) -> Result<usize> {
        let mut clicks = 0;

        loop {
            self.waiter.check_cancelled()?;

            match page.comments_control(index).await? {
                ControlState::Absent | ControlState::Exhausted => {
                    tracing::info!("Post {}: All comments loaded.", index);
                    return Ok(clicks);
                }
                ControlState::Loading => {}
                ControlState::Ready => {
                    page.click_load_more_comments(index).await?;
                    clicks += 1;
                    tracing::debug!("Post {}: Clicked load more comments.", index);
                }
            }

            self.waiter
                .wait_for(page, session, WaitCondition::CommentsSettled(index))
                .await?;
        }
    }

    /// Clicks "Load replies" controls until none qualifies
    ///
    /// A thread's counter is bumped once when its control is enumerated and
    /// once after it is clicked; the control is only clicked while the count
    /// after enumeration stays below the retry limit.
    pub async fn expand_replies<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
        session: &mut HarvestSession,
        index: usize,
    ) -> Result<ReplyExpansion> {
        let mut ledger = RetryLedger::default();
        let mut expansion = ReplyExpansion::default();

        loop {
            self.waiter.check_cancelled()?;
            expansion.passes += 1;

            let mut queue: Vec<(ReplyAffordance, FingerprintKey)> = Vec::new();
            for affordance in page.reply_affordances(index).await? {
                let key = fingerprint(&affordance)?;
                let count = ledger.bump(&key);
                if ledger.allows(count) {
                    queue.push((affordance, key));
                } else {
                    tracing::debug!(
                        "Post {}: Load replies button reached max retries, skipping. Last reply: {}",
                        index,
                        key.text
                    );
                }
            }

            if queue.is_empty() {
                tracing::info!("Post {}: All replies loaded.", index);
                break;
            }

            for (affordance, key) in queue {
                page.click_reply_affordance(index, &affordance).await?;
                ledger.bump(&key);
                expansion.clicks += 1;
                tracing::debug!("Post {}: Clicked load replies.", index);

                self.waiter
                    .wait_for(page, session, WaitCondition::RepliesSettled(index))
                    .await?;
            }
        }

        expansion.exhausted = ledger.exhausted();
        Ok(expansion)
    }
}
