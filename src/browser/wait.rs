//! Bounded, cancellable waits on rendered page state

use crate::browser::{ControlState, FeedPage, WaitCondition, LOGIN_PATH};
use crate::config::BrowserConfig;
use crate::state::HarvestSession;
use crate::{BrowserError, BrowserResult, GleanError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Evaluates a wait condition once against the page
pub async fn condition_met<P: FeedPage + ?Sized>(
    page: &mut P,
    condition: &WaitCondition,
) -> BrowserResult<bool> {
    match condition {
        WaitCondition::SignedIn => Ok(!page.current_url().await?.contains(LOGIN_PATH)),
        WaitCondition::FeedRendered => match page.item_count().await {
            Ok(count) => Ok(count > 0),
            // The feed container appears asynchronously after navigation
            Err(BrowserError::MissingElement(_)) => Ok(false),
            Err(e) => Err(e),
        },
        WaitCondition::FeedGrewBeyond(n) => Ok(page.item_count().await? > *n),
        WaitCondition::CommentsSettled(index) => {
            Ok(page.comments_control(*index).await? != ControlState::Loading)
        }
        WaitCondition::RepliesSettled(index) => Ok(!page.is_loading(*index).await?),
    }
}

/// Polls wait conditions with a timeout and a cancellation token
///
/// Every poll is also a checkpoint at which pending resource events are
/// drained into the session.
#[derive(Debug, Clone)]
pub struct Waiter {
    timeout: Option<Duration>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Waiter {
    /// Creates a waiter; `timeout = None` waits indefinitely
    pub fn new(timeout: Option<Duration>, poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            timeout,
            poll_interval,
            cancel,
        }
    }

    /// Creates a waiter from the `[browser]` configuration section
    pub fn from_config(config: &BrowserConfig, cancel: CancellationToken) -> Self {
        let timeout = match config.wait_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self::new(timeout, Duration::from_millis(config.poll_interval_ms), cancel)
    }

    /// The token that aborts every wait started by this waiter
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `Err(Cancelled)` once the token has fired
    pub fn check_cancelled(&self) -> Result<(), GleanError> {
        if self.cancel.is_cancelled() {
            Err(GleanError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Waits until `condition` holds on the page
    ///
    /// # Errors
    ///
    /// * `GleanError::Timeout` - the condition did not hold within the timeout
    /// * `GleanError::Cancelled` - the cancellation token fired
    /// * `GleanError::Browser` - the engine failed while evaluating the condition
    pub async fn wait_for<P: FeedPage + ?Sized>(
        &self,
        page: &mut P,
        session: &mut HarvestSession,
        condition: WaitCondition,
    ) -> Result<(), GleanError> {
        let started = Instant::now();

        loop {
            self.check_cancelled()?;
            session.drain();

            if condition_met(page, &condition).await? {
                return Ok(());
            }

            let waited = started.elapsed();
            if let Some(limit) = self.timeout {
                if waited >= limit {
                    return Err(GleanError::Timeout { condition, waited });
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(GleanError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{ScriptedFeed, ScriptedItem};
    use crate::collector;
    use crate::config::PlatformConfig;

    const BASE: &str = "https://feed.example.com";

    fn session() -> HarvestSession {
        let (_tap, events) = collector::channel(PlatformConfig::default(), 8);
        HarvestSession::new(events)
    }

    fn waiter(timeout_ms: Option<u64>) -> Waiter {
        Waiter::new(
            timeout_ms.map(Duration::from_millis),
            Duration::from_millis(1),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_condition_already_met() {
        let mut feed = ScriptedFeed::new(BASE, vec![vec![ScriptedItem::new("1", "One")]]);
        let mut session = session();
        waiter(Some(50))
            .wait_for(&mut feed, &mut session, WaitCondition::FeedRendered)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let mut feed = ScriptedFeed::new(BASE, vec![vec![ScriptedItem::new("1", "One")]]);
        let mut session = session();
        let err = waiter(Some(20))
            .wait_for(&mut feed, &mut session, WaitCondition::FeedGrewBeyond(5))
            .await
            .unwrap_err();

        match err {
            GleanError::Timeout { condition, waited } => {
                assert_eq!(condition, WaitCondition::FeedGrewBeyond(5));
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_aborts_unbounded_wait() {
        let mut feed = ScriptedFeed::new(BASE, vec![vec![ScriptedItem::new("1", "One")]]);
        let mut session = session();
        let waiter = waiter(None);
        let token = waiter.cancel_token().clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let err = waiter
            .wait_for(&mut feed, &mut session, WaitCondition::FeedGrewBeyond(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GleanError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_feed_is_not_rendered_yet() {
        let mut feed = ScriptedFeed::new(BASE, vec![]).without_feed_container();
        let ok = condition_met(&mut feed, &WaitCondition::FeedRendered)
            .await
            .unwrap();
        assert!(!ok);

        let err = condition_met(&mut feed, &WaitCondition::FeedGrewBeyond(0)).await;
        assert!(matches!(err, Err(BrowserError::MissingElement(_))));
    }

    #[test]
    fn test_from_config_zero_is_unbounded() {
        let mut config = BrowserConfig::default();
        config.wait_timeout_secs = 0;
        let waiter = Waiter::from_config(&config, CancellationToken::new());
        assert!(waiter.timeout.is_none());

        config.wait_timeout_secs = 3;
        let waiter = Waiter::from_config(&config, CancellationToken::new());
        assert_eq!(waiter.timeout, Some(Duration::from_secs(3)));
    }
}
