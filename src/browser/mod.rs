//! Browsing capability consumed from the rendering engine
//!
//! The harvester never talks to a browser directly. It drives a [`FeedPage`],
//! which an engine integration implements on top of whatever automation
//! protocol it speaks. Element lookup strategy lives behind this trait; the
//! harvester only sees item indices, control states, and affordance handles.
//!
//! Waits for DOM changes go through [`Waiter`], which bounds them with a
//! timeout and a cancellation token.

pub mod testing;
mod wait;

pub use wait::{condition_met, Waiter};

use crate::BrowserResult;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Path fragment present in the URL while the session is unauthenticated
pub const LOGIN_PATH: &str = "/login";

/// State of a post's "load more comments" control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// No control is rendered
    Absent,
    /// The control can be clicked
    Ready,
    /// The control is disabled while a page of comments loads
    Loading,
    /// The control is rendered but permanently disabled
    Exhausted,
}

/// A time-period filter offered by the feed (e.g. one year)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFilter {
    /// Human-readable label, e.g. "2024"
    pub label: String,
    /// Value the engine uses to select this filter
    pub value: String,
}

/// A rendered "Load replies" control and the context needed to fingerprint it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAffordance {
    /// Engine-assigned handle, valid until the item re-renders
    pub handle: usize,
    /// Stable identity of the thread container, when the engine can provide one
    pub thread: Option<String>,
    /// Text of the last rendered reply in the thread (may be empty)
    pub last_reply_text: String,
    /// Text of the first child of the thread's parent container
    pub parent_reference_text: Option<String>,
}

/// A DOM state the harvester waits for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// The page has left the sign-in flow
    SignedIn,
    /// At least one item card is rendered
    FeedRendered,
    /// More than `n` item cards are rendered
    FeedGrewBeyond(usize),
    /// The comments control of item `i` is no longer loading
    CommentsSettled(usize),
    /// No loading indicator is visible inside item `i`
    RepliesSettled(usize),
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedIn => write!(f, "sign-in"),
            Self::FeedRendered => write!(f, "feed to render"),
            Self::FeedGrewBeyond(n) => write!(f, "feed to grow beyond {} posts", n),
            Self::CommentsSettled(i) => write!(f, "comments of post {} to load", i),
            Self::RepliesSettled(i) => write!(f, "replies of post {} to load", i),
        }
    }
}

/// A rendered feed page driven by the harvester
///
/// Indices refer to item cards in feed order, starting at 0. Implementations
/// report a missing feed container or item as [`crate::BrowserError::MissingElement`].
#[async_trait]
pub trait FeedPage: Send {
    /// Navigates the main page to `url`
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Current URL of the main page
    async fn current_url(&mut self) -> BrowserResult<String>;

    /// Full rendered markup of the main page
    async fn content(&mut self) -> BrowserResult<String>;

    /// Time-period filters offered by the feed, newest first
    async fn partition_filters(&mut self) -> BrowserResult<Vec<PartitionFilter>>;

    /// Selects and applies a time-period filter
    async fn apply_partition_filter(&mut self, filter: &PartitionFilter) -> BrowserResult<()>;

    /// Number of item cards currently rendered in the feed
    async fn item_count(&mut self) -> BrowserResult<usize>;

    /// Permalink of the item at `index`, if it has one
    async fn item_permalink(&mut self, index: usize) -> BrowserResult<Option<String>>;

    /// Scrolls the item at `index` into view
    async fn scroll_to_item(&mut self, index: usize) -> BrowserResult<()>;

    /// Clicks the feed's "load more" control; returns false when none is rendered
    async fn load_more_items(&mut self) -> BrowserResult<bool>;

    /// Opens `url` in an isolated browsing context, waits for it to load, and closes it
    async fn open_detail_view(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;

    /// State of the "load more comments" control inside item `index`
    async fn comments_control(&mut self, index: usize) -> BrowserResult<ControlState>;

    /// Clicks the "load more comments" control inside item `index`
    async fn click_load_more_comments(&mut self, index: usize) -> BrowserResult<()>;

    /// Every "Load replies" control currently rendered inside item `index`
    async fn reply_affordances(&mut self, index: usize) -> BrowserResult<Vec<ReplyAffordance>>;

    /// Clicks a reply affordance previously returned for item `index`
    async fn click_reply_affordance(
        &mut self,
        index: usize,
        affordance: &ReplyAffordance,
    ) -> BrowserResult<()>;

    /// Whether a loading indicator is visible inside item `index`
    async fn is_loading(&mut self, index: usize) -> BrowserResult<bool>;

    /// Single-file capture of the rendered page
    async fn capture_snapshot(&mut self) -> BrowserResult<Vec<u8>>;
}
