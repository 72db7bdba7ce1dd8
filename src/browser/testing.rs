//! In-memory feed engine for unit and integration tests
//!
//! [`ScriptedFeed`] implements [`FeedPage`] over a script of item batches.
//! Each item can carry comment pages, reply threads (including inert
//! "phantom" threads whose control never produces new replies), extra card
//! markup, and network responses that are pushed through an attached
//! [`ResponseTap`] when the item renders or its detail view opens.
//!
//! The binary never constructs it. It is public so `tests/` and embedding
//! layers can run a [`crate::Harvester`] without a browser.

use crate::browser::{ControlState, FeedPage, PartitionFilter, ReplyAffordance, LOGIN_PATH};
use crate::collector::{ObservedResponse, ResponseTap};
use crate::{BrowserError, BrowserResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// A scripted reply thread
#[derive(Debug, Clone, Default)]
pub struct ScriptedThread {
    key: Option<String>,
    parent_text: Option<String>,
    replies: Vec<String>,
    hidden: VecDeque<Vec<String>>,
    phantom: bool,
    clicks: usize,
}

impl ScriptedThread {
    /// A thread under a comment whose text is `parent_text`
    pub fn new(parent_text: &str) -> Self {
        Self {
            parent_text: Some(parent_text.to_string()),
            ..Self::default()
        }
    }

    /// A thread whose parent container has no text
    pub fn without_parent() -> Self {
        Self::default()
    }

    /// Gives the thread a structural identity
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Replies rendered before any click
    pub fn with_replies(mut self, replies: &[&str]) -> Self {
        self.replies = replies.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Replies revealed by one click of "Load replies"
    pub fn with_hidden_batch(mut self, batch: &[&str]) -> Self {
        self.hidden
            .push_back(batch.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Keeps the "Load replies" control rendered after every batch is shown
    pub fn phantom(mut self) -> Self {
        self.phantom = true;
        self
    }

    /// Number of times the thread's control was clicked
    pub fn clicks(&self) -> usize {
        self.clicks
    }

    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    fn has_affordance(&self) -> bool {
        !self.hidden.is_empty() || self.phantom
    }

    fn expand(&mut self) {
        self.clicks += 1;
        if let Some(batch) = self.hidden.pop_front() {
            self.replies.extend(batch);
        }
    }
}

/// A scripted feed item
#[derive(Debug, Clone, Default)]
pub struct ScriptedItem {
    id: String,
    title: String,
    markup: String,
    has_permalink: bool,
    comment_pages: usize,
    comment_clicks: usize,
    exhausted_control: bool,
    threads: Vec<ScriptedThread>,
    on_render: Vec<ObservedResponse>,
    on_detail: Vec<ObservedResponse>,
}

impl ScriptedItem {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            has_permalink: true,
            ..Self::default()
        }
    }

    /// Extra markup rendered inside the item card
    pub fn with_markup(mut self, markup: &str) -> Self {
        self.markup.push_str(markup);
        self
    }

    /// Number of "load more comments" clicks before comments are exhausted
    pub fn with_comment_pages(mut self, pages: usize) -> Self {
        self.comment_pages = pages;
        self
    }

    /// Leaves a disabled comments control rendered after exhaustion
    pub fn with_exhausted_comments_control(mut self) -> Self {
        self.exhausted_control = true;
        self
    }

    pub fn with_thread(mut self, thread: ScriptedThread) -> Self {
        self.threads.push(thread);
        self
    }

    /// Response observed when the item renders in the feed
    pub fn on_render(mut self, response: ObservedResponse) -> Self {
        self.on_render.push(response);
        self
    }

    /// Response observed when the item's detail view opens
    pub fn on_detail(mut self, response: ObservedResponse) -> Self {
        self.on_detail.push(response);
        self
    }

    pub fn without_permalink(mut self) -> Self {
        self.has_permalink = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn comment_clicks(&self) -> usize {
        self.comment_clicks
    }

    pub fn threads(&self) -> &[ScriptedThread] {
        &self.threads
    }

    fn permalink(&self, base_url: &str) -> String {
        let slug: String = self
            .title
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        if slug.is_empty() {
            format!("{}/posts/{}", base_url, self.id)
        } else {
            format!("{}/posts/{}-{}", base_url, slug, self.id)
        }
    }
}

/// A feed engine driven entirely by its script
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    base_url: String,
    url: String,
    tap: Option<ResponseTap>,
    feed_container: bool,
    rendered: Vec<ScriptedItem>,
    pending: VecDeque<Vec<ScriptedItem>>,
    partitions: Vec<(PartitionFilter, Vec<Vec<ScriptedItem>>)>,
    sign_in_polls: Option<usize>,
    login_noise: Vec<ObservedResponse>,
    settle_polls: usize,
    comments_loading: HashMap<usize, usize>,
    replies_loading: HashMap<usize, usize>,
    fail_detail_views: bool,
    load_more_clicks: usize,
    detail_views: Vec<String>,
    page_markup: String,
}

impl ScriptedFeed {
    /// A feed whose first batch is rendered and the rest load on demand
    pub fn new(base_url: &str, batches: Vec<Vec<ScriptedItem>>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let mut feed = Self {
            url: base_url.clone(),
            base_url,
            feed_container: true,
            ..Self::default()
        };
        feed.load_batches(batches);
        feed
    }

    /// Adds a time-period partition with its own batches
    pub fn with_partition(
        mut self,
        label: &str,
        value: &str,
        batches: Vec<Vec<ScriptedItem>>,
    ) -> Self {
        let filter = PartitionFilter {
            label: label.to_string(),
            value: value.to_string(),
        };
        self.partitions.push((filter, batches));
        self
    }

    /// Stays on the sign-in page for `polls` URL checks
    pub fn requiring_sign_in(mut self, polls: usize) -> Self {
        self.sign_in_polls = Some(polls);
        self
    }

    /// Responses observed while the sign-in page loads
    pub fn with_login_noise(mut self, response: ObservedResponse) -> Self {
        self.login_noise.push(response);
        self
    }

    /// Number of polls a control reports as loading after each click
    pub fn with_settle_polls(mut self, polls: usize) -> Self {
        self.settle_polls = polls;
        self
    }

    /// Markup rendered outside the feed, e.g. inlined JSON
    pub fn with_page_markup(mut self, markup: &str) -> Self {
        self.page_markup.push_str(markup);
        self
    }

    pub fn failing_detail_views(mut self) -> Self {
        self.fail_detail_views = true;
        self
    }

    pub fn without_feed_container(mut self) -> Self {
        self.feed_container = false;
        self
    }

    /// Connects the engine's network observation to a tap
    pub fn attach(&mut self, tap: ResponseTap) {
        self.tap = Some(tap);
    }

    pub fn rendered(&self) -> &[ScriptedItem] {
        &self.rendered
    }

    pub fn item(&self, id: &str) -> Option<&ScriptedItem> {
        self.rendered.iter().find(|item| item.id == id)
    }

    pub fn load_more_clicks(&self) -> usize {
        self.load_more_clicks
    }

    pub fn detail_views(&self) -> &[String] {
        &self.detail_views
    }

    fn load_batches(&mut self, batches: Vec<Vec<ScriptedItem>>) {
        let mut batches: VecDeque<Vec<ScriptedItem>> = batches.into();
        self.rendered = batches.pop_front().unwrap_or_default();
        self.pending = batches;
        self.comments_loading.clear();
        self.replies_loading.clear();

        self.emit_rendered();
    }

    /// Replays the responses of every rendered item, as a page load would
    fn emit_rendered(&self) {
        let rendered: Vec<ObservedResponse> = self
            .rendered
            .iter()
            .flat_map(|item| item.on_render.clone())
            .collect();
        self.emit(&rendered);
    }

    fn emit(&self, responses: &[ObservedResponse]) {
        if let Some(tap) = &self.tap {
            for response in responses {
                tap.observe(response);
            }
        }
    }

    fn feed(&self) -> BrowserResult<()> {
        if self.feed_container {
            Ok(())
        } else {
            Err(BrowserError::MissingElement("post feed".to_string()))
        }
    }

    fn item_at(&mut self, index: usize) -> BrowserResult<&mut ScriptedItem> {
        self.feed()?;
        self.rendered
            .get_mut(index)
            .ok_or_else(|| BrowserError::MissingElement(format!("post {}", index)))
    }

    fn on_login_page(&self) -> bool {
        self.url.ends_with(LOGIN_PATH)
    }

    fn tick(counters: &mut HashMap<usize, usize>, index: usize) -> bool {
        match counters.get_mut(&index) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl FeedPage for ScriptedFeed {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.url = url.to_string();
        if self.on_login_page() {
            let noise = self.login_noise.clone();
            self.emit(&noise);
            if self.sign_in_polls.is_none() {
                self.url = format!("{}/home", self.base_url);
            }
        } else {
            self.emit_rendered();
        }
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        if self.on_login_page() {
            match self.sign_in_polls {
                Some(0) => {
                    self.sign_in_polls = None;
                    self.url = format!("{}/home", self.base_url);
                }
                Some(n) => self.sign_in_polls = Some(n - 1),
                None => {}
            }
        }
        Ok(self.url.clone())
    }

    async fn content(&mut self) -> BrowserResult<String> {
        let mut html = String::from("<html><head><title>Feed</title></head><body>");
        if self.feed_container {
            html.push_str("<div data-cardlayout-edgeless=\"true\">");
            for item in &self.rendered {
                html.push_str("<div><div data-tag=\"post-card\"><span data-tag=\"post-title\">");
                if item.has_permalink {
                    html.push_str(&format!(
                        "<a href=\"{}\">{}</a>",
                        escape_html(&item.permalink(&self.base_url)),
                        escape_html(&item.title)
                    ));
                } else {
                    html.push_str(&escape_html(&item.title));
                }
                html.push_str("</span>");
                html.push_str(&item.markup);
                html.push_str("</div></div>");
            }
            html.push_str("</div>");
        }
        html.push_str(&self.page_markup);
        html.push_str("</body></html>");
        Ok(html)
    }

    async fn partition_filters(&mut self) -> BrowserResult<Vec<PartitionFilter>> {
        Ok(self.partitions.iter().map(|(f, _)| f.clone()).collect())
    }

    async fn apply_partition_filter(&mut self, filter: &PartitionFilter) -> BrowserResult<()> {
        let batches = self
            .partitions
            .iter_mut()
            .find(|(f, _)| f.value == filter.value)
            .map(|(_, batches)| std::mem::take(batches))
            .ok_or_else(|| BrowserError::MissingElement(format!("filter {}", filter.label)))?;
        self.load_batches(batches);
        Ok(())
    }

    async fn item_count(&mut self) -> BrowserResult<usize> {
        self.feed()?;
        Ok(self.rendered.len())
    }

    async fn item_permalink(&mut self, index: usize) -> BrowserResult<Option<String>> {
        let base_url = self.base_url.clone();
        let item = self.item_at(index)?;
        Ok(item.has_permalink.then(|| item.permalink(&base_url)))
    }

    async fn scroll_to_item(&mut self, index: usize) -> BrowserResult<()> {
        self.item_at(index).map(|_| ())
    }

    async fn load_more_items(&mut self) -> BrowserResult<bool> {
        self.feed()?;
        let Some(batch) = self.pending.pop_front() else {
            return Ok(false);
        };
        self.load_more_clicks += 1;
        let responses: Vec<ObservedResponse> =
            batch.iter().flat_map(|item| item.on_render.clone()).collect();
        self.rendered.extend(batch);
        self.emit(&responses);
        Ok(true)
    }

    async fn open_detail_view(&mut self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        if self.fail_detail_views {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "net::ERR_TIMED_OUT".to_string(),
            });
        }
        self.detail_views.push(url.to_string());
        let responses: Vec<ObservedResponse> = self
            .rendered
            .iter()
            .filter(|item| item.has_permalink && item.permalink(&self.base_url) == url)
            .flat_map(|item| item.on_detail.clone())
            .collect();
        self.emit(&responses);
        Ok(())
    }

    async fn comments_control(&mut self, index: usize) -> BrowserResult<ControlState> {
        self.item_at(index)?;
        if Self::tick(&mut self.comments_loading, index) {
            return Ok(ControlState::Loading);
        }
        let item = self.item_at(index)?;
        Ok(if item.comment_pages > 0 {
            ControlState::Ready
        } else if item.exhausted_control {
            ControlState::Exhausted
        } else {
            ControlState::Absent
        })
    }

    async fn click_load_more_comments(&mut self, index: usize) -> BrowserResult<()> {
        let settle = self.settle_polls;
        let item = self.item_at(index)?;
        if item.comment_pages == 0 {
            return Err(BrowserError::MissingElement("load more comments button".to_string()));
        }
        item.comment_pages -= 1;
        item.comment_clicks += 1;
        self.comments_loading.insert(index, settle);
        Ok(())
    }

    async fn reply_affordances(&mut self, index: usize) -> BrowserResult<Vec<ReplyAffordance>> {
        let item = self.item_at(index)?;
        Ok(item
            .threads
            .iter()
            .enumerate()
            .filter(|(_, thread)| thread.has_affordance())
            .map(|(handle, thread)| ReplyAffordance {
                handle,
                thread: thread.key.clone(),
                last_reply_text: thread.replies.last().cloned().unwrap_or_default(),
                parent_reference_text: thread.parent_text.clone(),
            })
            .collect())
    }

    async fn click_reply_affordance(
        &mut self,
        index: usize,
        affordance: &ReplyAffordance,
    ) -> BrowserResult<()> {
        let settle = self.settle_polls;
        let item = self.item_at(index)?;
        let thread = item
            .threads
            .get_mut(affordance.handle)
            .filter(|thread| thread.has_affordance())
            .ok_or_else(|| BrowserError::MissingElement("load replies button".to_string()))?;
        thread.expand();
        self.replies_loading.insert(index, settle);
        Ok(())
    }

    async fn is_loading(&mut self, index: usize) -> BrowserResult<bool> {
        self.item_at(index)?;
        Ok(Self::tick(&mut self.replies_loading, index))
    }

    async fn capture_snapshot(&mut self) -> BrowserResult<Vec<u8>> {
        let content = self.content().await?;
        Ok(format!(
            "From: <Saved by Blink>\r\nSnapshot-Content-Location: {}\r\nMIME-Version: 1.0\r\n\r\n{}",
            self.url, content
        )
        .into_bytes())
    }
}
