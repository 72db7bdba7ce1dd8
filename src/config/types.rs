use serde::Deserialize;

/// Main configuration structure for Gleaner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

/// What to harvest and how deep to go
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Feed owner identifier (https://www.patreon.com/johndoe -> johndoe)
    pub creator: String,

    /// Split the feed into one partition per year
    #[serde(rename = "partition-by-year", default = "default_true")]
    pub partition_by_year: bool,

    /// Only harvest partitions whose label contains one of these strings
    #[serde(default)]
    pub partitions: Vec<String>,

    /// Number of posts to process per partition
    #[serde(rename = "posts-per-partition")]
    pub posts_per_partition: usize,

    /// Expand "load more comments" on every post
    #[serde(rename = "scrape-comments", default = "default_true")]
    pub scrape_comments: bool,

    /// Expand "Load replies" on every comment thread
    #[serde(rename = "scrape-replies", default = "default_true")]
    pub scrape_replies: bool,

    /// Open each post's own page so its API traffic can be observed
    #[serde(rename = "capture-detail-views", default = "default_true")]
    pub capture_detail_views: bool,
}

/// Wait and event-channel tuning for the rendering engine
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Upper bound for any single DOM wait, in seconds (0 = unbounded)
    #[serde(rename = "wait-timeout-secs", default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Delay between wait predicate evaluations (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Navigation timeout for a post's detail view
    #[serde(rename = "detail-view-timeout-secs", default = "default_detail_timeout")]
    pub detail_view_timeout_secs: u64,

    /// Capacity of the resource event channel
    #[serde(rename = "event-buffer", default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// Hosts and endpoints of the harvested platform
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Host serving uploaded audio/video files
    #[serde(rename = "user-content-host", default = "default_user_content_host")]
    pub user_content_host: String,

    /// Hosts whose links count as third-party video links
    #[serde(rename = "video-hosts", default = "default_video_hosts")]
    pub video_hosts: Vec<String>,
}

/// Output tree configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory; runs land in `<root>/<creator>/<timestamp>`
    #[serde(default = "default_output_root")]
    pub root: String,

    /// Write the rendered markup to `debug.html` before each batch
    #[serde(rename = "dump-page-html", default)]
    pub dump_page_html: bool,
}

/// HTTP settings for the download pass
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total deadline per file, body included; 0 disables it
    #[serde(rename = "timeout-secs", default = "default_download_timeout")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Switches for testing pagination and single posts
#[derive(Debug, Clone, Deserialize)]
pub struct DebugConfig {
    /// When false, pagination runs without processing any post
    #[serde(rename = "process-posts", default = "default_true")]
    pub process_posts: bool,

    /// Only process posts at these global indices (empty = all)
    #[serde(rename = "post-allow-list", default)]
    pub post_allow_list: Vec<usize>,
}

fn default_true() -> bool {
    true
}

fn default_wait_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    250
}

fn default_detail_timeout() -> u64 {
    15
}

fn default_event_buffer() -> usize {
    1024
}

fn default_base_url() -> String {
    "https://www.patreon.com".to_string()
}

fn default_user_content_host() -> String {
    "patreonusercontent.com".to_string()
}

fn default_video_hosts() -> Vec<String> {
    vec![
        "youtube.com".to_string(),
        "youtu.be".to_string(),
        "vimeo.com".to_string(),
    ]
}

fn default_output_root() -> String {
    "./dist".to_string()
}

fn default_user_agent() -> String {
    format!("gleaner/{}", env!("CARGO_PKG_VERSION"))
}

fn default_download_timeout() -> u64 {
    0
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout(),
            poll_interval_ms: default_poll_interval(),
            detail_view_timeout_secs: default_detail_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_content_host: default_user_content_host(),
            video_hosts: default_video_hosts(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            dump_page_html: false,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_download_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            process_posts: true,
            post_allow_list: Vec::new(),
        }
    }
}

impl Config {
    /// Builds a configuration for `creator` with every optional section defaulted
    pub fn for_creator(creator: &str, posts_per_partition: usize) -> Self {
        Self {
            harvest: HarvestConfig {
                creator: creator.to_string(),
                partition_by_year: true,
                partitions: Vec::new(),
                posts_per_partition,
                scrape_comments: true,
                scrape_replies: true,
                capture_detail_views: true,
            },
            browser: BrowserConfig::default(),
            platform: PlatformConfig::default(),
            output: OutputConfig::default(),
            download: DownloadConfig::default(),
            debug: DebugConfig::default(),
        }
    }

    /// URL of the creator's post feed
    pub fn feed_url(&self) -> String {
        format!(
            "{}/{}/posts",
            self.platform.base_url.trim_end_matches('/'),
            self.harvest.creator
        )
    }

    /// URL of the platform's sign-in page
    pub fn login_url(&self) -> String {
        format!("{}/login", self.platform.base_url.trim_end_matches('/'))
    }
}
