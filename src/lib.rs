//! Gleaner: a resumable harvester for paginated, authenticated creator feeds
//!
//! This crate drives a rendered feed forward page by page, expands comment and
//! reply threads under bounded retries, collects media, image, and third-party
//! video links from both network traffic and rendered markup, and persists a
//! deduplicated archive that can be resumed without refetching existing files.

pub mod browser;
pub mod collector;
pub mod config;
pub mod crawler;
pub mod download;
pub mod output;
pub mod state;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Gleaner operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Could not find {what}")]
    MissingElement { what: String },

    #[error("Error occurred while processing post {index}: {source}")]
    Item {
        index: usize,
        #[source]
        source: Box<GleanError>,
    },

    #[error("Timed out after {waited:?} waiting for {condition}")]
    Timeout {
        condition: browser::WaitCondition,
        waited: Duration,
    },

    #[error("Harvest cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GleanError {
    /// Wraps an error with the index of the feed item being processed
    ///
    /// Cancellation is not an item failure and passes through unwrapped.
    pub fn in_item(self, index: usize) -> Self {
        match self {
            GleanError::Cancelled => self,
            other => GleanError::Item {
                index,
                source: Box::new(other),
            },
        }
    }

    /// Whether the run stopped because its cancellation token fired
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GleanError::Cancelled)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors reported by the rendering engine behind [`browser::FeedPage`]
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Could not find {0}")]
    MissingElement(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Browser session closed")]
    Closed,
}

/// Result type alias for Gleaner operations
pub type Result<T> = std::result::Result<T, GleanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for rendering engine operations
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

// Re-export commonly used types
pub use browser::{FeedPage, WaitCondition, Waiter};
pub use collector::{ResourceEvent, ResponseTap};
pub use config::Config;
pub use crawler::Harvester;
pub use download::Downloader;
pub use state::{HarvestSession, HarvestState, Partition};
