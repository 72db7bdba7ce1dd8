//! Passive resource collection from network traffic
//!
//! The rendering engine hands every response it observes to a [`ResponseTap`].
//! The tap classifies it and publishes zero or more [`ResourceEvent`]s on a
//! bounded channel. The harvest loop drains that channel into its
//! [`crate::state::HarvestSession`] at fixed checkpoints, so resource sets
//! are only mutated from the sequential control flow.

mod classify;

pub use classify::{Classification, ClassificationRules};

use crate::config::PlatformConfig;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// A network response as seen by the rendering engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub url: String,
    /// Response body, present only when the tap asked for it
    pub body: Option<String>,
}

impl ObservedResponse {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: None,
        }
    }

    pub fn with_body(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: Some(body.into()),
        }
    }
}

/// A classified resource URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceEvent {
    /// Audio or video file
    Media(String),
    /// Per-post image asset
    Image(String),
    /// Link to a third-party video host
    ThirdPartyLink(String),
}

impl ResourceEvent {
    pub fn url(&self) -> &str {
        match self {
            Self::Media(url) | Self::Image(url) | Self::ThirdPartyLink(url) => url,
        }
    }
}

/// Creates a tap and the receiving end of its event channel
pub fn channel(
    platform: PlatformConfig,
    capacity: usize,
) -> (ResponseTap, mpsc::Receiver<ResourceEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let tap = ResponseTap {
        rules: Arc::new(ClassificationRules::new(&platform)),
        tx,
    };
    (tap, rx)
}

/// Classifies observed responses and publishes resource events
///
/// Cloneable so an engine can attach it to several browsing contexts.
#[derive(Debug, Clone)]
pub struct ResponseTap {
    rules: Arc<ClassificationRules>,
    tx: mpsc::Sender<ResourceEvent>,
}

impl ResponseTap {
    /// Whether the engine should read the body of a response to `url`
    pub fn wants_body(&self, url: &str) -> bool {
        self.rules.classify_url(url).needs_body()
    }

    /// Classifies a response and publishes its events
    ///
    /// Never blocks. Returns the number of events published; events that do
    /// not fit in the channel are dropped with a warning.
    pub fn observe(&self, response: &ObservedResponse) -> usize {
        let mut published = 0;

        for event in self.rules.classify(response) {
            match &event {
                ResourceEvent::Media(url) => {
                    tracing::info!("Captured media URL: {}", strip_query(url))
                }
                ResourceEvent::ThirdPartyLink(url) => {
                    tracing::info!("Captured video link: {}", url)
                }
                ResourceEvent::Image(url) => tracing::debug!("Captured image URL: {}", strip_query(url)),
            }

            match self.tx.try_send(event) {
                Ok(()) => published += 1,
                Err(TrySendError::Full(event)) => {
                    tracing::warn!("Resource event channel full, dropping {}", event.url());
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Resource event channel closed");
                    break;
                }
            }
        }

        published
    }
}

/// URL without its query string, for logging signed URLs
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
