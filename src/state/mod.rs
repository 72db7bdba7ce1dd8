//! Per-session harvest state
//!
//! One [`HarvestSession`] lives for the whole run. It owns the title index,
//! the three resource sets, and the receiving end of the resource event
//! channel. Components take it by reference; nothing is global.

mod fingerprint;

pub use fingerprint::{FingerprintKey, RetryLedger, MAX_REPLY_RETRIES};

use crate::browser::PartitionFilter;
use crate::collector::ResourceEvent;
use crate::output::sanitize_component;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::mpsc;

/// Label of the partition covering the whole feed
pub const ALL_PARTITION: &str = "all";

/// Title index and deduplicated resource sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestState {
    /// Post ID -> last rendered title
    pub titles: HashMap<String, String>,
    /// Audio/video file URLs
    pub media: BTreeSet<String>,
    /// Per-post image URLs
    pub images: BTreeSet<String>,
    /// Third-party video links observed through the API
    pub third_party: BTreeSet<String>,
}

impl HarvestState {
    /// Adds an event's URL to its set; returns false if it was already present
    pub fn record(&mut self, event: ResourceEvent) -> bool {
        match event {
            ResourceEvent::Media(url) => self.media.insert(url),
            ResourceEvent::Image(url) => self.images.insert(url),
            ResourceEvent::ThirdPartyLink(url) => self.third_party.insert(url),
        }
    }

    /// Merges (post ID, title) pairs; the latest title for an ID wins
    pub fn merge_titles<I>(&mut self, titles: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut added = 0;
        for (id, title) in titles {
            if self.titles.insert(id, title).is_none() {
                added += 1;
            }
        }
        added
    }

    pub fn title(&self, post_id: &str) -> Option<&str> {
        self.titles.get(post_id).map(String::as_str)
    }

    /// Clears the three resource sets, keeping the title index
    pub fn clear_resources(&mut self) {
        self.media.clear();
        self.images.clear();
        self.third_party.clear();
    }

    /// Clears the resource sets and the title index
    pub fn clear_all(&mut self) {
        self.clear_resources();
        self.titles.clear();
    }

    pub fn resource_count(&self) -> usize {
        self.media.len() + self.images.len() + self.third_party.len()
    }
}

/// Harvest state plus the event channel feeding it
#[derive(Debug)]
pub struct HarvestSession {
    pub state: HarvestState,
    events: mpsc::Receiver<ResourceEvent>,
}

impl HarvestSession {
    pub fn new(events: mpsc::Receiver<ResourceEvent>) -> Self {
        Self {
            state: HarvestState::default(),
            events,
        }
    }

    /// Moves every pending resource event into the state
    ///
    /// Returns the number of URLs that were new to their set.
    pub fn drain(&mut self) -> usize {
        let mut added = 0;
        while let Ok(event) = self.events.try_recv() {
            if self.state.record(event) {
                added += 1;
            }
        }
        added
    }

    /// Discards pending events and clears all state
    ///
    /// Called once sign-in completes, so artifacts of login redirects never
    /// reach the archive.
    pub fn reset(&mut self) {
        while self.events.try_recv().is_ok() {}
        self.state.clear_all();
    }

    /// Starts a partition with empty resource sets
    pub fn begin_partition(&mut self, partition: &Partition) {
        let stale = self.drain();
        if stale > 0 {
            tracing::debug!(
                "Discarding {} resource(s) observed before partition {}",
                stale,
                partition.label
            );
        }
        self.state.clear_resources();
    }
}

/// An isolated scope of the harvest with its own resource sets and output files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub label: String,
    /// Feed filter selecting this partition; `None` for the whole feed
    pub filter: Option<PartitionFilter>,
}

impl Partition {
    /// The partition covering the whole feed
    pub fn all() -> Self {
        Self {
            label: ALL_PARTITION.to_string(),
            filter: None,
        }
    }

    pub fn from_filter(filter: PartitionFilter) -> Self {
        Self {
            label: filter.label.trim().to_string(),
            filter: Some(filter),
        }
    }

    /// File-name-safe form of the label, e.g. "Year 2024" -> "Year2024"
    pub fn slug(&self) -> String {
        let compact: String = self.label.chars().filter(|c| !c.is_whitespace()).collect();
        let slug = sanitize_component(&compact);
        if slug.is_empty() {
            ALL_PARTITION.to_string()
        } else {
            slug
        }
    }

    pub fn is_all(&self) -> bool {
        self.filter.is_none()
    }

    /// Whether this partition passes a label allow-list (empty list allows all)
    pub fn is_selected(&self, allow_list: &[String]) -> bool {
        allow_list.is_empty() || allow_list.iter().any(|wanted| self.label.contains(wanted.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector;
    use crate::collector::ObservedResponse;
    use crate::config::PlatformConfig;

    #[test]
    fn test_record_deduplicates() {
        let mut state = HarvestState::default();
        assert!(state.record(ResourceEvent::Media("a".to_string())));
        assert!(!state.record(ResourceEvent::Media("a".to_string())));
        assert!(state.record(ResourceEvent::Image("a".to_string())));
        assert_eq!(state.media.len(), 1);
        assert_eq!(state.images.len(), 1);
        assert_eq!(state.resource_count(), 2);
    }

    #[test]
    fn test_latest_title_wins() {
        let mut state = HarvestState::default();
        state.merge_titles(vec![("1".to_string(), "Old".to_string())]);
        let added = state.merge_titles(vec![
            ("1".to_string(), "New".to_string()),
            ("2".to_string(), "Two".to_string()),
        ]);
        assert_eq!(added, 1);
        assert_eq!(state.title("1"), Some("New"));
        assert_eq!(state.title("2"), Some("Two"));
        assert_eq!(state.title("3"), None);
    }

    #[tokio::test]
    async fn test_reset_discards_pending_events() {
        let (tap, rx) = collector::channel(PlatformConfig::default(), 8);
        let mut session = HarvestSession::new(rx);
        session
            .state
            .merge_titles(vec![("1".to_string(), "Login".to_string())]);

        tap.observe(&ObservedResponse::new(
            "https://c3.patreonusercontent.com/post/1/login.mp4",
        ));
        session.reset();

        assert_eq!(session.drain(), 0);
        assert_eq!(session.state, HarvestState::default());
    }

    #[tokio::test]
    async fn test_begin_partition_isolates_resources() {
        let (tap, rx) = collector::channel(PlatformConfig::default(), 8);
        let mut session = HarvestSession::new(rx);

        tap.observe(&ObservedResponse::new(
            "https://c3.patreonusercontent.com/post/1/a.mp4",
        ));
        assert_eq!(session.drain(), 1);
        session
            .state
            .merge_titles(vec![("1".to_string(), "Kept".to_string())]);

        tap.observe(&ObservedResponse::new(
            "https://c3.patreonusercontent.com/post/2/b.mp4",
        ));
        session.begin_partition(&Partition::all());

        assert!(session.state.media.is_empty());
        assert_eq!(session.state.title("1"), Some("Kept"));
    }

    #[test]
    fn test_partition_slug() {
        let partition = Partition::from_filter(PartitionFilter {
            label: " Year 2024 ".to_string(),
            value: "2024".to_string(),
        });
        assert_eq!(partition.label, "Year 2024");
        assert_eq!(partition.slug(), "Year2024");

        let hostile = Partition::from_filter(PartitionFilter {
            label: "../2023".to_string(),
            value: "2023".to_string(),
        });
        assert!(!hostile.slug().contains('/'));
        assert!(!hostile.slug().starts_with('.'));

        assert_eq!(Partition::all().slug(), "all");
        assert!(Partition::all().is_all());
    }

    #[test]
    fn test_partition_allow_list() {
        let partition = Partition::from_filter(PartitionFilter {
            label: "2024".to_string(),
            value: "3".to_string(),
        });
        assert!(partition.is_selected(&[]));
        assert!(partition.is_selected(&["2024".to_string()]));
        assert!(!partition.is_selected(&["2023".to_string()]));
    }
}
