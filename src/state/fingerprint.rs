//! Occurrence counters for reply-thread fingerprints
//!
//! Some "Load replies" controls are inert: clicking them re-renders the same
//! thread. A thread is identified by the text of its last rendered reply, so
//! seeing the same text again means the click produced nothing new. Once a
//! fingerprint's counter reaches the limit its control is skipped for the
//! rest of the crawl of that post.

use std::collections::HashMap;

/// Counter value at which a thread's affordance is permanently skipped
pub const MAX_REPLY_RETRIES: u32 = 5;

/// Counter key for one thread state
///
/// `thread` is the engine's structural thread identity when available. Two
/// threads without one that render identical text share a counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FingerprintKey {
    pub thread: Option<String>,
    pub text: String,
}

impl FingerprintKey {
    pub fn new(thread: Option<String>, text: impl Into<String>) -> Self {
        Self {
            thread,
            text: text.into(),
        }
    }
}

/// Monotonic occurrence counters keyed by fingerprint
#[derive(Debug, Clone)]
pub struct RetryLedger {
    counts: HashMap<FingerprintKey, u32>,
    limit: u32,
}

impl Default for RetryLedger {
    fn default() -> Self {
        Self::new(MAX_REPLY_RETRIES)
    }
}

impl RetryLedger {
    pub fn new(limit: u32) -> Self {
        Self {
            counts: HashMap::new(),
            limit,
        }
    }

    /// Increments the counter for `key` and returns the new value
    pub fn bump(&mut self, key: &FingerprintKey) -> u32 {
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Whether an affordance whose counter holds `count` may still be clicked
    pub fn allows(&self, count: u32) -> bool {
        count < self.limit
    }

    pub fn count(&self, key: &FingerprintKey) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of fingerprints that have hit the limit
    pub fn exhausted(&self) -> usize {
        self.counts.values().filter(|c| **c >= self.limit).count()
    }
}
