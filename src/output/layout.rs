//! Output tree of one harvest run
//!
//! ```text
//! <root>/<creator>/<timestamp>/
//!     <partition>.snapshot
//!     <partition>-links.txt
//!     <partition>-resources.json
//!     <partition>-media/
//!     <partition>-media/images/
//!     summary.md
//!     debug.html
//! ```

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};

/// Characters that are unsafe in file names on common filesystems
const UNSAFE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces path-unsafe and control characters with `_`
///
/// Leading and trailing dots and whitespace are trimmed, so the result can
/// never be `.` or `..` or start a hidden file.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    replaced
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Paths of every file a run produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    run_dir: PathBuf,
}

impl OutputLayout {
    /// Uses an existing run directory, e.g. to resume downloads
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    /// `<root>/<creator>/<timestamp>` for a run started at `started_at`
    pub fn for_run(root: &Path, creator: &str, started_at: DateTime<Utc>) -> Self {
        let stamp = started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
        Self::new(root.join(sanitize_component(creator)).join(stamp))
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Creates the run directory
    pub async fn create(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.run_dir).await
    }

    pub fn snapshot_path(&self, slug: &str) -> PathBuf {
        self.run_dir.join(format!("{}.snapshot", slug))
    }

    pub fn ledger_path(&self, slug: &str) -> PathBuf {
        self.run_dir.join(format!("{}-links.txt", slug))
    }

    pub fn manifest_path(&self, slug: &str) -> PathBuf {
        self.run_dir.join(format!("{}-resources.json", slug))
    }

    pub fn media_dir(&self, slug: &str) -> PathBuf {
        self.run_dir.join(format!("{}-media", slug))
    }

    pub fn image_dir(&self, slug: &str) -> PathBuf {
        self.media_dir(slug).join("images")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join("summary.md")
    }

    pub fn debug_html_path(&self) -> PathBuf {
        self.run_dir.join("debug.html")
    }
}
