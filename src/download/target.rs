//! Destination naming for downloaded resources
//!
//! A destination is a pure function of the URL, the resource kind and the
//! title index, so a rerun derives the same path and can skip the fetch.

use crate::collector::strip_query;
use crate::output::sanitize_component;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RE_POST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/post/(\d+)/").expect("valid post ID regex"));
static RE_CONTENT_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/post/\d+/([a-f0-9]+)/").expect("valid content hash regex"));
static RE_MEDIA_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mp3|mp4|m4a|wav|ogg|webm|flac)").expect("valid regex"));
static RE_IMAGE_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)").expect("valid regex"));

/// Length of content hashes and fallback hashes in file names
const SHORT_HASH_LEN: usize = 8;

/// Category of a downloadable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Media,
    Image,
}

impl ResourceKind {
    /// Extension used when the URL carries none
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Media => "bin",
            Self::Image => "jpg",
        }
    }

    /// Maximum number of title characters kept in a file name
    pub fn title_limit(&self) -> usize {
        match self {
            Self::Media => 80,
            Self::Image => 60,
        }
    }

    fn extension_pattern(&self) -> &'static Regex {
        match self {
            Self::Media => &RE_MEDIA_EXT,
            Self::Image => &RE_IMAGE_EXT,
        }
    }
}

/// A resource URL paired with its destination file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub kind: ResourceKind,
    pub file_name: String,
    pub dest: PathBuf,
}

impl DownloadTarget {
    /// Derives the destination of `url` inside `dir`
    ///
    /// Media are named `<postId>[ - <title>].<ext>`, images
    /// `<postId>_<hash>[ - <title>].<ext>`.
    pub fn derive(
        url: &str,
        kind: ResourceKind,
        titles: &HashMap<String, String>,
        dir: &Path,
    ) -> Self {
        let post_id = post_id_from_url(url);
        let title = post_id
            .as_deref()
            .and_then(|id| titles.get(id))
            .map(|title| sanitize_title(title, kind.title_limit()))
            .filter(|title| !title.is_empty());

        let stem = match kind {
            ResourceKind::Media => post_id.unwrap_or_else(|| fallback_hash(url)),
            ResourceKind::Image => {
                let hash = content_hash(url).unwrap_or_else(|| fallback_hash(url));
                format!("{}_{}", post_id.unwrap_or_else(|| fallback_hash(url)), hash)
            }
        };

        let name = match title {
            Some(title) => format!("{} - {}", stem, title),
            None => stem,
        };
        let file_name = format!("{}.{}", name, extension_for(url, kind));

        Self {
            url: url.to_string(),
            kind,
            dest: dir.join(&file_name),
            file_name,
        }
    }
}

/// Post ID from a `/post/<digits>/` path segment
pub fn post_id_from_url(url: &str) -> Option<String> {
    RE_POST_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First characters of the content hash segment following the post ID
pub fn content_hash(url: &str) -> Option<String> {
    RE_CONTENT_HASH
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().chars().take(SHORT_HASH_LEN).collect())
}

/// Deterministic stand-in for a missing post ID or content hash
///
/// Signed URLs differ between sessions only in their query string, so the
/// query is ignored.
pub fn fallback_hash(url: &str) -> String {
    let digest = Sha256::digest(strip_query(url).as_bytes());
    hex::encode(digest)[..SHORT_HASH_LEN].to_string()
}

/// Lowercased file extension found in the URL, or the kind's default
pub fn extension_for(url: &str, kind: ResourceKind) -> String {
    kind.extension_pattern()
        .captures(strip_query(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| kind.default_extension().to_string())
}

/// File-name-safe title bounded to `limit` characters
pub fn sanitize_title(title: &str, limit: usize) -> String {
    let safe = sanitize_component(title);
    let bounded: String = safe.chars().take(limit).collect();
    bounded
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}
