//! Per-partition resource manifest
//!
//! Written before the download pass so a later run can resume downloads from
//! the run directory alone, without re-crawling.

use crate::state::HarvestState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// File-name suffix identifying manifests in a run directory
pub const MANIFEST_SUFFIX: &str = "-resources.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceManifest {
    /// Partition slug, also the prefix of the partition's output files
    pub partition: String,
    pub created_at: DateTime<Utc>,
    pub media: BTreeSet<String>,
    pub images: BTreeSet<String>,
    /// Post ID -> title, used to name downloaded files
    pub titles: BTreeMap<String, String>,
}

impl ResourceManifest {
    pub fn from_state(partition: &str, state: &HarvestState) -> Self {
        Self {
            partition: partition.to_string(),
            created_at: Utc::now(),
            media: state.media.clone(),
            images: state.images.clone(),
            titles: state
                .titles
                .iter()
                .map(|(id, title)| (id.clone(), title.clone()))
                .collect(),
        }
    }

    /// A harvest state holding this manifest's downloadable resources
    pub fn to_state(&self) -> HarvestState {
        HarvestState {
            titles: self.titles.clone().into_iter().collect(),
            media: self.media.clone(),
            images: self.images.clone(),
            third_party: BTreeSet::new(),
        }
    }

    pub async fn write(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn read(path: &Path) -> crate::Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Manifest files in `run_dir`, sorted by name
    pub async fn find_in(run_dir: &Path) -> crate::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(run_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_manifest = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(MANIFEST_SUFFIX));
            if is_manifest && entry.file_type().await?.is_file() {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}
