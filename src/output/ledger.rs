//! Append-only ledger of third-party links
//!
//! One link per line. A link is appended only if no existing line equals it
//! exactly, so a URL that is a prefix of an already recorded one is still
//! recorded.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct LinkLedger {
    path: PathBuf,
}

impl LinkLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Links already recorded; a missing ledger is empty
    pub async fn load(&self) -> io::Result<HashSet<String>> {
        Ok(parse_lines(&self.read_raw().await?))
    }

    /// Appends every link not yet recorded and returns how many were written
    ///
    /// A ledger whose last line lacks a newline is terminated first.
    pub async fn append<'a, I>(&self, links: I) -> io::Result<usize>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let existing = self.read_raw().await?;
        let mut known = parse_lines(&existing);
        let fresh: Vec<&str> = links
            .into_iter()
            .map(|link| link.trim())
            .filter(|link| !link.is_empty())
            .filter(|link| known.insert(link.to_string()))
            .collect();

        if fresh.is_empty() {
            return Ok(0);
        }

        let mut out = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            out.push('\n');
        }
        for link in &fresh {
            out.push_str(link);
            out.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(out.as_bytes()).await?;
        file.flush().await?;

        Ok(fresh.len())
    }

    async fn read_raw(&self) -> io::Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}

fn parse_lines(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
