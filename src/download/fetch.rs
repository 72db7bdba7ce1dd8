//! HTTP fetching for resource downloads
//!
//! This module handles:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Streaming a response body into a `.part` file
//! - Promoting the `.part` file to its destination only on success

use crate::config::DownloadConfig;
use crate::download::DownloadError;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Builds an HTTP client for downloads
///
/// A `timeout_secs` of 0 sets no total deadline, so large files can stream
/// for as long as they keep arriving. The connect timeout always applies.
///
/// # Example
///
/// ```no_run
/// use gleaner::config::DownloadConfig;
/// use gleaner::download::build_http_client;
///
/// let client = build_http_client(&DownloadConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &DownloadConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true);

    if config.timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(config.timeout_secs));
    }

    builder.build()
}

/// Path of the in-progress file for `dest`
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Streams `url` to `dest` and returns the number of bytes written
///
/// Nothing exists at `dest` unless the whole body arrived. On any failure
/// the `.part` file is removed.
pub async fn fetch_to_file(client: &Client, url: &str, dest: &Path) -> Result<u64, DownloadError> {
    let part = part_path(dest);

    let result = match stream_to(client, url, &part).await {
        Ok(bytes) => tokio::fs::rename(&part, dest)
            .await
            .map(|_| bytes)
            .map_err(DownloadError::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&part).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("Could not remove {}: {}", part.display(), e);
            }
        }
    }

    result
}

async fn stream_to(client: &Client, url: &str, part: &Path) -> Result<u64, DownloadError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status: status.as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}
