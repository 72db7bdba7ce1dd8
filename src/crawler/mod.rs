//! Crawler module for walking a rendered feed
//!
//! This module contains the core harvesting logic, including:
//! - Pagination over feed batches with a per-partition post limit
//! - Per-post detail views and discussion expansion
//! - Retry-bounded reply thread expansion
//! - Markup scanning for titles and embedded links
//! - Partition orchestration

mod coordinator;
mod expander;
mod feed;
mod item;
mod parser;

pub use coordinator::Harvester;
pub use expander::{fingerprint, ReplyExpansion, ThreadExpander};
pub use feed::{CrawlReport, FeedCrawler};
pub use item::{ItemProcessor, ItemReport};
pub use parser::{extract_post_id, inline_video_links, scan_page, scan_titles, PageScan};
