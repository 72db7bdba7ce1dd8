//! Configuration module for Gleaner
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use gleaner::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gleaner.toml")).unwrap();
//! println!("Harvesting {} posts per partition", config.harvest.posts_per_partition);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, DebugConfig, DownloadConfig, HarvestConfig, OutputConfig,
    PlatformConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
