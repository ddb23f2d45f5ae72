//! Configuration module for Quaero
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use quaero::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("quaero.toml")).unwrap();
//! println!("Default crawl depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
