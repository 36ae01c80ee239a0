//! Configuration module for Pagewell
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pagewell::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagewell.toml")).unwrap();
//! println!("Default cache age: {}s", config.worker.default_cache_age);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, DatabaseConfig, IndexConfig, UserAgentConfig, WorkerConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
