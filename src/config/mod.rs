//! Configuration module for lensforge
//!
//! Loads config from `$XDG_CONFIG_HOME/lensforge/config.toml` or `~/.config/lensforge/config.toml`.
//! Falls back to embedded defaults if file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use lensforge::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Output dir: {}", config.output.dir.display());
//! println!("Author: {}", config.metadata.author);
//! ```

pub mod schema;

pub use schema::Config;
