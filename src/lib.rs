#![allow(clippy::multiple_crate_versions)]

pub mod artifact;
pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod nets;
pub mod trace;

pub use error::{LensforgeError, Result};
