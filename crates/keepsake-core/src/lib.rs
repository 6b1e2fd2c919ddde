//! # keepsake-core
//!
//! Core library for Keepsake providing:
//! - Configuration file parsing (keepsake.yaml) with environment overrides
//! - The shared error type
//! - Small filesystem helpers

pub mod config;
pub mod error;
pub mod utils;

pub use config::{BackupInterval, KeepsakeConfig};
pub use error::{Error, Result};
pub use utils::get_home_dir;
