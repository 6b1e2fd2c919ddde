//! Shared utility functions for Keepsake crates

use crate::error::{Error, Result};
use camino::Utf8Path;
use std::fs;
use std::path::PathBuf;

/// Get the user's home directory
///
/// HOME wins over `dirs::home_dir()` so service accounts and containers can
/// point the data directory elsewhere.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    dirs::home_dir().ok_or_else(|| Error::invalid_config("Could not determine home directory"))
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Utf8Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
