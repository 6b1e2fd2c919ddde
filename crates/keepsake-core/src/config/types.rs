//! Configuration file types (keepsake.yaml)

use crate::error::{Error, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default gzip compression level for artifacts (6 = balanced speed/ratio).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Root of keepsake.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeepsakeConfigFile {
    /// Path to the application's SQLite database
    pub database: Utf8PathBuf,

    /// Where backup artifacts are written
    pub artifacts: ArtifactsConfig,

    /// Settings applied to users who never saved their own
    #[serde(default)]
    pub defaults: BackupDefaults,
}

/// Artifact storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactsConfig {
    /// Root directory for per-user artifact folders
    pub directory: Utf8PathBuf,

    /// Gzip level (1-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

/// Default automatic-backup settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupDefaults {
    #[serde(default)]
    pub auto_backup_enabled: bool,

    #[serde(default)]
    pub interval: BackupInterval,
}

impl Default for BackupDefaults {
    fn default() -> Self {
        Self {
            auto_backup_enabled: false,
            interval: BackupInterval::Weekly,
        }
    }
}

/// How often automatic backups run for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupInterval {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl BackupInterval {
    /// Stable string form, used for storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupInterval::Daily => "daily",
            BackupInterval::Weekly => "weekly",
            BackupInterval::Monthly => "monthly",
        }
    }
}

impl fmt::Display for BackupInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(BackupInterval::Daily),
            "weekly" => Ok(BackupInterval::Weekly),
            "monthly" => Ok(BackupInterval::Monthly),
            _ => Err(Error::invalid_interval(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_str() {
        assert_eq!("daily".parse::<BackupInterval>().unwrap(), BackupInterval::Daily);
        assert_eq!(" Weekly ".parse::<BackupInterval>().unwrap(), BackupInterval::Weekly);
        assert_eq!("MONTHLY".parse::<BackupInterval>().unwrap(), BackupInterval::Monthly);

        let err = "hourly".parse::<BackupInterval>().unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { .. }));
    }

    #[test]
    fn test_interval_display_round_trip() {
        for interval in [
            BackupInterval::Daily,
            BackupInterval::Weekly,
            BackupInterval::Monthly,
        ] {
            assert_eq!(interval.to_string().parse::<BackupInterval>().unwrap(), interval);
        }
    }

    #[test]
    fn test_defaults() {
        let defaults = BackupDefaults::default();
        assert!(!defaults.auto_backup_enabled);
        assert_eq!(defaults.interval, BackupInterval::Weekly);
    }
}
