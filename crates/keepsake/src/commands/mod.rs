//! CLI command implementations

pub mod backup;
pub mod config;
pub mod db;
pub mod restore;
pub mod settings;

use anyhow::{Context, Result};
use camino::Utf8Path;
use keepsake_backup::{BackupService, UserId};
use keepsake_core::KeepsakeConfig;

use crate::cli::UserArgs;

/// Load configuration and open the backup service it describes.
pub(crate) fn open_service(config_path: Option<&Utf8Path>) -> Result<BackupService> {
    let config = KeepsakeConfig::load(config_path).context("Failed to load configuration")?;
    tracing::debug!(
        "Using database {} and artifacts in {}",
        config.database(),
        config.artifact_dir()
    );
    BackupService::from_config(&config)
        .with_context(|| format!("Failed to open database {}", config.database()))
}

impl UserArgs {
    pub(crate) fn user_id(&self) -> Result<UserId> {
        Ok(UserId::new(self.user.as_str())?)
    }
}
