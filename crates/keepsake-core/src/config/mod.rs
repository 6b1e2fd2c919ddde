//! Configuration loading and management

mod loader;
mod types;

pub use loader::{generate_default_config, KeepsakeConfig, ENV_ARTIFACT_DIR, ENV_DATABASE};
pub use types::{
    ArtifactsConfig, BackupDefaults, BackupInterval, KeepsakeConfigFile, DEFAULT_COMPRESSION_LEVEL,
};
