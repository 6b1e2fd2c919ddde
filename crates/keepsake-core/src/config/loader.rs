//! Configuration file loading and parsing

use super::types::{ArtifactsConfig, BackupDefaults, KeepsakeConfigFile, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{Error, Result};
use crate::utils::get_home_dir;
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use tracing::debug;

/// Configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["keepsake.yaml", "keepsake.yml"];

/// Directory under $HOME used when no config file is found
const DEFAULT_DATA_DIR: &str = ".keepsake";

/// Environment variable overriding `database`
pub const ENV_DATABASE: &str = "KEEPSAKE_DATABASE";

/// Environment variable overriding `artifacts.directory`
pub const ENV_ARTIFACT_DIR: &str = "KEEPSAKE_ARTIFACT_DIR";

/// Loaded and validated Keepsake configuration
#[derive(Debug, Clone)]
pub struct KeepsakeConfig {
    /// The parsed configuration, paths resolved
    pub config: KeepsakeConfigFile,

    /// Path of the file it came from, if any
    pub config_path: Option<Utf8PathBuf>,
}

impl KeepsakeConfig {
    /// Load configuration from the specified path, or search for it.
    ///
    /// Without an explicit path the current directory and its parents are
    /// searched for `keepsake.yaml`. If none is found the built-in defaults
    /// rooted at `~/.keepsake` are used. Environment overrides apply last.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let found = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::config_not_found(p.as_str())
                    } else {
                        Error::Io(e)
                    }
                })?;
                Some((p.to_owned(), content))
            }
            None => Self::find_config()?,
        };

        let mut loaded = match found {
            Some((config_path, content)) => Self::from_yaml(&content, Some(config_path))?,
            None => {
                debug!("No keepsake.yaml found, using defaults");
                Self {
                    config: Self::default_config()?,
                    config_path: None,
                }
            }
        };

        loaded.apply_env_overrides();
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse configuration text. Relative paths resolve against the
    /// directory containing `config_path`.
    pub fn from_yaml(content: &str, config_path: Option<Utf8PathBuf>) -> Result<Self> {
        let mut config: KeepsakeConfigFile = serde_yaml_ng::from_str(content)?;

        if let Some(base) = config_path.as_deref().and_then(Utf8Path::parent) {
            config.database = resolve(base, &config.database);
            config.artifacts.directory = resolve(base, &config.artifacts.directory);
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Built-in defaults: `~/.keepsake/keepsake.db` and `~/.keepsake/backups`
    pub fn default_config() -> Result<KeepsakeConfigFile> {
        let home = get_home_dir()?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|_| Error::invalid_config("Home directory path is not valid UTF-8"))?;
        let data_dir = home.join(DEFAULT_DATA_DIR);

        Ok(KeepsakeConfigFile {
            database: data_dir.join("keepsake.db"),
            artifacts: ArtifactsConfig {
                directory: data_dir.join("backups"),
                compression_level: DEFAULT_COMPRESSION_LEVEL,
            },
            defaults: BackupDefaults::default(),
        })
    }

    /// Search current and parent directories for a config file
    fn find_config() -> Result<Option<(Utf8PathBuf, String)>> {
        let cwd = env::current_dir().map_err(Error::Io)?;
        let cwd = Utf8PathBuf::try_from(cwd)
            .map_err(|_| Error::invalid_config("Current directory path is not valid UTF-8"))?;

        let mut current = cwd.as_path();

        loop {
            for name in CONFIG_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    let content = fs::read_to_string(&path)?;
                    return Ok(Some((path, content)));
                }
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var(ENV_DATABASE) {
            if !val.trim().is_empty() {
                debug!("{} overrides database path", ENV_DATABASE);
                self.config.database = Utf8PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var(ENV_ARTIFACT_DIR) {
            if !val.trim().is_empty() {
                debug!("{} overrides artifact directory", ENV_ARTIFACT_DIR);
                self.config.artifacts.directory = Utf8PathBuf::from(val);
            }
        }
    }

    /// Check values serde cannot constrain
    pub fn validate(&self) -> Result<()> {
        if self.config.database.as_str().trim().is_empty() {
            return Err(Error::invalid_config("database path must not be empty"));
        }

        if self.config.artifacts.directory.as_str().trim().is_empty() {
            return Err(Error::invalid_config(
                "artifacts.directory must not be empty",
            ));
        }

        let level = self.config.artifacts.compression_level;
        if !(1..=9).contains(&level) {
            return Err(Error::invalid_config(format!(
                "artifacts.compression_level must be 1-9, got {}",
                level
            )));
        }

        Ok(())
    }

    /// Database path
    pub fn database(&self) -> &Utf8Path {
        &self.config.database
    }

    /// Artifact root directory
    pub fn artifact_dir(&self) -> &Utf8Path {
        &self.config.artifacts.directory
    }

    /// Artifact compression level
    pub fn compression_level(&self) -> u32 {
        self.config.artifacts.compression_level
    }

    /// Default settings for users without a saved row
    pub fn defaults(&self) -> BackupDefaults {
        self.config.defaults
    }
}

fn resolve(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        base.join(path)
    }
}

/// Generate a starter keepsake.yaml
pub fn generate_default_config() -> String {
    format!(
        r#"# Keepsake configuration
database: ./keepsake.db
artifacts:
  directory: ./backups
  compression_level: {}
defaults:
  auto_backup_enabled: false
  interval: weekly
"#,
        DEFAULT_COMPRESSION_LEVEL
    )
}
