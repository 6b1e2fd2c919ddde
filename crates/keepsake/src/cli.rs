//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

// Re-export command types for convenience
pub use crate::commands::backup::BackupCommands;
pub use crate::commands::restore::RestoreArgs;
pub use crate::commands::settings::SettingsCommands;

/// Keepsake - Per-user backup and restore
#[derive(Parser, Debug)]
#[command(name = "keepsake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to keepsake.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create and inspect backups
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Restore a user's data from their latest backup
    Restore(RestoreArgs),

    /// Automatic backup settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Database management
    #[command(subcommand)]
    Db(DbCommands),
}

/// The user an operation acts on
#[derive(Args, Debug, Clone)]
pub struct UserArgs {
    /// User id
    #[arg(short, long, env = "KEEPSAKE_USER")]
    pub user: String,
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a starter keepsake.yaml
    Init(ConfigInitArgs),

    /// Show resolved configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "keepsake.yaml")]
    pub output: Utf8PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Db commands
#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Create the backup catalog and the application tables
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_backup_create() {
        let cli = Cli::try_parse_from(["keepsake", "-v", "backup", "create", "--user", "u1"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Backup(BackupCommands::Create(args)) => assert_eq!(args.user.user, "u1"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_restore_with_global_config() {
        let cli = Cli::try_parse_from([
            "keepsake", "restore", "-u", "u1", "--yes", "--config", "/tmp/keepsake.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref().map(|p| p.as_str()), Some("/tmp/keepsake.yaml"));
        match cli.command {
            Commands::Restore(args) => assert!(args.yes),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_backup_status_help_mentions_process_scope() {
        let cli = Cli::command();
        let status = cli
            .find_subcommand("backup")
            .and_then(|backup| backup.find_subcommand("status"))
            .unwrap();
        let about = status.get_about().unwrap().to_string();
        let long_about = status.get_long_about().unwrap().to_string();
        assert!(about.contains("running in this process"), "{}", about);
        assert!(long_about.contains("always reports 100%"), "{}", long_about);
    }

    #[test]
    fn test_settings_set_rejects_unknown_interval() {
        let result = Cli::try_parse_from([
            "keepsake", "settings", "set", "-u", "u1", "--interval", "hourly",
        ]);
        assert!(result.is_err());
    }
}
