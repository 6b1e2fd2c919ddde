//! Backup settings commands

use anyhow::Result;
use camino::Utf8Path;
use clap::{Args, Subcommand};
use keepsake_backup::{BackupSettings, SettingsView};
use keepsake_core::BackupInterval;

use crate::cli::UserArgs;
use crate::commands::open_service;
use crate::output;

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show the user's backup settings
    Show(SettingsShowArgs),

    /// Change the user's backup settings
    Set(SettingsSetArgs),
}

#[derive(Args, Debug)]
pub struct SettingsShowArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SettingsSetArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Enable or disable automatic backups
    #[arg(long)]
    pub auto_backup: Option<bool>,

    /// How often automatic backups run (daily, weekly, monthly)
    #[arg(long)]
    pub interval: Option<BackupInterval>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(cmd: SettingsCommands, config: Option<&Utf8Path>) -> Result<()> {
    let service = open_service(config)?;
    match cmd {
        SettingsCommands::Show(args) => {
            let user = args.user.user_id()?;
            let view = service.backup_settings(&user).await?;
            print_view(&view, args.json)
        }
        SettingsCommands::Set(args) => {
            let user = args.user.user_id()?;
            let current = service.backup_settings(&user).await?;

            // Unspecified fields keep their current value
            let settings = BackupSettings {
                auto_backup_enabled: args.auto_backup.unwrap_or(current.auto_backup_enabled),
                interval: args.interval.unwrap_or(current.interval),
            };
            let view = service.update_backup_settings(&user, settings).await?;

            if !args.json {
                output::success("Backup settings saved");
            }
            print_view(&view, args.json)
        }
    }
}

fn print_view(view: &SettingsView, json: bool) -> Result<()> {
    if json {
        return output::json(view);
    }

    output::kv(
        "Automatic backups",
        if view.auto_backup_enabled { "enabled" } else { "disabled" },
    );
    output::kv("Interval", view.interval.as_str());
    output::kv(
        "Last backup",
        &view
            .last_backup_date
            .map(|d| output::format_time(&d))
            .unwrap_or_else(|| "never".to_string()),
    );
    output::kv("Backup size", &output::format_bytes(view.backup_size_bytes));
    Ok(())
}
