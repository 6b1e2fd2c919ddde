//! Backup commands

use anyhow::{anyhow, Result};
use camino::Utf8Path;
use clap::{Args, Subcommand};
use keepsake_backup::{BackupEntry, BackupService, BackupStatus};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::UserArgs;
use crate::commands::open_service;
use crate::output;

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Snapshot the user's data into a new backup
    Create(BackupCreateArgs),

    /// Show when the user's last completed backup was taken
    Last(BackupQueryArgs),

    /// Show progress of a backup running in this process
    ///
    /// Progress lives in the memory of the process doing the backup. A fresh
    /// `keepsake` invocation has no backup running, so it always reports 100%
    /// and completed.
    Status(BackupQueryArgs),

    /// List the user's backup attempts
    History(BackupHistoryArgs),

    /// Delete a backup and its artifact
    Delete(BackupDeleteArgs),

    /// List the user's artifacts on disk
    Artifacts(BackupQueryArgs),
}

#[derive(Args, Debug)]
pub struct BackupCreateArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BackupQueryArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BackupHistoryArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Maximum number of entries
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BackupDeleteArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Backup id (see `keepsake backup history`)
    pub id: i64,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn run(cmd: BackupCommands, config: Option<&Utf8Path>) -> Result<()> {
    let service = open_service(config)?;
    match cmd {
        BackupCommands::Create(args) => create(&service, args).await,
        BackupCommands::Last(args) => last(&service, args).await,
        BackupCommands::Status(args) => status(&service, args),
        BackupCommands::History(args) => history(&service, args).await,
        BackupCommands::Delete(args) => delete(&service, args).await,
        BackupCommands::Artifacts(args) => artifacts(&service, args).await,
    }
}

async fn create(service: &BackupService, args: BackupCreateArgs) -> Result<()> {
    let user = args.user.user_id()?;

    let spinner = (!args.json).then(|| output::spinner(&format!("Backing up {}...", user)));
    let result = service.create_backup(&user).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let created = result?;

    if args.json {
        return output::json(&created);
    }

    output::success("Backup created successfully");
    println!();
    output::kv("Backup id", &created.backup_id.to_string());
    output::kv("Artifact", &created.artifact);
    output::kv("Size", &output::format_bytes(created.artifact_size));
    output::kv("Created", &output::format_time(&created.created_at));
    println!();

    output::info("Restore with:");
    println!("  keepsake restore --user {}", user);

    Ok(())
}

async fn last(service: &BackupService, args: BackupQueryArgs) -> Result<()> {
    let user = args.user.user_id()?;
    let last = service.last_backup(&user).await?;

    if args.json {
        return output::json(&last);
    }

    match last.created_at {
        Some(created_at) => output::kv("Last backup", &output::format_time(&created_at)),
        None => output::info(&format!("No completed backup for {}", user)),
    }
    Ok(())
}

fn status(service: &BackupService, args: BackupQueryArgs) -> Result<()> {
    let user = args.user.user_id()?;
    let status = service.backup_status(&user);

    if args.json {
        return output::json(&status);
    }

    output::kv("Progress", &format!("{}%", status.progress));
    output::kv("Completed", if status.completed { "yes" } else { "no" });
    Ok(())
}

#[derive(Tabled)]
struct HistoryRow {
    id: i64,
    created: String,
    status: String,
    size: String,
    detail: String,
}

impl From<&BackupEntry> for HistoryRow {
    fn from(entry: &BackupEntry) -> Self {
        let detail = match entry.status {
            BackupStatus::Completed => entry.artifact.clone().unwrap_or_default(),
            BackupStatus::Failed => entry.reason.clone().unwrap_or_default(),
        };
        Self {
            id: entry.id,
            created: output::format_time(&entry.created_at),
            status: entry.status.to_string(),
            size: output::format_bytes(entry.size_bytes),
            detail,
        }
    }
}

async fn history(service: &BackupService, args: BackupHistoryArgs) -> Result<()> {
    let user = args.user.user_id()?;
    let entries = service.history(&user, args.limit).await?;

    if args.json {
        return output::json(&entries);
    }

    if entries.is_empty() {
        output::info(&format!("No backups recorded for {}", user));
        return Ok(());
    }

    let rows: Vec<HistoryRow> = entries.iter().map(HistoryRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
    Ok(())
}

async fn delete(service: &BackupService, args: BackupDeleteArgs) -> Result<()> {
    let user = args.user.user_id()?;

    if !args.yes {
        use dialoguer::Confirm;
        if !Confirm::new()
            .with_prompt(format!("Delete backup {} for {}?", args.id, user))
            .default(false)
            .interact()?
        {
            output::info("Delete cancelled");
            return Ok(());
        }
    }

    match service.delete_backup(&user, args.id).await? {
        Some(entry) => {
            output::success(&format!("Deleted backup {}", entry.id));
            if let Some(artifact) = entry.artifact {
                output::kv("Artifact", &artifact);
            }
            Ok(())
        }
        None => Err(anyhow!("No backup {} found for {}", args.id, user)),
    }
}

#[derive(Tabled, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactRow {
    handle: String,
    #[tabled(rename = "size")]
    size_bytes: u64,
    modified: String,
}

async fn artifacts(service: &BackupService, args: BackupQueryArgs) -> Result<()> {
    let user = args.user.user_id()?;
    let artifacts = service.list_artifacts(&user).await?;

    let rows: Vec<ArtifactRow> = artifacts
        .into_iter()
        .map(|a| ArtifactRow {
            handle: a.handle.to_string(),
            size_bytes: a.size_bytes,
            modified: a
                .modified
                .map(|m| output::format_time(&m))
                .unwrap_or_default(),
        })
        .collect();

    if args.json {
        return output::json(&rows);
    }

    if rows.is_empty() {
        output::info(&format!("No artifacts stored for {}", user));
        return Ok(());
    }

    output::kv("Directory", service.store().root().join(user.as_str()).as_str());
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
    Ok(())
}
