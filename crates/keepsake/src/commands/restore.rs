//! Restore command
//!
//! Connects the CLI restore UI to the keepsake-backup restore orchestrator.

use anyhow::Result;
use camino::Utf8Path;
use clap::Args;
use keepsake_backup::BackupError;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::UserArgs;
use crate::commands::open_service;
use crate::output;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoreJson {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<keepsake_backup::RestoreReport>,
}

#[derive(Tabled)]
struct TableRow {
    table: String,
    removed: usize,
    restored: usize,
}

pub async fn run(args: RestoreArgs, config: Option<&Utf8Path>) -> Result<()> {
    let service = open_service(config)?;
    let user = args.user.user_id()?;

    if !args.json {
        output::header("Restore User Data");

        let last = service.last_backup(&user).await?;
        let Some(created_at) = last.created_at else {
            output::info(&format!("No completed backup for {}, nothing to restore", user));
            return Ok(());
        };

        output::kv("User", user.as_str());
        output::kv("Backup from", &output::format_time(&created_at));
        output::warning("All current data for this user will be replaced");
        println!();

        if !args.yes {
            use dialoguer::Confirm;
            if !Confirm::new()
                .with_prompt("Proceed with restore?")
                .default(false)
                .interact()?
            {
                output::info("Restore cancelled");
                return Ok(());
            }
        }
    }

    let spinner = (!args.json).then(|| output::spinner("Restoring..."));
    let result = service.restore(&user).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) if args.json => {
            output::json(&RestoreJson {
                success: false,
                reason: Some(e.to_string()),
                report: None,
            })?;
            return Err(e.into());
        }
        Err(e @ BackupError::RestoreFailed { .. }) => {
            output::error("Restore failed; no data was changed");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        return output::json(&RestoreJson {
            success: true,
            reason: None,
            report: Some(report),
        });
    }

    output::success("Restore complete");
    println!();

    let rows: Vec<TableRow> = report
        .tables
        .iter()
        .map(|(name, outcome)| TableRow {
            table: name.clone(),
            removed: outcome.deleted,
            restored: outcome.inserted,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    output::kv("Artifact", &report.artifact);
    output::kv("Duration", &format!("{:.1}s", report.duration.as_secs_f64()));

    Ok(())
}
