//! Database command

use anyhow::{Context, Result};
use camino::Utf8Path;
use keepsake_backup::schema;

use crate::cli::DbCommands;
use crate::commands::open_service;
use crate::output;

pub fn run(cmd: DbCommands, config: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        DbCommands::Init => init(config),
    }
}

fn init(config: Option<&Utf8Path>) -> Result<()> {
    // Opening the service already creates the catalog tables
    let service = open_service(config)?;
    service
        .database()
        .with_conn(|conn| schema::init_feature_tables(conn))
        .context("Failed to create application tables")?;

    output::success("Database initialized");
    Ok(())
}
