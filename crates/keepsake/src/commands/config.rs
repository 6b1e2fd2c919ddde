//! Config command

use anyhow::{anyhow, Result};
use camino::Utf8Path;
use keepsake_core::config::generate_default_config;
use keepsake_core::KeepsakeConfig;

use crate::cli::{ConfigCommands, ConfigInitArgs, ConfigShowArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, config: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Init(args) => init(args),
        ConfigCommands::Show(args) => show(args, config),
    }
}

fn init(args: ConfigInitArgs) -> Result<()> {
    // Check if file exists
    if args.output.exists() && !args.force {
        return Err(anyhow!(
            "File {} already exists. Use --force to overwrite.",
            args.output
        ));
    }

    std::fs::write(&args.output, generate_default_config())?;

    output::success(&format!("Created {}", args.output));
    Ok(())
}

fn show(args: ConfigShowArgs, config: Option<&Utf8Path>) -> Result<()> {
    let loaded = KeepsakeConfig::load(config)?;

    if args.json {
        return output::json(&loaded.config);
    }

    output::kv(
        "Config file",
        loaded
            .config_path
            .as_ref()
            .map(|p| p.as_str())
            .unwrap_or("(built-in defaults)"),
    );
    output::kv("Database", loaded.database().as_str());
    output::kv("Artifacts", loaded.artifact_dir().as_str());
    output::kv("Compression level", &loaded.compression_level().to_string());
    output::kv(
        "Default auto backup",
        if loaded.defaults().auto_backup_enabled { "enabled" } else { "disabled" },
    );
    output::kv("Default interval", loaded.defaults().interval.as_str());
    Ok(())
}
