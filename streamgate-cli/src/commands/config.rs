//! `streamgate config` — inspect configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use streamgate_core::ProcessorConfig;
use tabled::{settings::Style, Table, Tabled};

use super::{load_config, print_json};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Load and validate configuration, then print the effective settings.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// YAML configuration file; the environment is used when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Check(args) => check(args),
    }
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "setting")]
    name: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn check(args: CheckArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    if args.json {
        return print_json(&config);
    }

    let mut table = Table::new(rows(&config));
    table.with(Style::rounded());
    println!("{table}");
    println!("{} configuration is valid", "✓".green());
    Ok(())
}

fn rows(config: &ProcessorConfig) -> Vec<SettingRow> {
    let row = |name, value: String| SettingRow { name, value };
    let endpoint = |e: &Option<String>| e.clone().unwrap_or_else(|| "-".to_string());
    let watch_list = config.watch_list();
    let watched = if watch_list.is_empty() {
        "-".to_string()
    } else {
        watch_list.iter().collect::<Vec<_>>().join(", ")
    };
    vec![
        row("region", config.region.clone()),
        row("table", config.table_name.clone()),
        row("state machines", config.state_machine_arns.join(", ")),
        row("watched models", watched),
        row("service", config.service_name.clone()),
        row("dispatch function", config.dispatch_function.clone()),
        row("lookup function", config.lookup_function().to_string()),
        row("max concurrency", config.max_concurrency.to_string()),
        row("lookup timeout", format!("{} ms", config.lookup_timeout_ms)),
        row("lambda endpoint", endpoint(&config.endpoints.lambda)),
        row("step functions endpoint", endpoint(&config.endpoints.step_functions)),
    ]
}
