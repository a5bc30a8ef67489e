pub mod config;
pub mod detect;
pub mod process;
pub mod route;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use streamgate_core::ProcessorConfig;

/// Read and parse a JSON document from disk.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}

/// Configuration from a YAML file, or from the environment when absent.
pub(crate) fn load_config(path: Option<&Path>) -> Result<ProcessorConfig> {
    match path {
        Some(path) => ProcessorConfig::load_yaml_at(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => ProcessorConfig::from_env().context("failed to load configuration from environment"),
    }
}
