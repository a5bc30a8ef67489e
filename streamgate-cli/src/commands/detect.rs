//! `streamgate detect` — run change detection on a snapshot pair.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use streamgate_core::types::{Operation, Snapshot, WatchList};
use streamgate_detector::detect;

use super::{print_json, read_json};

/// Arguments for `streamgate detect`.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// JSON file holding the snapshot before the change.
    #[arg(long)]
    pub before: Option<PathBuf>,

    /// JSON file holding the snapshot after the change.
    #[arg(long)]
    pub after: Option<PathBuf>,

    /// Stream operation: INSERT, MODIFY or REMOVE.
    #[arg(long)]
    pub op: Operation,

    /// Comma-separated watched type names.
    #[arg(long)]
    pub models: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DetectArgs {
    pub fn run(self) -> Result<()> {
        if self.before.is_none() && self.after.is_none() {
            bail!("provide --before, --after, or both");
        }
        let before = self.before.as_deref().map(read_snapshot).transpose()?;
        let after = self.after.as_deref().map(read_snapshot).transpose()?;
        let watched = WatchList::parse(&self.models);

        let detection = detect(before.as_ref(), after.as_ref(), self.op, &watched);
        if self.json {
            return print_json(&detection);
        }

        let type_name = detection
            .entity_type
            .as_ref()
            .map_or_else(|| "(none)".to_string(), |t| t.to_string());
        let verdict = if detection.changed {
            "changed".green().bold()
        } else {
            "unchanged".dimmed()
        };
        println!("{} {} ({})", type_name.bold(), verdict, self.op);
        for field in &detection.changed_fields {
            println!("  ~ {field}");
        }
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    read_json(path)
}
