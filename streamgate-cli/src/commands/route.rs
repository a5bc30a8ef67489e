//! `streamgate route` — show the routing plan for one change record.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use streamgate_core::types::ChangeRecord;
use streamgate_router::{
    plan, should_route, DispatchRequest, RouterContext, RoutingDecision, Stage,
};
use tabled::{settings::Style, Table, Tabled};

use super::{print_json, read_json};

/// Arguments for `streamgate route`.
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// JSON file holding one packaged change record.
    pub record: PathBuf,

    /// This deployment's service identifier.
    #[arg(long)]
    pub service: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RouteJson {
    routed: bool,
    stages: Vec<StageJson>,
}

#[derive(Serialize)]
struct StageJson {
    stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<DispatchRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity_lookup: Option<String>,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "stage")]
    stage: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "body")]
    body: String,
}

impl RouteArgs {
    pub fn run(self) -> Result<()> {
        let record: ChangeRecord = read_json(&self.record)?;
        let context = RouterContext::new(self.service.trim().replace(' ', "-"));

        let routed = should_route(&record);
        let stages = if routed {
            plan(&record, &context)
                .stages
                .into_iter()
                .map(|(stage, decision)| StageJson {
                    stage,
                    request: decision.request(),
                    identity_lookup: match decision {
                        RoutingDecision::DeriveFileCreate {
                            identity_lookup, ..
                        } => identity_lookup,
                        _ => None,
                    },
                })
                .collect()
        } else {
            Vec::new()
        };
        let report = RouteJson { routed, stages };

        if self.json {
            return print_json(&report);
        }
        print_table(&record, &report);
        Ok(())
    }
}

fn print_table(record: &ChangeRecord, report: &RouteJson) {
    println!("record {} ({})", record.event_id.to_string().bold(), record.operation);
    if !report.routed {
        println!("{}", "not routed: only changed event inserts are routed".dimmed());
        return;
    }

    let rows: Vec<StageRow> = report
        .stages
        .iter()
        .map(|s| match &s.request {
            Some(request) => StageRow {
                stage: s.stage.to_string(),
                action: request.action.to_string(),
                body: compact(&request.body),
            },
            None => StageRow {
                stage: s.stage.to_string(),
                action: "-".to_string(),
                body: String::new(),
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if let Some(key) = report.stages.iter().find_map(|s| s.identity_lookup.as_deref()) {
        println!("identity lookup: {}", key.yellow());
    }
}

fn compact(body: &Value) -> String {
    serde_json::to_string(body).unwrap_or_default()
}
