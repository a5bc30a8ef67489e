//! `streamgate process` — run a stream payload through the whole pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use streamgate_core::ProcessorConfig;
use streamgate_processor::{run_local, start_blocking, BatchSummary, LambdaClient, LocalRun};
use streamgate_router::{
    BatchReport, DispatchRequest, RecordOutcome, RecordReport, RecordingDispatcher, StaticLookup,
};

use super::{load_config, print_json, read_json};

/// Arguments for `streamgate process`.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// JSON file holding a raw DynamoDB stream payload.
    pub event: PathBuf,

    /// YAML configuration file; the environment is used when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Record dispatches instead of sending them.
    #[arg(long)]
    pub dry_run: bool,

    /// Start executions on the Step Functions endpoint instead of routing
    /// in-process.
    #[arg(long, conflicts_with = "dry_run")]
    pub remote: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ProcessJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a BatchSummary>,
    records: Vec<&'a RecordReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatches: Option<Vec<Value>>,
}

impl ProcessArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let raw: Value = read_json(&self.event)?;

        if self.remote {
            let summary = start_blocking(&config, &raw).context("stream batch failed")?;
            if self.json {
                return print_json(&summary);
            }
            print_summary(&summary);
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        let (run, sent) = if self.dry_run {
            let dispatcher = Arc::new(RecordingDispatcher::new());
            let run = runtime.block_on(run_local(
                &config,
                &raw,
                dispatcher.clone(),
                StaticLookup::new(),
            ));
            (run, Some(dispatcher.sent()))
        } else {
            let lambda = Arc::new(lambda_client(&config)?);
            let run = runtime.block_on(run_local(&config, &raw, lambda.clone(), lambda));
            (run, None)
        };

        self.report(&run, sent.as_deref())?;
        run.result.context("stream batch failed")?;
        Ok(())
    }

    fn report(&self, run: &LocalRun, sent: Option<&[DispatchRequest]>) -> Result<()> {
        let summary = run.result.as_ref().ok();
        let records: Vec<&RecordReport> = run.reports.iter().flat_map(|r| &r.records).collect();

        if self.json {
            return print_json(&ProcessJson {
                summary,
                records,
                dispatches: sent.map(|s| s.iter().map(DispatchRequest::envelope).collect()),
            });
        }

        if let Some(summary) = summary {
            print_summary(summary);
        }
        for report in &run.reports {
            print_records(report);
        }
        if let Some(sent) = sent {
            let prefix = "[dry-run]".yellow();
            if sent.is_empty() {
                println!("{prefix} no dispatches");
            }
            for request in sent {
                println!("{prefix} {} {}", request.action.to_string().bold(), request.body);
            }
        }
        Ok(())
    }
}

fn lambda_client(config: &ProcessorConfig) -> Result<LambdaClient> {
    LambdaClient::from_config(config)
        .context("in-process routing needs a Lambda endpoint; use --dry-run to record instead")
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "{} records | {} changed | {} executions",
        summary.records,
        summary.changed,
        summary.executions.len()
    );
    if summary.changed == 0 {
        println!("{}", "no changed records; nothing started".dimmed());
    }
}

fn print_records(report: &BatchReport) {
    for record in &report.records {
        let status = match &record.outcome {
            RecordOutcome::Skipped => "skipped".dimmed(),
            RecordOutcome::Routed { dispatched, .. } if dispatched.is_empty() => {
                "routed (no dispatch)".normal()
            }
            RecordOutcome::Routed { .. } => "routed".green(),
            RecordOutcome::Failed { .. } => "failed".red().bold(),
        };
        println!("  {} {}", record.event_id, status);
        if let RecordOutcome::Failed { error, .. } = &record.outcome {
            println!("    {error}");
        }
    }
}
