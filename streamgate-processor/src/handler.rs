//! Stream-batch handler: classify, decode, detect, package, trigger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use streamgate_core::types::{ChangeRecord, EventId, EventSource, WatchList, WorkflowInput};
use streamgate_core::ProcessorConfig;
use streamgate_detector::detect;
use tokio::task::JoinSet;

use crate::decode::StreamEvent;
use crate::error::ProcessError;
use crate::event_source::{classify, EventKind};
use crate::workflow::WorkflowTrigger;

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub records: usize,
    pub changed: usize,
    /// Execution identifiers, in configured state machine order.
    pub executions: Vec<String>,
}

/// Turn a stream batch into workflow input.
///
/// Detection runs against `watched` plus the generic event type so event
/// records carry a change flag the router can gate on.
pub fn build_workflow_input(
    event: &StreamEvent,
    watched: &WatchList,
    timestamp: DateTime<Utc>,
) -> Result<WorkflowInput, ProcessError> {
    let detect_against = watched.with_event();
    let records = event
        .records
        .iter()
        .map(|entry| {
            let after = entry.after()?;
            let before = entry.before()?;
            let detection = detect(before.as_ref(), after.as_ref(), entry.operation, &detect_against);
            let record = ChangeRecord {
                after,
                before,
                event_id: EventId::from(entry.event_id.as_str()),
                timestamp,
                operation: entry.operation,
                event_source: EventSource::Dynamodb,
                entity_type: detection.entity_type,
                changed: detection.changed,
            };
            if !record.has_consistent_images() {
                tracing::warn!(
                    event_id = %entry.event_id,
                    operation = %entry.operation,
                    "stream record images do not match its operation",
                );
            }
            Ok(record)
        })
        .collect::<Result<Vec<_>, ProcessError>>()?;
    Ok(WorkflowInput { records })
}

/// Handle one raw invocation payload.
///
/// Nothing is started when no record changed. Every configured state machine
/// receives the same input; any failed start fails the invocation.
pub async fn handle(
    raw: &Value,
    config: &ProcessorConfig,
    trigger: Arc<dyn WorkflowTrigger>,
) -> Result<BatchSummary, ProcessError> {
    match classify(raw) {
        Some(EventKind::Dynamodb) => {}
        other => {
            let kind = other.map_or_else(|| "unknown".to_string(), |k| k.to_string());
            return Err(ProcessError::UnsupportedEvent { kind });
        }
    }

    let event: StreamEvent = serde_json::from_value(raw.clone())?;
    let input = build_workflow_input(&event, &config.watch_list(), Utc::now())?;
    let changed = input.changed_count();
    tracing::info!(
        table = %config.table_name,
        records = input.records.len(),
        changed,
        "decoded stream batch",
    );

    let mut summary = BatchSummary {
        records: input.records.len(),
        changed,
        executions: Vec::new(),
    };
    if changed == 0 {
        tracing::debug!("no changed records; no workflow started");
        return Ok(summary);
    }

    let payload = serde_json::to_string(&input)?;
    let mut tasks = JoinSet::new();
    for (index, arn) in config.state_machine_arns.iter().cloned().enumerate() {
        let trigger = Arc::clone(&trigger);
        let payload = payload.clone();
        tasks.spawn(async move {
            let started = trigger.start_execution(&arn, &payload).await;
            (index, arn, started)
        });
    }

    let mut executions = Vec::with_capacity(config.state_machine_arns.len());
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let (index, arn, started) = joined.map_err(|err| ProcessError::Join(err.to_string()))?;
        match started {
            Ok(execution) => {
                tracing::info!(state_machine = %arn, execution = %execution, "workflow started");
                executions.push((index, execution));
            }
            Err(err) => {
                tracing::error!(state_machine = %arn, error = %err, "workflow start failed");
                first_error.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    executions.sort_by_key(|(index, _)| *index);
    summary.executions = executions.into_iter().map(|(_, id)| id).collect();
    Ok(summary)
}
