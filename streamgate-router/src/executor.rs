//! Executes route plans against the downstream seams.
//!
//! Records of a batch run concurrently, at most `max_concurrency` at a time.
//! Within one record the stages run strictly in order; a failed dispatch ends
//! that record's routing (like a failed workflow execution) but never the
//! batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use streamgate_core::types::{ChangeRecord, WorkflowInput};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::decision::{Action, DispatchRequest, LookupResponse, RoutingDecision, Stage};
use crate::error::{DispatchError, LookupError, RouterError};
use crate::plan::{plan, should_route, RouterContext};

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Fire-and-forget invocation of a named action.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, DispatchError>;
}

/// Request/response read of an identity-to-user mapping.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn read_identity_mapping(
        &self,
        request: &DispatchRequest,
    ) -> Result<LookupResponse, LookupError>;
}

#[async_trait]
impl<T: Dispatcher + ?Sized> Dispatcher for Arc<T> {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, DispatchError> {
        (**self).dispatch(request).await
    }
}

#[async_trait]
impl<T: IdentityLookup + ?Sized> IdentityLookup for Arc<T> {
    async fn read_identity_mapping(
        &self,
        request: &DispatchRequest,
    ) -> Result<LookupResponse, LookupError> {
        (**self).read_identity_mapping(request).await
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// How the identity lookup for a file-create went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "lookup", content = "detail", rename_all = "snake_case")]
pub enum LookupOutcome {
    Resolved(String),
    /// The mapping exists but carries no user id.
    NoUserId,
    NotFound,
    /// Transport, timeout or malformed response; tolerated.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedAction {
    pub stage: Stage,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Unchanged, or of a type nobody routes.
    Skipped,
    Routed {
        dispatched: Vec<DispatchedAction>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lookup: Option<LookupOutcome>,
    },
    Failed {
        dispatched: Vec<DispatchedAction>,
        action: Action,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordReport {
    pub index: usize,
    pub event_id: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct BatchReport {
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Skipped))
            .count()
    }

    pub fn dispatched(&self) -> usize {
        self.records
            .iter()
            .map(|r| match &r.outcome {
                RecordOutcome::Skipped => 0,
                RecordOutcome::Routed { dispatched, .. } | RecordOutcome::Failed { dispatched, .. } => {
                    dispatched.len()
                }
            })
            .sum()
    }

    /// `Err(BatchFailed)` when any record failed, so the caller's retry
    /// policy can re-run the batch.
    pub fn into_result(self) -> Result<Self, RouterError> {
        match self.failed() {
            0 => Ok(self),
            failed => Err(RouterError::BatchFailed {
                failed,
                total: self.records.len(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Runs the decision tree and performs the resulting dispatches.
pub struct Router<D, L> {
    dispatcher: D,
    lookup: L,
    context: RouterContext,
    max_concurrency: usize,
    lookup_timeout: Duration,
}

impl<D, L> Router<D, L>
where
    D: Dispatcher + 'static,
    L: IdentityLookup + 'static,
{
    pub fn new(
        dispatcher: D,
        lookup: L,
        context: RouterContext,
        max_concurrency: usize,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            lookup,
            context,
            max_concurrency: max_concurrency.max(1),
            lookup_timeout,
        }
    }

    /// Route every record of a workflow input. Reports come back in input
    /// order; side effects across records are unordered.
    pub async fn route_batch(self: &Arc<Self>, input: &WorkflowInput) -> Result<BatchReport, RouterError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, record) in input.records.iter().cloned().enumerate() {
            let router = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| RouterError::Join(format!("semaphore closed: {err}")))?;
                Ok::<_, RouterError>(router.route_record(index, &record).await)
            });
        }

        let mut records = Vec::with_capacity(input.records.len());
        while let Some(joined) = tasks.join_next().await {
            let report = joined.map_err(|err| RouterError::Join(err.to_string()))??;
            records.push(report);
        }
        records.sort_by_key(|r| r.index);

        let report = BatchReport { records };
        tracing::info!(
            records = report.records.len(),
            skipped = report.skipped(),
            dispatched = report.dispatched(),
            failed = report.failed(),
            "routed stream batch",
        );
        Ok(report)
    }

    /// Route one record through all three stages.
    pub async fn route_record(&self, index: usize, record: &ChangeRecord) -> RecordReport {
        let event_id = record.event_id.0.clone();
        if !should_route(record) {
            tracing::debug!(event_id = %event_id, "record not routed");
            return RecordReport {
                index,
                event_id,
                outcome: RecordOutcome::Skipped,
            };
        }

        let route = plan(record, &self.context);
        let mut dispatched = Vec::new();
        let mut lookup = None;

        for (stage, decision) in route.stages {
            let Some(mut request) = decision.request() else {
                continue;
            };

            if let RoutingDecision::DeriveFileCreate {
                identity_lookup: Some(key),
                ..
            } = &decision
            {
                let outcome = self.resolve_user_id(&event_id, key).await;
                if let (LookupOutcome::Resolved(user_id), Value::Object(body)) =
                    (&outcome, &mut request.body)
                {
                    body.insert("userId".into(), Value::String(user_id.clone()));
                }
                lookup = Some(outcome);
            }

            match self.dispatcher.dispatch(&request).await {
                Ok(_) => {
                    tracing::info!(
                        event_id = %event_id,
                        stage = %stage,
                        action = %request.action,
                        "dispatched",
                    );
                    dispatched.push(DispatchedAction {
                        stage,
                        action: request.action,
                    });
                }
                Err(err) => {
                    let err = RouterError::Dispatch {
                        action: request.action.name(),
                        event_id: event_id.clone(),
                        source: err,
                    };
                    tracing::error!(error = %err, stage = %stage, "dispatch failed");
                    return RecordReport {
                        index,
                        event_id,
                        outcome: RecordOutcome::Failed {
                            dispatched,
                            action: request.action,
                            error: err.to_string(),
                        },
                    };
                }
            }
        }

        RecordReport {
            index,
            event_id,
            outcome: RecordOutcome::Routed { dispatched, lookup },
        }
    }

    /// Every failure resolves to "no user id"; the create proceeds either way.
    async fn resolve_user_id(&self, event_id: &str, key: &str) -> LookupOutcome {
        let request = DispatchRequest::new(
            Action::IdentityMappingRead,
            serde_json::json!({ "id": key }),
        );
        let result = tokio::time::timeout(
            self.lookup_timeout,
            self.lookup.read_identity_mapping(&request),
        )
        .await
        .unwrap_or(Err(LookupError::Timeout));

        match result {
            Ok(response) => match response.user_id() {
                Some(user_id) => LookupOutcome::Resolved(user_id.to_string()),
                None => {
                    tracing::debug!(event_id, key, "identity mapping has no user id");
                    LookupOutcome::NoUserId
                }
            },
            Err(LookupError::NotFound) => {
                tracing::debug!(event_id, key, "identity mapping not found");
                LookupOutcome::NotFound
            }
            Err(err) => {
                tracing::warn!(event_id, key, error = %err, "identity lookup failed; continuing without user id");
                LookupOutcome::Failed(err.to_string())
            }
        }
    }
}
