//! Workflow start seam and an in-process implementation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use streamgate_core::types::WorkflowInput;
use streamgate_router::{BatchReport, Dispatcher, IdentityLookup, Router};

use crate::error::ProcessError;

/// Starts one execution of a state machine with a serialized input.
#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    /// Returns an identifier for the started execution.
    async fn start_execution(&self, state_machine_arn: &str, input: &str)
        -> Result<String, ProcessError>;
}

/// Runs the router in-process instead of starting a remote execution.
///
/// The router's batch failure surfaces as a start failure, matching a failed
/// execution.
pub struct LocalWorkflow<D, L> {
    router: Arc<Router<D, L>>,
    reports: Mutex<Vec<BatchReport>>,
}

impl<D, L> LocalWorkflow<D, L>
where
    D: Dispatcher + 'static,
    L: IdentityLookup + 'static,
{
    pub fn new(router: Arc<Router<D, L>>) -> Self {
        Self {
            router,
            reports: Mutex::default(),
        }
    }

    /// Reports of every execution so far, successful or not.
    pub fn take_reports(&self) -> Vec<BatchReport> {
        match self.reports.lock() {
            Ok(mut reports) => std::mem::take(&mut *reports),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl<D, L> WorkflowTrigger for LocalWorkflow<D, L>
where
    D: Dispatcher + 'static,
    L: IdentityLookup + 'static,
{
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        input: &str,
    ) -> Result<String, ProcessError> {
        let input: WorkflowInput = serde_json::from_str(input)?;
        let report = self.router.route_batch(&input).await?;
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report.clone()),
            Err(poisoned) => poisoned.into_inner().push(report.clone()),
        }
        report.into_result()?;
        Ok(format!("local:{state_machine_arn}"))
    }
}

#[async_trait]
impl<T: WorkflowTrigger + ?Sized> WorkflowTrigger for Arc<T> {
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        input: &str,
    ) -> Result<String, ProcessError> {
        (**self).start_execution(state_machine_arn, input).await
    }
}
