use std::sync::Arc;

use serde_json::Value;
use streamgate_core::ProcessorConfig;
use streamgate_router::{BatchReport, Dispatcher, IdentityLookup, Router, RouterContext};

use crate::error::ProcessError;
use crate::handler::{handle, BatchSummary};
use crate::http::StepFunctionsClient;
use crate::workflow::LocalWorkflow;

/// Set to `json` for one JSON object per log line.
pub const LOG_FORMAT_ENV: &str = "STREAMGATE_LOG_FORMAT";

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// A router wired from the processor settings.
pub fn local_router<D, L>(config: &ProcessorConfig, dispatcher: D, lookup: L) -> Arc<Router<D, L>>
where
    D: Dispatcher + 'static,
    L: IdentityLookup + 'static,
{
    let context = RouterContext::new(config.service_name.clone());
    Arc::new(Router::new(
        dispatcher,
        lookup,
        context,
        config.max_concurrency,
        config.lookup_timeout(),
    ))
}

/// Handle one payload, starting executions on the configured endpoint.
pub async fn run(config: &ProcessorConfig, raw: &Value) -> Result<BatchSummary, ProcessError> {
    let trigger = Arc::new(StepFunctionsClient::from_config(config)?);
    handle(raw, config, trigger).await
}

/// Outcome of an in-process run. Reports survive a failed batch.
#[derive(Debug)]
pub struct LocalRun {
    pub result: Result<BatchSummary, ProcessError>,
    pub reports: Vec<BatchReport>,
}

/// Handle one payload with the router running in-process.
pub async fn run_local<D, L>(config: &ProcessorConfig, raw: &Value, dispatcher: D, lookup: L) -> LocalRun
where
    D: Dispatcher + 'static,
    L: IdentityLookup + 'static,
{
    let workflow = Arc::new(LocalWorkflow::new(local_router(config, dispatcher, lookup)));
    let result = handle(raw, config, workflow.clone()).await;
    LocalRun {
        result,
        reports: workflow.take_reports(),
    }
}

/// Start a runtime and block the current thread until [`run`] completes.
pub fn start_blocking(config: &ProcessorConfig, raw: &Value) -> Result<BatchSummary, ProcessError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ProcessError::Runtime)?;
    runtime.block_on(run(config, raw))
}
