//! Stream-batch processing: decode, detect, package, trigger.

pub mod decode;
mod error;
pub mod event_source;
pub mod handler;
pub mod http;
mod runtime;
pub mod workflow;

pub use error::ProcessError;
pub use event_source::{classify, EventKind};
pub use handler::{build_workflow_input, handle, BatchSummary};
pub use http::{ClientConfig, LambdaClient, StepFunctionsClient};
pub use runtime::{
    init_tracing, local_router, run, run_local, start_blocking, LocalRun, LOG_FORMAT_ENV,
};
pub use workflow::{LocalWorkflow, WorkflowTrigger};
