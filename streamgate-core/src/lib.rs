//! Streamgate core library — change-record types, configuration, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes, operation tags, change records, workflow input
//! - [`error`] — [`ConfigError`]
//! - [`config`] — load / validate processor configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{Endpoints, ProcessorConfig};
pub use error::ConfigError;
pub use types::{
    ChangeRecord, EventId, EventSource, Operation, Snapshot, TypeName, WatchList, WorkflowInput,
    EVENT_TYPENAME, TYPENAME_FIELD,
};
