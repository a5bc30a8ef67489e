use thiserror::Error;

/// Error surface for stream-batch handling and workflow triggering.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("configuration error: {0}")]
    Config(#[from] streamgate_core::ConfigError),

    #[error("unsupported event source: {kind}; only DynamoDB stream events are handled")]
    UnsupportedEvent { kind: String },

    #[error("failed to decode record {event_id}: {message}")]
    Decode { event_id: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to start workflow {arn}: {message}")]
    Workflow { arn: String, message: String },

    #[error("http client error: {0}")]
    Http(String),

    #[error("router error: {0}")]
    Router(#[from] streamgate_router::RouterError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("task join failure: {0}")]
    Join(String),
}

pub(crate) fn decode_err(event_id: impl Into<String>, message: impl Into<String>) -> ProcessError {
    ProcessError::Decode {
        event_id: event_id.into(),
        message: message.into(),
    }
}
