//! HTTP clients for Lambda and Step Functions compatible endpoints.
//!
//! Requests are unsigned, so these target local emulators. Both clients are
//! built from an explicit [`ClientConfig`]; nothing is read from the
//! environment here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use streamgate_core::config::{ENV_LAMBDA_ENDPOINT, ENV_STEP_FUNCTIONS_ENDPOINT};
use streamgate_core::{ConfigError, ProcessorConfig};
use streamgate_router::{
    DispatchError, DispatchRequest, Dispatcher, IdentityLookup, LookupError, LookupResponse,
};

use crate::error::ProcessError;
use crate::workflow::WorkflowTrigger;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";
const START_EXECUTION_TARGET: &str = "AWSStepFunctions.StartExecution";
const AMZ_JSON: &str = "application/x-amz-json-1.0";

/// Where a client sends requests and how long it waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn lambda(config: &ProcessorConfig) -> Result<Self, ProcessError> {
        config
            .endpoints
            .lambda
            .as_deref()
            .map(Self::new)
            .ok_or_else(|| ConfigError::Missing { name: ENV_LAMBDA_ENDPOINT }.into())
    }

    pub fn step_functions(config: &ProcessorConfig) -> Result<Self, ProcessError> {
        config
            .endpoints
            .step_functions
            .as_deref()
            .map(Self::new)
            .ok_or_else(|| {
                ConfigError::Missing {
                    name: ENV_STEP_FUNCTIONS_ENDPOINT,
                }
                .into()
            })
    }

    fn build_http(&self) -> Result<reqwest::Client, ProcessError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProcessError::Http(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Lambda
// ---------------------------------------------------------------------------

struct Invocation {
    status: StatusCode,
    function_error: Option<String>,
    body: Value,
}

/// Invokes the dispatch and lookup functions.
#[derive(Debug, Clone)]
pub struct LambdaClient {
    http: reqwest::Client,
    endpoint: String,
    dispatch_function: String,
    lookup_function: String,
}

impl LambdaClient {
    pub fn new(
        config: &ClientConfig,
        dispatch_function: impl Into<String>,
        lookup_function: impl Into<String>,
    ) -> Result<Self, ProcessError> {
        Ok(Self {
            http: config.build_http()?,
            endpoint: config.endpoint.clone(),
            dispatch_function: dispatch_function.into(),
            lookup_function: lookup_function.into(),
        })
    }

    pub fn from_config(config: &ProcessorConfig) -> Result<Self, ProcessError> {
        Self::new(
            &ClientConfig::lambda(config)?,
            config.dispatch_function.clone(),
            config.lookup_function().to_string(),
        )
    }

    fn invocation_url(&self, function: &str) -> String {
        format!("{}/2015-03-31/functions/{function}/invocations", self.endpoint)
    }

    async fn invoke(&self, function: &str, payload: &Value) -> Result<Invocation, reqwest::Error> {
        let response = self
            .http
            .post(self.invocation_url(function))
            .header("content-type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok(Invocation {
            status,
            function_error,
            body,
        })
    }
}

fn error_message(body: &Value) -> String {
    body.get("errorMessage")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Dispatcher for LambdaClient {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, DispatchError> {
        let invocation = self
            .invoke(&self.dispatch_function, &request.envelope())
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        if !invocation.status.is_success() {
            return Err(DispatchError::Rejected {
                status: invocation.status.as_u16(),
                message: error_message(&invocation.body),
            });
        }
        if invocation.function_error.is_some() {
            return Err(DispatchError::Function(error_message(&invocation.body)));
        }
        Ok(invocation.body)
    }
}

#[async_trait]
impl IdentityLookup for LambdaClient {
    async fn read_identity_mapping(
        &self,
        request: &DispatchRequest,
    ) -> Result<LookupResponse, LookupError> {
        let invocation = self
            .invoke(&self.lookup_function, &request.envelope())
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout
                } else {
                    LookupError::Transport(e.to_string())
                }
            })?;

        if invocation.status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !invocation.status.is_success() {
            return Err(LookupError::Transport(format!(
                "status {}: {}",
                invocation.status,
                error_message(&invocation.body)
            )));
        }
        if invocation.function_error.is_some() {
            let message = error_message(&invocation.body);
            return Err(if message.to_ascii_lowercase().contains("could not find") {
                LookupError::NotFound
            } else {
                LookupError::InvalidResponse(message)
            });
        }
        parse_lookup_body(invocation.body)
    }
}

/// Accepts both a wrapped (`{"Payload": {...}}`) and a bare function result.
fn parse_lookup_body(body: Value) -> Result<LookupResponse, LookupError> {
    let wrapped = body
        .as_object()
        .is_some_and(|o| o.contains_key("payload") || o.contains_key("Payload"));
    let body = match body {
        Value::Null => return Err(LookupError::NotFound),
        body if wrapped => body,
        body => json!({ "payload": body }),
    };
    serde_json::from_value(body).map_err(|e| LookupError::InvalidResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Step Functions
// ---------------------------------------------------------------------------

/// Starts state machine executions through the JSON 1.0 protocol.
#[derive(Debug, Clone)]
pub struct StepFunctionsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl StepFunctionsClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ProcessError> {
        Ok(Self {
            http: config.build_http()?,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn from_config(config: &ProcessorConfig) -> Result<Self, ProcessError> {
        Self::new(&ClientConfig::step_functions(config)?)
    }
}

#[async_trait]
impl WorkflowTrigger for StepFunctionsClient {
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        input: &str,
    ) -> Result<String, ProcessError> {
        let fail = |message: String| ProcessError::Workflow {
            arn: state_machine_arn.to_string(),
            message,
        };

        let response = self
            .http
            .post(format!("{}/", self.endpoint))
            .header("x-amz-target", START_EXECUTION_TARGET)
            .header("content-type", AMZ_JSON)
            .body(
                json!({ "stateMachineArn": state_machine_arn, "input": input }).to_string(),
            )
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| fail(e.to_string()))?;
        if !status.is_success() {
            let message = body
                .get("message")
                .or_else(|| body.get("Message"))
                .and_then(Value::as_str)
                .map_or_else(|| body.to_string(), str::to_string);
            return Err(fail(format!("status {status}: {message}")));
        }
        body.get("executionArn")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| fail("response has no executionArn".into()))
    }
}
