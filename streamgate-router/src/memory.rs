//! In-memory seams for dry runs and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::decision::{Action, DispatchRequest, LookupResponse};
use crate::error::{DispatchError, LookupError};
use crate::executor::{Dispatcher, IdentityLookup};

/// Records every dispatch instead of sending it. Optionally fails one action.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<DispatchRequest>>,
    fail_on: Option<Action>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that rejects every request for `action`.
    pub fn failing_on(action: Action) -> Self {
        Self {
            sent: Mutex::default(),
            fail_on: Some(action),
        }
    }

    /// Requests dispatched so far, in arrival order.
    pub fn sent(&self) -> Vec<DispatchRequest> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, DispatchError> {
        if self.fail_on == Some(request.action) {
            return Err(DispatchError::Rejected {
                status: 500,
                message: format!("{} refused", request.action),
            });
        }
        match self.sent.lock() {
            Ok(mut sent) => sent.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        Ok(json!({ "StatusCode": 200 }))
    }
}

/// Resolves mapping keys from a fixed table; everything else is not found.
#[derive(Debug, Default)]
pub struct StaticLookup {
    users: HashMap<String, String>,
    reads: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a composite key to a user id.
    pub fn with(mut self, key: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.users.insert(key.into(), user_id.into());
        self
    }

    /// Keys read so far.
    pub fn reads(&self) -> Vec<String> {
        match self.reads.lock() {
            Ok(reads) => reads.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl IdentityLookup for StaticLookup {
    async fn read_identity_mapping(
        &self,
        request: &DispatchRequest,
    ) -> Result<LookupResponse, LookupError> {
        let key = request
            .body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| LookupError::InvalidResponse("read request without id".into()))?
            .to_string();
        match self.reads.lock() {
            Ok(mut reads) => reads.push(key.clone()),
            Err(poisoned) => poisoned.into_inner().push(key.clone()),
        }
        self.users
            .get(&key)
            .map(LookupResponse::with_user_id)
            .ok_or(LookupError::NotFound)
    }
}
