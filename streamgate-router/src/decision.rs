//! Routing decisions and the requests they carry.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Named downstream actions understood by the dispatch function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "event-model/publish")]
    PublishEvent,
    #[serde(rename = "file/create")]
    FileCreate,
    #[serde(rename = "file/delete")]
    FileDelete,
    #[serde(rename = "identity-to-user-mapping/create")]
    IdentityMappingCreate,
    #[serde(rename = "identity-to-user-mapping/delete")]
    IdentityMappingDelete,
    /// Request/response; used for the user id lookup only.
    #[serde(rename = "identity-to-user-mapping/read")]
    IdentityMappingRead,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::PublishEvent => "event-model/publish",
            Action::FileCreate => "file/create",
            Action::FileDelete => "file/delete",
            Action::IdentityMappingCreate => "identity-to-user-mapping/create",
            Action::IdentityMappingDelete => "identity-to-user-mapping/delete",
            Action::IdentityMappingRead => "identity-to-user-mapping/read",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One invocation of a named action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub action: Action,
    pub body: Value,
}

impl DispatchRequest {
    pub fn new(action: Action, body: Value) -> Self {
        Self { action, body }
    }

    /// The payload delivered to the dispatch function.
    pub fn envelope(&self) -> Value {
        json!({
            "action": self.action.name(),
            "IS_STEP_FUNCTION": true,
            "body": self.body,
        })
    }
}

/// Response of the identity-mapping read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LookupResponse {
    #[serde(default, alias = "Payload", skip_serializing_if = "Option::is_none")]
    pub payload: Option<LookupPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LookupPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl LookupResponse {
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            payload: Some(LookupPayload {
                user_id: Some(user_id.into()),
            }),
        }
    }

    /// The resolved user id, if present and non-empty.
    pub fn user_id(&self) -> Option<&str> {
        self.payload
            .as_ref()?
            .user_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// The three independent routing stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Publish,
    FileDerivation,
    ForeignIdentity,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Publish => write!(f, "publish"),
            Stage::FileDerivation => write!(f, "file-derivation"),
            Stage::ForeignIdentity => write!(f, "foreign-identity"),
        }
    }
}

/// Outcome of one stage for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Locally originated bus event without a medium id yet.
    PublishToBus { payload: Value },
    /// Blob created; `identity_lookup` holds the mapping key to resolve a
    /// user id before dispatching, when the object names an identity.
    DeriveFileCreate {
        request: Map<String, Value>,
        identity_lookup: Option<String>,
    },
    /// Blob deleted.
    DeriveFileDelete { payload: Value },
    /// Foreign identity-mapping create request.
    ForwardIdentityMappingCreate { payload: Value },
    /// Foreign identity-mapping delete request.
    ForwardIdentityMappingDelete { payload: Value },
    NoOp,
}

impl RoutingDecision {
    /// Action dispatched for this decision, if any.
    pub fn action(&self) -> Option<Action> {
        match self {
            RoutingDecision::PublishToBus { .. } => Some(Action::PublishEvent),
            RoutingDecision::DeriveFileCreate { .. } => Some(Action::FileCreate),
            RoutingDecision::DeriveFileDelete { .. } => Some(Action::FileDelete),
            RoutingDecision::ForwardIdentityMappingCreate { .. } => {
                Some(Action::IdentityMappingCreate)
            }
            RoutingDecision::ForwardIdentityMappingDelete { .. } => {
                Some(Action::IdentityMappingDelete)
            }
            RoutingDecision::NoOp => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, RoutingDecision::NoOp)
    }

    /// The request as it would be dispatched without identity enrichment.
    pub fn request(&self) -> Option<DispatchRequest> {
        let body = match self {
            RoutingDecision::PublishToBus { payload }
            | RoutingDecision::DeriveFileDelete { payload }
            | RoutingDecision::ForwardIdentityMappingCreate { payload }
            | RoutingDecision::ForwardIdentityMappingDelete { payload } => payload.clone(),
            RoutingDecision::DeriveFileCreate { request, .. } => Value::Object(request.clone()),
            RoutingDecision::NoOp => return None,
        };
        self.action().map(|action| DispatchRequest::new(action, body))
    }
}

/// Stage decisions for one record, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub stages: Vec<(Stage, RoutingDecision)>,
}

impl RoutePlan {
    /// Decisions that dispatch something, in order.
    pub fn dispatches(&self) -> impl Iterator<Item = (Stage, &RoutingDecision)> {
        self.stages
            .iter()
            .filter(|(_, decision)| !decision.is_noop())
            .map(|(stage, decision)| (*stage, decision))
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches().count()
    }

    pub fn is_noop(&self) -> bool {
        self.dispatch_count() == 0
    }

    pub fn decision(&self, stage: Stage) -> Option<&RoutingDecision> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, decision)| decision)
    }
}
