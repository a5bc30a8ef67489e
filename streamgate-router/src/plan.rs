//! The routing decision tree.
//!
//! Three stages run for every routed record, in order, and each decides on
//! its own:
//!
//! ```text
//! 1. publish           medium == EVENT_BRIDGE && source == self && mediumId unset
//!                        -> PublishToBus(after)
//! 2. file-derivation   typename == Event && medium == S3 && source == self
//!                        type == s3File.created -> DeriveFileCreate (+ identity lookup)
//!                        type == s3File.deleted -> DeriveFileDelete
//! 3. foreign-identity  medium == EVENT_BRIDGE && source != self
//!                        type == IdentityToUserMapping.createRequest -> ForwardIdentityMappingCreate
//!                        type == IdentityToUserMapping.deleteRequest -> ForwardIdentityMappingDelete
//! ```
//!
//! Every field is read from the `after` image. A condition on a missing or
//! non-string field is false, so removals never dispatch anything.

use serde_json::{Map, Value};
use streamgate_core::types::{ChangeRecord, Operation, TypeName};

use crate::decision::{RoutePlan, RoutingDecision, Stage};
use crate::keys::{file_key, identity_mapping_key};

pub const MEDIUM_EVENT_BRIDGE: &str = "EVENT_BRIDGE";
pub const MEDIUM_S3: &str = "S3";

pub const FILE_CREATED: &str = "s3File.created";
pub const FILE_DELETED: &str = "s3File.deleted";
pub const IDENTITY_MAPPING_CREATE_REQUEST: &str = "IdentityToUserMapping.createRequest";
pub const IDENTITY_MAPPING_DELETE_REQUEST: &str = "IdentityToUserMapping.deleteRequest";

const OBJECT: &str = "data.object";
const PREVIOUS_ATTRIBUTES: &str = "data.previousAttributes";

/// What the decision tree needs to know about this deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterContext {
    /// Compared against each event's `source`.
    pub service_name: String,
}

impl RouterContext {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn is_self(&self, source: Option<&str>) -> bool {
        source == Some(self.service_name.as_str())
    }
}

/// Whether a record enters the decision tree at all: it must be a changed
/// insert of the generic event type. Edits and removals of events, and
/// records of any other type, never dispatch.
pub fn should_route(record: &ChangeRecord) -> bool {
    record.changed
        && record.operation == Operation::Create
        && record.entity_type.as_ref().is_some_and(TypeName::is_event)
}

/// Evaluate all three stages for one record. Pure: no I/O.
pub fn plan(record: &ChangeRecord, ctx: &RouterContext) -> RoutePlan {
    RoutePlan {
        stages: vec![
            (Stage::Publish, publish_stage(record, ctx)),
            (Stage::FileDerivation, file_stage(record, ctx)),
            (Stage::ForeignIdentity, foreign_identity_stage(record, ctx)),
        ],
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn publish_stage(record: &ChangeRecord, ctx: &RouterContext) -> RoutingDecision {
    let Some(after) = record.after.as_ref() else {
        return RoutingDecision::NoOp;
    };
    let medium_id_unset = match record.after_path("mediumId") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if medium(record) == Some(MEDIUM_EVENT_BRIDGE) && ctx.is_self(source(record)) && medium_id_unset
    {
        RoutingDecision::PublishToBus {
            payload: Value::Object(after.clone()),
        }
    } else {
        RoutingDecision::NoOp
    }
}

fn file_stage(record: &ChangeRecord, ctx: &RouterContext) -> RoutingDecision {
    let is_event = record.entity_type.as_ref().is_some_and(TypeName::is_event);
    if !is_event || medium(record) != Some(MEDIUM_S3) || !ctx.is_self(source(record)) {
        return RoutingDecision::NoOp;
    }

    match event_type(record) {
        Some(FILE_CREATED) => file_create(record),
        Some(FILE_DELETED) => file_delete(record),
        _ => RoutingDecision::NoOp,
    }
}

fn foreign_identity_stage(record: &ChangeRecord, ctx: &RouterContext) -> RoutingDecision {
    let Some(src) = source(record) else {
        return RoutingDecision::NoOp;
    };
    if medium(record) != Some(MEDIUM_EVENT_BRIDGE) || ctx.is_self(Some(src)) {
        return RoutingDecision::NoOp;
    }
    let Some(payload) = record.after_path(OBJECT).cloned() else {
        return RoutingDecision::NoOp;
    };

    match event_type(record) {
        Some(IDENTITY_MAPPING_CREATE_REQUEST) => {
            RoutingDecision::ForwardIdentityMappingCreate { payload }
        }
        Some(IDENTITY_MAPPING_DELETE_REQUEST) => {
            RoutingDecision::ForwardIdentityMappingDelete { payload }
        }
        _ => RoutingDecision::NoOp,
    }
}

// ---------------------------------------------------------------------------
// File requests
// ---------------------------------------------------------------------------

/// `{bucketName, filePath, size}` plus `tags` / `metadata` when set. An
/// object descriptor without bucket or path produces no request.
fn file_create(record: &ChangeRecord) -> RoutingDecision {
    let Some(object) = record.after_path(OBJECT).and_then(Value::as_object) else {
        return RoutingDecision::NoOp;
    };
    let (Some(bucket), Some(path)) = (str_field(object, "bucketName"), str_field(object, "filePath"))
    else {
        return RoutingDecision::NoOp;
    };

    let mut request = Map::new();
    request.insert("bucketName".into(), Value::String(bucket.to_string()));
    request.insert("filePath".into(), Value::String(path.to_string()));
    if let Some(size) = object.get("size") {
        request.insert("size".into(), size.clone());
    }
    for optional in ["tags", "metadata"] {
        match object.get(optional) {
            None | Some(Value::Null) => {}
            Some(value) => {
                request.insert(optional.into(), value.clone());
            }
        }
    }

    let identity_lookup = str_field(object, "cognitoIdentityId")
        .filter(|id| !id.is_empty())
        .map(identity_mapping_key);

    RoutingDecision::DeriveFileCreate {
        request,
        identity_lookup,
    }
}

/// The object is already gone, so its key comes from the previous attributes.
fn file_delete(record: &ChangeRecord) -> RoutingDecision {
    let Some(previous) = record
        .after_path(PREVIOUS_ATTRIBUTES)
        .and_then(Value::as_object)
    else {
        return RoutingDecision::NoOp;
    };
    match (str_field(previous, "bucketName"), str_field(previous, "filePath")) {
        (Some(bucket), Some(path)) => RoutingDecision::DeriveFileDelete {
            payload: serde_json::json!({ "id": file_key(bucket, path) }),
        },
        _ => RoutingDecision::NoOp,
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

fn medium(record: &ChangeRecord) -> Option<&str> {
    record.after_path("medium").and_then(Value::as_str)
}

fn source(record: &ChangeRecord) -> Option<&str> {
    record.after_path("source").and_then(Value::as_str)
}

fn event_type(record: &ChangeRecord) -> Option<&str> {
    record.after_path("type").and_then(Value::as_str)
}

fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}
