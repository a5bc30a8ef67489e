//! Domain types for change records flowing from the stream to the router.
//!
//! Snapshots are plain JSON objects (`serde_json::Map`). The serialized form of
//! [`ChangeRecord`] and [`WorkflowInput`] is the workflow input consumed by the
//! router, so field names follow that wire format (`newModel`, `oldModel`, ...).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the entity type tag on every stored model.
pub const TYPENAME_FIELD: &str = "__typename";

/// The generic event model. Always routable, never part of the watched list.
pub const EVENT_TYPENAME: &str = "Event";

/// A decoded model image.
pub type Snapshot = Map<String, Value>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed entity type name (the `__typename` tag).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeName(pub String);

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TypeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl TypeName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_event(&self) -> bool {
        self.0 == EVENT_TYPENAME
    }
}

/// Opaque identifier of the stream entry a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a record was produced. Serialized with the stream's own tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "INSERT")]
    Create,
    #[serde(rename = "MODIFY")]
    Update,
    #[serde(rename = "REMOVE")]
    Delete,
}

impl Operation {
    /// The stream tag for this operation.
    pub fn tag(self) -> &'static str {
        match self {
            Operation::Create => "INSERT",
            Operation::Update => "MODIFY",
            Operation::Delete => "REMOVE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Operation {
    type Err = String;

    /// Accepts both the stream tags and the create/update/delete spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" | "CREATE" => Ok(Operation::Create),
            "MODIFY" | "UPDATE" => Ok(Operation::Update),
            "REMOVE" | "DELETE" => Ok(Operation::Delete),
            other => Err(format!(
                "unknown operation '{other}'; expected: INSERT, MODIFY, REMOVE"
            )),
        }
    }
}

/// Origin of a change record. Only the table stream exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventSource {
    #[default]
    #[serde(rename = "DYNAMODB")]
    Dynamodb,
}

// ---------------------------------------------------------------------------
// Watched types
// ---------------------------------------------------------------------------

/// Entity types this deployment monitors for changes.
///
/// The generic [`EVENT_TYPENAME`] is never stored here; detection adds it
/// back with [`WatchList::with_event`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchList(BTreeSet<String>);

impl WatchList {
    /// Build from configured model names, trimming whitespace and dropping
    /// blanks and the generic event type.
    pub fn from_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            models
                .into_iter()
                .map(|m| m.as_ref().trim().to_string())
                .filter(|m| !m.is_empty() && m != EVENT_TYPENAME)
                .collect(),
        )
    }

    /// Parse a comma-separated list such as `"Order, Customer,Event"`.
    pub fn parse(list: &str) -> Self {
        Self::from_models(list.split(','))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.0.contains(type_name)
    }

    /// Copy of this list with the generic event type added, for detection
    /// runs that must also report event changes.
    pub fn with_event(&self) -> Self {
        let mut set = self.0.clone();
        set.insert(EVENT_TYPENAME.to_string());
        Self(set)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One before/after snapshot pair extracted from a stream entry.
///
/// Lives for one routing pass only; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(rename = "newModel", default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Snapshot>,
    #[serde(rename = "oldModel", default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Snapshot>,
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "eventType")]
    pub operation: Operation,
    #[serde(default)]
    pub event_source: EventSource,
    #[serde(rename = "typename")]
    pub entity_type: Option<TypeName>,
    #[serde(rename = "hasModelFieldChanged")]
    pub changed: bool,
}

impl ChangeRecord {
    /// `true` when the images present match the operation: `INSERT` carries
    /// only `after`, `REMOVE` only `before`, `MODIFY` both.
    pub fn has_consistent_images(&self) -> bool {
        match self.operation {
            Operation::Create => self.after.is_some() && self.before.is_none(),
            Operation::Update => self.after.is_some() && self.before.is_some(),
            Operation::Delete => self.after.is_none() && self.before.is_some(),
        }
    }

    /// Look up a dotted path (`data.object.bucketName`) on the `after` image.
    pub fn after_path(&self, path: &str) -> Option<&Value> {
        lookup_path(self.after.as_ref()?, path)
    }
}

/// Walk a dotted path through nested objects.
pub fn lookup_path<'a>(snapshot: &'a Snapshot, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = snapshot.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Workflow input: every record of one stream batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkflowInput {
    #[serde(rename = "Records")]
    pub records: Vec<ChangeRecord>,
}

impl WorkflowInput {
    pub fn changed_count(&self) -> usize {
        self.records.iter().filter(|r| r.changed).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
