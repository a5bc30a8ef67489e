//! Change detection for `streamgate-detector`.
//!
//! `detect(before, after, operation, watched)` decides whether a stream record
//! is a real model change worth propagating. Only watched entity types are
//! considered; inserts and removals always count; modifications count only
//! when a non-bookkeeping field differs structurally.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Number, Value};
use streamgate_core::types::{Operation, Snapshot, TypeName, WatchList, TYPENAME_FIELD};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Bookkeeping fields excluded from change comparison.
pub const IGNORED_FIELDS: [&str; 6] = [
    "version",
    "createdAt",
    "updatedAt",
    TYPENAME_FIELD,
    "versionCreatedAt",
    "versionUpdatedAt",
];

/// Result of inspecting one before/after pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Type tag from `after`, falling back to `before`.
    pub entity_type: Option<TypeName>,
    /// Whether the record should be propagated.
    pub changed: bool,
    /// Non-ignored fields that differ. Only filled for watched modifications;
    /// inserts and removals are changed as a whole.
    pub changed_fields: Vec<String>,
}

impl Detection {
    fn unchanged(entity_type: Option<TypeName>) -> Self {
        Self {
            entity_type,
            changed: false,
            changed_fields: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Inspect a snapshot pair.
///
/// Never fails: a missing snapshot compares as an empty object and a record
/// without any type tag is simply not changed.
pub fn detect(
    before: Option<&Snapshot>,
    after: Option<&Snapshot>,
    operation: Operation,
    watched: &WatchList,
) -> Detection {
    let entity_type = type_tag(after).or_else(|| type_tag(before));

    let Some(type_name) = entity_type.as_ref() else {
        return Detection::unchanged(None);
    };
    if !watched.contains(type_name.as_str()) {
        return Detection::unchanged(entity_type);
    }

    match operation {
        Operation::Create | Operation::Delete => Detection {
            entity_type,
            changed: true,
            changed_fields: Vec::new(),
        },
        Operation::Update => {
            let empty = Snapshot::new();
            let fields = changed_fields(before.unwrap_or(&empty), after.unwrap_or(&empty));
            for field in &fields {
                tracing::debug!(entity_type = %type_name, field = %field, "model field changed");
            }
            Detection {
                changed: !fields.is_empty(),
                entity_type,
                changed_fields: fields,
            }
        }
    }
}

/// Non-ignored fields that are present on only one side, or present on both
/// but not structurally equal. Sorted by name.
pub fn changed_fields(before: &Snapshot, after: &Snapshot) -> Vec<String> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|key| !is_ignored_field(key))
        .filter(|key| match (before.get(*key), after.get(*key)) {
            (Some(old), Some(new)) => !values_equal(old, new),
            _ => true,
        })
        .cloned()
        .collect()
}

pub fn is_ignored_field(name: &str) -> bool {
    IGNORED_FIELDS.contains(&name)
}

/// Recursive structural equality.
///
/// Primitives compare by value, with numbers compared numerically so that
/// `1` and `1.0` are equal. Arrays compare positionally. Objects are equal
/// when they have the same key set and pairwise-equal values. `null` is a
/// value like any other: it equals only `null`.
///
/// Decoded snapshots never contain callables; anything opaque reaches this
/// function already in its serialized form and is compared as such.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn type_tag(snapshot: Option<&Snapshot>) -> Option<TypeName> {
    snapshot?
        .get(TYPENAME_FIELD)?
        .as_str()
        .map(TypeName::from)
}

/// Mixed integer and float operands fall back to `f64`, so integers above
/// 2^53 can compare equal to a nearby float. This matches the float-only
/// number comparison of the systems writing these records.
fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
