//! DynamoDB stream payloads and attribute-value unmarshalling.

use serde::Deserialize;
use serde_json::{Map, Number, Value};
use streamgate_core::types::{Operation, Snapshot};

use crate::error::{decode_err, ProcessError};

/// A raw stream batch as delivered to the function.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "Records")]
    pub records: Vec<StreamEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamEntry {
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "eventName")]
    pub operation: Operation,
    #[serde(rename = "eventSource", default)]
    pub event_source: Option<String>,
    #[serde(default)]
    pub dynamodb: StreamImages,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamImages {
    #[serde(rename = "NewImage", default)]
    pub new_image: Option<Map<String, Value>>,
    #[serde(rename = "OldImage", default)]
    pub old_image: Option<Map<String, Value>>,
}

impl StreamEntry {
    pub fn after(&self) -> Result<Option<Snapshot>, ProcessError> {
        self.dynamodb
            .new_image
            .as_ref()
            .map(|image| unmarshall(&self.event_id, image))
            .transpose()
    }

    pub fn before(&self) -> Result<Option<Snapshot>, ProcessError> {
        self.dynamodb
            .old_image
            .as_ref()
            .map(|image| unmarshall(&self.event_id, image))
            .transpose()
    }
}

/// Convert a typed image (`{"name": {"S": "x"}}`) into a plain snapshot.
pub fn unmarshall(event_id: &str, image: &Map<String, Value>) -> Result<Snapshot, ProcessError> {
    image
        .iter()
        .map(|(name, attr)| {
            attribute_value(attr)
                .map(|value| (name.clone(), value))
                .map_err(|message| decode_err(event_id, format!("attribute `{name}`: {message}")))
        })
        .collect()
}

fn attribute_value(attr: &Value) -> Result<Value, String> {
    let typed = attr
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| format!("expected a single-key attribute value, got {attr}"))?;
    let Some((tag, inner)) = typed.iter().next() else {
        return Err("empty attribute value".into());
    };

    match tag.as_str() {
        "S" | "B" => as_str(inner).map(|s| Value::String(s.to_string())),
        "N" => as_str(inner).and_then(number),
        "BOOL" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| format!("BOOL expects a boolean, got {inner}")),
        "NULL" => Ok(Value::Null),
        "M" => {
            let map = inner
                .as_object()
                .ok_or_else(|| format!("M expects an object, got {inner}"))?;
            map.iter()
                .map(|(k, v)| attribute_value(v).map(|v| (k.clone(), v)))
                .collect::<Result<Map<_, _>, _>>()
                .map(Value::Object)
        }
        "L" => list(inner)?
            .iter()
            .map(attribute_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "SS" | "BS" => list(inner)?
            .iter()
            .map(|v| as_str(v).map(|s| Value::String(s.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "NS" => list(inner)?
            .iter()
            .map(|v| as_str(v).and_then(number))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(format!("unknown attribute type `{other}`")),
    }
}

fn as_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {value}"))
}

fn list(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected a list, got {value}"))
}

fn number(text: &str) -> Result<Value, String> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(u) = text.parse::<u64>() {
        return Ok(Value::Number(u.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("`{text}` is not a number"))
}
