//! Value transforms applied between extraction and write-back.
//!
//! Every transform is total: a wrong-typed input or a missing/ill-shaped
//! config returns the input unchanged. Unknown transform names are carried
//! through deserialization as [`TransformType::Other`] and behave as `copy`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// TransformType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransformType {
    Copy,
    Uppercase,
    Lowercase,
    Trim,
    Extract,
    Join,
    Split,
    Aggregate,
    Map,
    Template,
    /// A name outside the known set. Applied as identity.
    Other(String),
}

const KNOWN_TRANSFORMS: &[TransformType] = &[
    TransformType::Copy,
    TransformType::Uppercase,
    TransformType::Lowercase,
    TransformType::Trim,
    TransformType::Extract,
    TransformType::Join,
    TransformType::Split,
    TransformType::Aggregate,
    TransformType::Map,
    TransformType::Template,
];

impl TransformType {
    /// The known transforms.
    pub fn all() -> &'static [TransformType] {
        KNOWN_TRANSFORMS
    }

    /// Comma-separated names of the known transforms, for diagnostics.
    pub fn known_names() -> String {
        Self::all()
            .iter()
            .map(TransformType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransformType::Copy => "copy",
            TransformType::Uppercase => "uppercase",
            TransformType::Lowercase => "lowercase",
            TransformType::Trim => "trim",
            TransformType::Extract => "extract",
            TransformType::Join => "join",
            TransformType::Split => "split",
            TransformType::Aggregate => "aggregate",
            TransformType::Map => "map",
            TransformType::Template => "template",
            TransformType::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TransformType::Other(_))
    }
}

impl From<&str> for TransformType {
    fn from(s: &str) -> Self {
        match s {
            "copy" => TransformType::Copy,
            "uppercase" => TransformType::Uppercase,
            "lowercase" => TransformType::Lowercase,
            "trim" => TransformType::Trim,
            "extract" => TransformType::Extract,
            "join" => TransformType::Join,
            "split" => TransformType::Split,
            "aggregate" => TransformType::Aggregate,
            "map" => TransformType::Map,
            "template" => TransformType::Template,
            other => TransformType::Other(other.to_string()),
        }
    }
}

impl From<String> for TransformType {
    fn from(s: String) -> Self {
        TransformType::from(s.as_str())
    }
}

impl From<TransformType> for String {
    fn from(t: TransformType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Apply `transform` to `value`. `None` means copy.
pub fn apply_transform(
    value: &Value,
    transform: Option<&TransformType>,
    config: Option<&Value>,
) -> Value {
    let Some(transform) = transform else {
        return value.clone();
    };
    let empty = Map::new();
    let config = config.and_then(Value::as_object).unwrap_or(&empty);

    let transformed = match transform {
        TransformType::Uppercase => value.as_str().map(|s| Value::from(s.to_uppercase())),
        TransformType::Lowercase => value.as_str().map(|s| Value::from(s.to_lowercase())),
        TransformType::Trim => value.as_str().map(|s| Value::from(s.trim())),
        TransformType::Extract => extract(value, config),
        TransformType::Join => join(value, config),
        TransformType::Split => split(value, config),
        TransformType::Aggregate => aggregate(value, config),
        TransformType::Map => map_value(value, config),
        TransformType::Template => template(value, config),
        TransformType::Copy | TransformType::Other(_) => None,
    };
    transformed.unwrap_or_else(|| value.clone())
}

fn extract(value: &Value, config: &Map<String, Value>) -> Option<Value> {
    let field = config.get("field")?.as_str()?;
    let obj = value.as_object()?;
    // A missing key extracts as an explicit null, which is written into the
    // target document; the field is not left absent.
    Some(obj.get(field).cloned().unwrap_or(Value::Null))
}

fn join(value: &Value, config: &Map<String, Value>) -> Option<Value> {
    let separator = config.get("separator")?.as_str()?;
    let items = value.as_array()?;
    Some(Value::from(join_items(items, separator)))
}

fn split(value: &Value, config: &Map<String, Value>) -> Option<Value> {
    let separator = config.get("separator")?.as_str()?;
    let s = value.as_str()?;
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        s.split(separator).map(Value::from).collect()
    };
    Some(Value::Array(parts))
}

fn aggregate(value: &Value, config: &Map<String, Value>) -> Option<Value> {
    let items = value.as_array()?;
    let kind = config.get("type").and_then(Value::as_str).unwrap_or("concat");
    let aggregated = match kind {
        "sum" => number_value(items.iter().map(numeric_or_zero).sum()),
        "count" => Value::from(items.len()),
        "first" => items.first().cloned().unwrap_or(Value::Null),
        "last" => items.last().cloned().unwrap_or(Value::Null),
        _ => {
            let separator = config
                .get("separator")
                .and_then(Value::as_str)
                .unwrap_or(", ");
            Value::from(join_items(items, separator))
        }
    };
    Some(aggregated)
}

fn map_value(value: &Value, config: &Map<String, Value>) -> Option<Value> {
    let mapping = config.get("mapping")?.as_object()?;
    let key = match value {
        Value::String(s) => s.clone(),
        Value::Number(_) | Value::Bool(_) | Value::Null => display_value(value),
        Value::Array(_) | Value::Object(_) => return None,
    };
    mapping.get(&key).cloned()
}

fn template(value: &Value, config: &Map<String, Value>) -> Option<Value> {
    let template = config.get("template")?.as_str()?;
    Some(Value::from(template.replace("{value}", &display_value(value))))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// String form used by join, template and map lookups.
///
/// Strings render bare, integral floats render without a fraction, arrays
/// render their elements comma-joined and objects render as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::Array(items) => join_items(items, ","),
        Value::Object(_) => value.to_string(),
    }
}

fn display_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

fn join_items(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Null => String::new(),
            other => display_value(other),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn numeric_or_zero(item: &Value) -> f64 {
    match item {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
