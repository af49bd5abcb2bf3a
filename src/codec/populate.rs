//! Binding of flat `key=value` parameters onto a JSON message skeleton.
//!
//! The skeleton is the JSON rendering of a blank request. String parameters
//! are coerced to the field type recorded in the request's [`Shape`]; where
//! the shape knows nothing, the type of the value they replace decides.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use crate::context::UploadRef;
use crate::errors::Status;
use crate::service::Shape;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Upload(UploadRef),
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopulateError {
    #[error("no field {0}")]
    UnknownField(String),
    #[error("field {field}: cannot parse {value:?} as {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        value: String,
    },
    #[error("too many values for field {0}")]
    TooManyValues(String),
    #[error("field {0} is a message and cannot take a plain value")]
    NotAScalar(String),
    #[error("field {0} is not a message")]
    NotAMessage(String),
}

/// Dotted field paths that parameters must not bind to, with everything below them.
#[derive(Debug, Clone, Default)]
pub struct FieldFilter {
    prefixes: Vec<Vec<String>>,
}

impl FieldFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(&mut self, dotted: &str) {
        if dotted.is_empty() {
            return;
        }
        self.prefixes
            .push(dotted.split('.').map(str::to_string).collect());
    }

    pub fn excludes(&self, key: &str) -> bool {
        let segments: Vec<&str> = key.split('.').collect();
        self.prefixes.iter().any(|prefix| {
            prefix.len() <= segments.len()
                && prefix.iter().zip(&segments).all(|(p, s)| p == s)
        })
    }
}

/// Group `(key, value)` pairs by key, keeping first-seen key order and value order.
pub fn group<V>(pairs: impl IntoIterator<Item = (String, V)>) -> Vec<(String, Vec<V>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut grouped: Vec<(String, Vec<V>)> = Vec::new();
    for (key, value) in pairs {
        match index.get(&key) {
            Some(&i) => grouped[i].1.push(value),
            None => {
                index.insert(key.clone(), grouped.len());
                grouped.push((key, vec![value]));
            }
        }
    }
    grouped
}

/// Bind grouped parameters onto `target`, skipping filtered and unknown keys.
pub fn populate_params(
    target: &mut Value,
    shape: &Shape,
    params: &[(String, Vec<FieldValue>)],
    filter: &FieldFilter,
) -> Result<(), Status> {
    for (key, values) in params {
        if filter.excludes(key) {
            tracing::trace!(field = %key, "Parameter filtered");
            continue;
        }
        match populate_field(target, shape, key, values) {
            Ok(()) => {}
            Err(PopulateError::UnknownField(_)) => {
                tracing::debug!(field = %key, "Ignoring unknown parameter");
            }
            Err(e) => return Err(Status::invalid_argument(e.to_string())),
        }
    }
    Ok(())
}

/// Bind `values` to the dotted field `key` of `root`, whose type is `shape`.
pub fn populate_field(
    root: &mut Value,
    shape: &Shape,
    key: &str,
    values: &[FieldValue],
) -> Result<(), PopulateError> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PopulateError::UnknownField(key.to_string()));
    }
    let Some((last, parents)) = segments.split_last() else {
        return Err(PopulateError::UnknownField(key.to_string()));
    };
    if !root.is_object() {
        return Err(PopulateError::UnknownField(key.to_string()));
    }

    let mut current = root;
    let mut shape = shape;
    // Below a message of unknown shape, fields are created on demand.
    let mut dynamic = false;
    for segment in parents {
        (current, shape) = enter(current, shape, segment, key, &mut dynamic)?;
    }
    let (slot, shape) = enter(current, shape, last, key, &mut dynamic)?;
    assign(slot, shape, key, values)
}

fn enter<'a, 's>(
    current: &'a mut Value,
    shape: &'s Shape,
    segment: &str,
    key: &str,
    dynamic: &mut bool,
) -> Result<(&'a mut Value, &'s Shape), PopulateError> {
    if current.is_null() {
        match shape.unwrapped() {
            message @ Shape::Message(_) => *current = message.zero(),
            _ => {
                *current = Value::Object(Map::new());
                *dynamic = true;
            }
        }
    }
    let Value::Object(fields) = current else {
        return Err(PopulateError::NotAMessage(key.to_string()));
    };
    let field_shape = shape.field(segment);
    if *dynamic {
        let slot = fields.entry(segment.to_string()).or_insert(Value::Null);
        return Ok((slot, field_shape.unwrap_or(Shape::unknown())));
    }
    match (fields.contains_key(segment), field_shape) {
        (true, _) => {}
        (false, Some(field_shape)) => {
            fields.insert(segment.to_string(), field_shape.zero());
        }
        (false, None) => return Err(PopulateError::UnknownField(key.to_string())),
    }
    let slot = fields
        .get_mut(segment)
        .ok_or_else(|| PopulateError::UnknownField(key.to_string()))?;
    Ok((slot, field_shape.unwrap_or(Shape::unknown())))
}

fn assign(slot: &mut Value, shape: &Shape, key: &str, values: &[FieldValue]) -> Result<(), PopulateError> {
    let inferred;
    let shape = if shape.is_unknown() {
        inferred = Shape::from_value(&*slot);
        &inferred
    } else {
        shape
    };

    if let Shape::Repeated(element) = shape.unwrapped() {
        *slot = Value::Array(
            values
                .iter()
                .map(|v| convert(element, key, v))
                .collect::<Result<_, _>>()?,
        );
        return Ok(());
    }

    let value = match values {
        [] => return Ok(()),
        [value] => value,
        _ => return Err(PopulateError::TooManyValues(key.to_string())),
    };
    *slot = convert(shape, key, value)?;
    Ok(())
}

fn convert(shape: &Shape, key: &str, value: &FieldValue) -> Result<Value, PopulateError> {
    let text = match value {
        FieldValue::Upload(upload) => {
            return Ok(Value::Object(Map::from_iter([(
                "index".to_string(),
                Value::from(upload.index),
            )])))
        }
        FieldValue::Text(text) => text,
    };
    let mismatch = |expected| PopulateError::TypeMismatch {
        field: key.to_string(),
        expected,
        value: text.clone(),
    };

    match shape.unwrapped() {
        Shape::Unknown | Shape::String => Ok(Value::String(text.clone())),
        Shape::Bool => parse_bool(text).map(Value::Bool).ok_or_else(|| mismatch("bool")),
        Shape::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| mismatch("number")),
        Shape::Integer => {
            let text = text.trim();
            if let Ok(i) = text.parse::<i64>() {
                Ok(Value::from(i))
            } else if let Ok(u) = text.parse::<u64>() {
                Ok(Value::from(u))
            } else {
                Err(mismatch("integer"))
            }
        }
        Shape::Repeated(_) | Shape::Message(_) | Shape::Optional(_) => {
            Err(PopulateError::NotAScalar(key.to_string()))
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
