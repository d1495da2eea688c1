//! Request coercion
//!
//! Turns raw wire input into a JSON object that matches a route's request
//! schema exactly, then decodes it into the handler's request type.
//!
//! - unknown fields are rejected
//! - declared defaults fill omitted fields, omitted optionals become `null`
//! - numeric-looking strings become numbers, `""` for an enum becomes `null`
//! - nested objects are checked recursively against the same descriptors the
//!   generator renders
//!
//! Every offending field is collected before the request is rejected.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::registry::Method;
use crate::schema::{LiteralValue, ObjectRef, Primitive, TypeDescriptor};

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("decimal pattern is valid"));

/// Field name used for problems with the payload as a whole
pub const ROOT_FIELD: &str = "__root__";

// =============================================================================
// Issues
// =============================================================================

/// One offending field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Dotted path, `items[2]` for list elements
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

crate::describe_object!(FieldIssue => "FieldIssue" {
    "field": String,
    "reason": String,
});

/// The request did not match its schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Request payload failed validation ({} issue(s))", .issues.len())]
pub struct ValidationFailure {
    pub issues: Vec<FieldIssue>,
}

// =============================================================================
// Raw Input
// =============================================================================

/// Request data as the transport hands it over
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    /// Query string pairs of a GET request, in order, repeats allowed
    Query(Vec<(String, String)>),
    /// Parsed JSON body of a POST request
    Json(Value),
}

impl RawInput {
    pub fn query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawInput::Query(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Method this input arrives with
    pub fn method(&self) -> Method {
        match self {
            RawInput::Query(_) => Method::Get,
            RawInput::Json(_) => Method::Post,
        }
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// Validate `input` against `schema`, producing a normalized JSON object
pub fn coerce_request(schema: &ObjectRef, input: RawInput) -> Result<Map<String, Value>, ValidationFailure> {
    let mut issues = Vec::new();

    let object = match input {
        RawInput::Json(Value::Object(map)) => map,
        RawInput::Json(Value::Null) => Map::new(),
        RawInput::Json(_) => {
            return Err(ValidationFailure {
                issues: vec![FieldIssue::new(ROOT_FIELD, "expected a JSON object")],
            })
        }
        RawInput::Query(pairs) => group_query(schema, pairs),
    };

    let coerced = coerce_object(schema, object, "", &mut issues);
    if issues.is_empty() {
        Ok(coerced)
    } else {
        Err(ValidationFailure { issues })
    }
}

/// List fields take every value for their key, everything else the first
fn group_query(schema: &ObjectRef, pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in pairs {
        grouped.entry(key).or_default().push(value);
    }

    let fields = schema.fields();
    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let repeated = fields.iter().any(|field| field.name == key && is_list(&field.ty));
            let value = if repeated {
                Value::Array(values.into_iter().map(Value::String).collect())
            } else {
                Value::String(values.swap_remove(0))
            };
            (key, value)
        })
        .collect()
}

fn is_list(ty: &TypeDescriptor) -> bool {
    match ty {
        TypeDescriptor::Optional(inner) => is_list(inner),
        TypeDescriptor::List(_) => true,
        _ => false,
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn coerce_object(
    schema: &ObjectRef,
    mut input: Map<String, Value>,
    path: &str,
    issues: &mut Vec<FieldIssue>,
) -> Map<String, Value> {
    let mut out = Map::new();

    for field in schema.fields().iter() {
        let field_path = join(path, &field.name);
        match input.remove(&field.name) {
            Some(value) => {
                if let Some(value) = coerce_value(&field.ty, value, &field_path, issues) {
                    out.insert(field.name.clone(), value);
                }
            }
            None => match &field.default {
                Some(default) => {
                    out.insert(field.name.clone(), default.clone());
                }
                None if field.is_optional() => {
                    out.insert(field.name.clone(), Value::Null);
                }
                None => issues.push(FieldIssue::new(field_path, "field required")),
            },
        }
    }

    for key in input.keys() {
        issues.push(FieldIssue::new(join(path, key), "unexpected field"));
    }

    out
}

/// Coerce one value, recording an issue and returning `None` on failure
fn coerce_value(ty: &TypeDescriptor, value: Value, path: &str, issues: &mut Vec<FieldIssue>) -> Option<Value> {
    let result = match ty {
        TypeDescriptor::Optional(inner) => match value {
            Value::Null => Ok(Value::Null),
            other => return coerce_value(inner, other, path, issues),
        },

        TypeDescriptor::Primitive(primitive) => coerce_primitive(*primitive, value),

        TypeDescriptor::List(inner) => match structured(value) {
            Value::Array(items) => {
                let before = issues.len();
                let items: Vec<Value> = items
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, item)| coerce_value(inner, item, &format!("{}[{}]", path, i), issues))
                    .collect();
                return (issues.len() == before).then_some(Value::Array(items));
            }
            _ => Err("expected a list".to_string()),
        },

        TypeDescriptor::Tuple(elements) => match structured(value) {
            Value::Array(items) if items.len() == elements.len() => {
                let before = issues.len();
                let items: Vec<Value> = elements
                    .iter()
                    .zip(items)
                    .enumerate()
                    .filter_map(|(i, (element, item))| coerce_value(element, item, &format!("{}[{}]", path, i), issues))
                    .collect();
                return (issues.len() == before).then_some(Value::Array(items));
            }
            _ => Err(format!("expected a list of {} items", elements.len())),
        },

        TypeDescriptor::Dict { key, value: value_ty } => match structured(value) {
            Value::Object(map) => {
                let before = issues.len();
                let mut out = Map::new();
                for (k, v) in map {
                    let entry_path = join(path, &k);
                    if coerce_value(key, Value::String(k.clone()), &entry_path, issues).is_none() {
                        continue;
                    }
                    if let Some(v) = coerce_value(value_ty, v, &entry_path, issues) {
                        out.insert(k, v);
                    }
                }
                return (issues.len() == before).then_some(Value::Object(out));
            }
            _ => Err("expected a mapping".to_string()),
        },

        TypeDescriptor::AnyDict => match structured(value) {
            object @ Value::Object(_) => Ok(object),
            _ => Err("expected a mapping".to_string()),
        },

        TypeDescriptor::Union(variants) => {
            let names: Vec<String> = variants.iter().map(ToString::to_string).collect();
            let value = structured(value);
            let matched = variants.iter().find_map(|variant| {
                let mut scratch = Vec::new();
                coerce_value(variant, value.clone(), path, &mut scratch).filter(|_| scratch.is_empty())
            });
            matched.ok_or_else(|| format!("did not match any of: {}", names.join(", ")))
        }

        TypeDescriptor::Literal(literal) => coerce_literal(literal, value),

        TypeDescriptor::Enum(schema) => match value {
            Value::String(s) if s.is_empty() => Ok(Value::Null),
            Value::String(s) if schema.contains(&s) => Ok(Value::String(s)),
            _ => Err(format!("expected one of: {}", schema.values.join(", "))),
        },

        TypeDescriptor::Object(object) => match structured(value) {
            Value::Object(map) => {
                let before = issues.len();
                let coerced = coerce_object(object, map, path, issues);
                return (issues.len() == before).then_some(Value::Object(coerced));
            }
            _ => Err(format!("expected an object ({})", object.name())),
        },

        // Declared client-side; nothing to check against here
        TypeDescriptor::Imported { .. } => Ok(value),

        TypeDescriptor::Opaque(name) => Err(format!("no coercion defined for {}", name)),
    };

    match result {
        Ok(value) => Some(value),
        Err(reason) => {
            issues.push(FieldIssue::new(path, reason));
            None
        }
    }
}

/// Structured values may arrive JSON-encoded inside a string
fn structured(value: Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

fn coerce_primitive(primitive: Primitive, value: Value) -> Result<Value, String> {
    match (primitive, value) {
        (Primitive::Int, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(Value::Number(n))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
                    _ => Err("expected an integer".to_string()),
                }
            }
        }
        (Primitive::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("expected an integer, got {:?}", s)),

        (Primitive::Float, Value::Number(n)) => Ok(Value::Number(n)),
        (Primitive::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected a number, got {:?}", s)),

        (Primitive::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        (Primitive::Bool, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
            _ => Err(format!("expected a boolean, got {:?}", s)),
        },
        (Primitive::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err("expected a boolean".to_string()),
        },

        (Primitive::Str, Value::String(s)) => Ok(Value::String(s)),

        (Primitive::Decimal, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (Primitive::Decimal, Value::String(s)) if DECIMAL.is_match(s.trim()) => Ok(Value::String(s.trim().to_string())),
        (Primitive::Decimal, Value::String(s)) => Err(format!("expected a decimal, got {:?}", s)),

        (Primitive::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s.trim())
            .map(|id| Value::String(id.hyphenated().to_string()))
            .map_err(|_| format!("expected a UUID, got {:?}", s)),

        (Primitive::None, Value::Null) => Ok(Value::Null),
        (Primitive::None, Value::String(s)) if s.is_empty() => Ok(Value::Null),

        (primitive, _) => Err(format!("expected {}", primitive.name())),
    }
}

fn coerce_literal(literal: &LiteralValue, value: Value) -> Result<Value, String> {
    let expected = literal.to_value();
    let matches = match (&expected, &value) {
        (_, actual) if *actual == expected => true,
        (Value::Number(_), Value::String(s)) | (Value::Bool(_), Value::String(s)) => *s == expected.to_string(),
        _ => false,
    };
    if matches {
        Ok(expected)
    } else {
        Err(format!("expected {}", literal))
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a coerced object into the handler's request type.
///
/// Failures carry the path of the field serde rejected.
pub fn decode<T: DeserializeOwned>(input: Map<String, Value>) -> Result<T, ValidationFailure> {
    serde_path_to_error::deserialize(Value::Object(input)).map_err(|err| {
        let path = err.path().to_string();
        let field = if path == "." || path.is_empty() { ROOT_FIELD.to_string() } else { path };
        ValidationFailure {
            issues: vec![FieldIssue::new(field, err.into_inner().to_string())],
        }
    })
}
