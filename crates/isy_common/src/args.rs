//! Tool-call argument normalization.
//!
//! The transport hands back loosely-typed JSON values: scalars, or
//! sequence-like values for array parameters. Normalization converts each
//! value into an explicit tagged form once, up front, so tool dispatch never
//! inspects raw JSON shapes. Conversion never fails: a value that fits no
//! tagged form passes through unchanged as `Raw`.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// A tool-call argument after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Number(f64),
    Flag(bool),
    /// Array-like value converted to a canonical ordered list of strings.
    List(Vec<String>),
    /// Fallback carrying the original value untouched.
    Raw(Value),
}

impl ArgValue {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => ArgValue::Text(s.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) => ArgValue::Number(f),
                None => ArgValue::Raw(value.clone()),
            },
            Value::Bool(b) => ArgValue::Flag(*b),
            Value::Array(items) => match stringify_items(items) {
                Some(list) => ArgValue::List(list),
                None => ArgValue::Raw(value.clone()),
            },
            Value::Null | Value::Object(_) => ArgValue::Raw(value.clone()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric reading, tolerating numbers sent as numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(f) => Some(*f),
            ArgValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whole non-negative count, tolerating numeric strings.
    pub fn as_u32(&self) -> Option<u32> {
        let f = self.as_f64()?;
        if f.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&f) {
            Some(f as u32)
        } else {
            None
        }
    }

    /// List reading; a lone text value reads as a one-element list, since
    /// models sometimes send a single title where an array was declared.
    pub fn as_text_list(&self) -> Option<Vec<String>> {
        match self {
            ArgValue::List(items) => Some(items.clone()),
            ArgValue::Text(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }
}

/// Normalized argument map for one tool call.
pub type ArgMap = HashMap<String, ArgValue>;

/// Normalize every argument of a tool call. Never fails.
pub fn normalize_args(raw: &Map<String, Value>) -> ArgMap {
    raw.iter()
        .map(|(key, value)| (key.clone(), ArgValue::from_value(value)))
        .collect()
}

/// Convert array elements to strings. Nested arrays and objects have no
/// canonical string form, so their presence aborts the conversion.
fn stringify_items(items: &[Value]) -> Option<Vec<String>> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(_) | Value::Bool(_) => Some(item.to_string()),
            Value::Array(_) | Value::Object(_) | Value::Null => None,
        })
        .collect()
}
