//! Metaobject field values
//!
//! Field values arrive as loosely typed JSON: plain strings, numbers, nested
//! arrays and objects, and strings that themselves hold JSON text (list fields
//! are stored that way). [`FieldValue`] makes the shapes explicit so references
//! can be found and rewritten wherever they sit.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reference::{SymbolicRef, is_opaque_id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Reference(SymbolicRef),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    /// A string holding the JSON text of a list or map
    Encoded(Box<FieldValue>),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::from_text(s),
            Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from).collect())
            }
            Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Number(n) => Value::Number(n),
            FieldValue::Text(s) => Value::String(s),
            FieldValue::Reference(r) => Value::String(r.to_string()),
            FieldValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            FieldValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
            FieldValue::Encoded(inner) => Value::String(Value::from(*inner).to_string()),
        }
    }
}

impl FieldValue {
    /// Classify a string: symbolic reference, embedded JSON container, or text
    pub fn from_text(text: String) -> Self {
        if let Some(reference) = SymbolicRef::parse(&text) {
            return FieldValue::Reference(reference);
        }
        let trimmed = text.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            if let Ok(parsed @ (Value::Array(_) | Value::Object(_))) =
                serde_json::from_str::<Value>(&text)
            {
                return FieldValue::Encoded(Box::new(FieldValue::from(parsed)));
            }
        }
        FieldValue::Text(text)
    }

    /// Every symbolic reference anywhere inside this value
    pub fn collect_references(&self, into: &mut BTreeSet<SymbolicRef>) {
        match self {
            FieldValue::Reference(r) => {
                into.insert(r.clone());
            }
            FieldValue::List(items) => items.iter().for_each(|v| v.collect_references(into)),
            FieldValue::Map(map) => map.values().for_each(|v| v.collect_references(into)),
            FieldValue::Encoded(inner) => inner.collect_references(into),
            _ => {}
        }
    }

    /// Every bare opaque id string anywhere inside this value
    pub fn collect_opaque_ids(&self, into: &mut BTreeSet<String>) {
        match self {
            FieldValue::Text(s) if is_opaque_id(s) => {
                into.insert(s.clone());
            }
            FieldValue::List(items) => items.iter().for_each(|v| v.collect_opaque_ids(into)),
            FieldValue::Map(map) => map.values().for_each(|v| v.collect_opaque_ids(into)),
            FieldValue::Encoded(inner) => inner.collect_opaque_ids(into),
            _ => {}
        }
    }

    /// Replace references with the ids `lookup` yields.
    ///
    /// A reference `lookup` cannot resolve is dropped, and so is any list or
    /// map left empty because all of its members were dropped. Returns `None`
    /// when the value itself is dropped.
    pub fn resolve<F>(&self, lookup: &F) -> Option<FieldValue>
    where
        F: Fn(&SymbolicRef) -> Option<String>,
    {
        match self {
            FieldValue::Reference(r) => lookup(r).map(FieldValue::Text),
            FieldValue::List(items) => {
                let resolved: Vec<_> = items.iter().filter_map(|v| v.resolve(lookup)).collect();
                if resolved.is_empty() && !items.is_empty() {
                    None
                } else {
                    Some(FieldValue::List(resolved))
                }
            }
            FieldValue::Map(map) => {
                let resolved: BTreeMap<_, _> = map
                    .iter()
                    .filter_map(|(k, v)| v.resolve(lookup).map(|v| (k.clone(), v)))
                    .collect();
                if resolved.is_empty() && !map.is_empty() {
                    None
                } else {
                    Some(FieldValue::Map(resolved))
                }
            }
            FieldValue::Encoded(inner) => inner
                .resolve(lookup)
                .map(|v| FieldValue::Encoded(Box::new(v))),
            other => Some(other.clone()),
        }
    }

    /// The string the admin API expects for a field value
    pub fn to_wire(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Reference(r) => r.to_string(),
            FieldValue::List(_) | FieldValue::Map(_) => Value::from(self.clone()).to_string(),
            FieldValue::Encoded(inner) => inner.to_wire(),
        }
    }
}
