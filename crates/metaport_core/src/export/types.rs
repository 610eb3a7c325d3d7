//! Persisted export document types

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::reference::{ReferenceKind, SymbolicRef};
use crate::value::FieldValue;

/// An exported set of metaobjects from one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Label of the store the entries were read from
    pub environment: String,
    pub count: usize,
    pub entries: Vec<ExportEntry>,
}

impl ExportDocument {
    pub fn new(environment: impl Into<String>, entries: Vec<ExportEntry>) -> Self {
        Self {
            environment: environment.into(),
            count: entries.len(),
            entries,
        }
    }
}

/// One exported metaobject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub handle: String,

    /// Normalized metaobject type
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub back_references: Vec<BackReference>,
}

impl ExportEntry {
    /// The reference other entries use to point at this one
    pub fn symbolic_ref(&self) -> SymbolicRef {
        SymbolicRef::metaobject(&self.type_name, self.handle.as_str())
    }

    /// Every symbolic reference held in the entry's fields
    pub fn references(&self) -> BTreeSet<SymbolicRef> {
        let mut refs = BTreeSet::new();
        for value in self.fields.values() {
            value.collect_references(&mut refs);
        }
        refs
    }

    /// Every opaque id left in the entry's fields
    pub fn opaque_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for value in self.fields.values() {
            value.collect_opaque_ids(&mut ids);
        }
        ids
    }
}

/// A metafield on another resource that points at the entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackReference {
    pub owner_type: ReferenceKind,
    /// Symbolic reference of the owning resource
    pub owner: String,
    /// Normalized metafield namespace
    pub namespace: String,
    pub key: String,
}

impl BackReference {
    pub fn owner_ref(&self) -> Option<SymbolicRef> {
        SymbolicRef::parse(&self.owner)
    }
}
