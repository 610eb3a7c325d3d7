//! Typed operations against one store
//!
//! [`Store`] names every remote operation the exporter, resolver and importer
//! need. [`AdminStore`] implements it with admin API GraphQL documents on top
//! of a [`Transport`](crate::transport::Transport).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::reference::{ReferenceKind, ResourceRef};

mod admin;
mod queries;

pub use admin::AdminStore;

/// One page of a cursor-paginated connection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
            end_cursor: None,
        }
    }

    /// The cursor to continue from, if there is more to fetch
    pub fn next_cursor(&self) -> Option<&str> {
        if self.has_next_page {
            self.end_cursor.as_deref()
        } else {
            None
        }
    }
}

/// A field as read from the source store
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub key: String,
    /// Field definition type, e.g. `list.product_reference`
    pub field_type: String,
    pub value: Option<String>,
    pub reference: Option<ResourceRef>,
    /// Present for list reference fields
    pub references: Option<Vec<ResourceRef>>,
}

/// A metafield on another resource that points at a metaobject
#[derive(Debug, Clone, PartialEq)]
pub struct RawBackReference {
    pub namespace: String,
    pub key: String,
    pub owner: ResourceRef,
}

/// A metaobject as read from the source store
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetaobject {
    pub id: String,
    pub handle: String,
    pub type_name: String,
    pub fields: Vec<RawField>,
    /// First page of back-references, when they were requested inline
    pub back_references: Option<Page<RawBackReference>>,
}

/// Remote validation error on a mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl UserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
            code: None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.field {
            Some(path) if !path.is_empty() => format!("{} ({})", self.message, path.join(".")),
            _ => self.message.clone(),
        }
    }
}

pub fn describe_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(UserError::describe)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of a metaobject upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    pub id: Option<String>,
    pub user_errors: Vec<UserError>,
}

/// Value shape of a back-reference metafield write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetafieldValue {
    Single(String),
    List(Vec<String>),
}

impl MetafieldValue {
    /// The metafield definition type the value shape requires
    pub fn field_type(&self) -> &'static str {
        match self {
            MetafieldValue::Single(_) => "metaobject_reference",
            MetafieldValue::List(_) => "list.metaobject_reference",
        }
    }

    pub fn to_wire(&self) -> String {
        match self {
            MetafieldValue::Single(id) => id.clone(),
            MetafieldValue::List(ids) => serde_json::Value::from(ids.clone()).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetafieldWrite {
    pub owner_id: String,
    pub namespace: String,
    pub key: String,
    pub value: MetafieldValue,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Label used in logs and error context
    fn label(&self) -> String;

    /// Remote requests sent so far, retries not included
    fn requests_sent(&self) -> usize;

    /// Metaobject definition types present on the store
    async fn metaobject_types(&self) -> Result<Vec<String>>;

    async fn metaobjects_page(
        &self,
        type_name: &str,
        first: usize,
        after: Option<&str>,
        inline_back_references: usize,
    ) -> Result<Page<RawMetaobject>>;

    async fn back_references_page(
        &self,
        metaobject_id: &str,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<RawBackReference>>;

    /// Ids of products, collections or pages by handle; absent handles are
    /// missing from the map
    async fn find_by_handles(
        &self,
        kind: ReferenceKind,
        handles: &[String],
    ) -> Result<HashMap<String, String>>;

    async fn find_metaobjects(
        &self,
        type_name: &str,
        handles: &[String],
    ) -> Result<HashMap<String, String>>;

    /// `None` when the product does not exist, else `(variant id, sku)` pairs
    async fn product_variants(
        &self,
        product_handle: &str,
    ) -> Result<Option<Vec<(String, Option<String>)>>>;

    /// Find an image file by source URL, creating it when absent
    async fn ensure_media_image(&self, url: &str) -> Result<Option<String>>;

    async fn upsert_metaobject(
        &self,
        type_name: &str,
        handle: &str,
        fields: &[(String, String)],
    ) -> Result<UpsertOutcome>;

    async fn set_metafields(&self, writes: &[MetafieldWrite]) -> Result<Vec<UserError>>;
}
