#![cfg(test)]

//! In-memory [`Store`] for resolver, exporter and importer tests

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::reference::{ReferenceKind, ResourceRef};
use crate::store::{
    MetafieldValue, MetafieldWrite, Page, RawBackReference, RawField, RawMetaobject, Store,
    UpsertOutcome, UserError,
};
use crate::{CoreError, Result};

#[derive(Default)]
struct State {
    calls: Vec<&'static str>,
    next_id: u64,
    metaobjects: Vec<RawMetaobject>,
    back_references: HashMap<String, Vec<RawBackReference>>,
    handles: HashMap<(ReferenceKind, String), String>,
    variants: HashMap<String, Vec<(String, Option<String>)>>,
    images: HashMap<String, String>,
    metafields: BTreeMap<(String, String, String), MetafieldValue>,
    failing_kinds: HashSet<ReferenceKind>,
    failing_types: HashSet<String>,
    rejected_handles: HashMap<String, String>,
    rejected_owners: HashSet<String>,
}

/// Store backed by plain collections, counting every remote call
pub struct MemoryStore {
    label: String,
    state: Mutex<State>,
}

fn outage(operation: &str) -> CoreError {
    CoreError::RequestFailed {
        endpoint: format!("memory/{operation}"),
        attempts: 1,
        message: "simulated outage".to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::labelled("memory")
    }

    pub fn labelled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(State {
                next_id: 1000,
                ..State::default()
            }),
        }
    }

    pub fn add_product(&self, handle: &str, id: &str) {
        self.add_handle(ReferenceKind::Product, handle, id);
    }

    pub fn add_page(&self, handle: &str, id: &str) {
        self.add_handle(ReferenceKind::Page, handle, id);
    }

    pub fn add_collection(&self, handle: &str, id: &str) {
        self.add_handle(ReferenceKind::Collection, handle, id);
    }

    fn add_handle(&self, kind: ReferenceKind, handle: &str, id: &str) {
        self.state
            .lock()
            .handles
            .insert((kind, handle.to_string()), id.to_string());
    }

    pub fn add_variants(&self, product_handle: &str, variants: &[(&str, &str)]) {
        self.state.lock().variants.insert(
            product_handle.to_string(),
            variants
                .iter()
                .map(|(id, sku)| (id.to_string(), Some(sku.to_string())))
                .collect(),
        );
    }

    /// A metaobject with no fields
    pub fn add_metaobject(&self, type_name: &str, handle: &str, id: &str) {
        self.add_record(record(id, type_name, handle, Vec::new()));
    }

    pub fn add_record(&self, record: RawMetaobject) {
        self.state.lock().metaobjects.push(record);
    }

    pub fn add_back_reference(&self, metaobject_id: &str, back_reference: RawBackReference) {
        self.state
            .lock()
            .back_references
            .entry(metaobject_id.to_string())
            .or_default()
            .push(back_reference);
    }

    /// Make every lookup of `kind` fail
    pub fn fail_kind(&self, kind: ReferenceKind) {
        self.state.lock().failing_kinds.insert(kind);
    }

    /// Make listing metaobjects of `type_name` fail
    pub fn fail_type(&self, type_name: &str) {
        self.state.lock().failing_types.insert(type_name.to_string());
    }

    /// Reject upserts of `handle` with a validation error
    pub fn reject_handle(&self, handle: &str, message: &str) {
        self.state
            .lock()
            .rejected_handles
            .insert(handle.to_string(), message.to_string());
    }

    /// Reject metafield writes on `owner_id`
    pub fn reject_owner(&self, owner_id: &str) {
        self.state.lock().rejected_owners.insert(owner_id.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn calls_of(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| **c == operation)
            .count()
    }

    pub fn metaobject_count(&self) -> usize {
        self.state.lock().metaobjects.len()
    }

    pub fn metaobject(&self, type_name: &str, handle: &str) -> Option<RawMetaobject> {
        self.state
            .lock()
            .metaobjects
            .iter()
            .find(|m| m.type_name == type_name && m.handle == handle)
            .cloned()
    }

    /// Field values of a stored metaobject as `key -> value`
    pub fn field_values(&self, type_name: &str, handle: &str) -> BTreeMap<String, String> {
        self.metaobject(type_name, handle)
            .map(|m| {
                m.fields
                    .into_iter()
                    .filter_map(|f| Some((f.key, f.value?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn metafield(&self, owner_id: &str, namespace: &str, key: &str) -> Option<MetafieldValue> {
        self.state
            .lock()
            .metafields
            .get(&(owner_id.to_string(), namespace.to_string(), key.to_string()))
            .cloned()
    }

    pub fn metafield_count(&self) -> usize {
        self.state.lock().metafields.len()
    }

    fn record_call(&self, operation: &'static str) -> parking_lot::MutexGuard<'_, State> {
        let mut state = self.state.lock();
        state.calls.push(operation);
        state
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn requests_sent(&self) -> usize {
        self.call_count()
    }

    async fn metaobject_types(&self) -> Result<Vec<String>> {
        let state = self.record_call("metaobject_types");
        let mut types: Vec<String> = Vec::new();
        for m in &state.metaobjects {
            if !types.contains(&m.type_name) {
                types.push(m.type_name.clone());
            }
        }
        Ok(types)
    }

    async fn metaobjects_page(
        &self,
        type_name: &str,
        first: usize,
        after: Option<&str>,
        inline_back_references: usize,
    ) -> Result<Page<RawMetaobject>> {
        let state = self.record_call("metaobjects_page");
        if state.failing_types.contains(type_name) {
            return Err(outage("metaobjects_page"));
        }
        let all: Vec<&RawMetaobject> = state
            .metaobjects
            .iter()
            .filter(|m| m.type_name == type_name)
            .collect();
        let start = after.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + first).min(all.len());
        let items = all[start.min(end)..end]
            .iter()
            .map(|m| {
                let mut m = (*m).clone();
                if inline_back_references > 0 {
                    let refs = state.back_references.get(&m.id).cloned().unwrap_or_default();
                    m.back_references = Some(page_of(refs, 0, inline_back_references));
                }
                m
            })
            .collect();
        Ok(Page {
            items,
            has_next_page: end < all.len(),
            end_cursor: Some(end.to_string()),
        })
    }

    async fn back_references_page(
        &self,
        metaobject_id: &str,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<RawBackReference>> {
        let state = self.record_call("back_references_page");
        let refs = state
            .back_references
            .get(metaobject_id)
            .cloned()
            .unwrap_or_default();
        let start = after.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        Ok(page_of(refs, start, first))
    }

    async fn find_by_handles(
        &self,
        kind: ReferenceKind,
        handles: &[String],
    ) -> Result<HashMap<String, String>> {
        let state = self.record_call("find_by_handles");
        if state.failing_kinds.contains(&kind) {
            return Err(outage("find_by_handles"));
        }
        Ok(handles
            .iter()
            .filter_map(|h| {
                state
                    .handles
                    .get(&(kind, h.clone()))
                    .map(|id| (h.clone(), id.clone()))
            })
            .collect())
    }

    async fn find_metaobjects(
        &self,
        type_name: &str,
        handles: &[String],
    ) -> Result<HashMap<String, String>> {
        let state = self.record_call("find_metaobjects");
        if state.failing_kinds.contains(&ReferenceKind::Metaobject) {
            return Err(outage("find_metaobjects"));
        }
        Ok(state
            .metaobjects
            .iter()
            .filter(|m| m.type_name == type_name && handles.contains(&m.handle))
            .map(|m| (m.handle.clone(), m.id.clone()))
            .collect())
    }

    async fn product_variants(
        &self,
        product_handle: &str,
    ) -> Result<Option<Vec<(String, Option<String>)>>> {
        let state = self.record_call("product_variants");
        if state.failing_kinds.contains(&ReferenceKind::ProductVariant) {
            return Err(outage("product_variants"));
        }
        Ok(state.variants.get(product_handle).cloned())
    }

    async fn ensure_media_image(&self, url: &str) -> Result<Option<String>> {
        let mut state = self.record_call("ensure_media_image");
        if state.failing_kinds.contains(&ReferenceKind::MediaImage) {
            return Err(outage("ensure_media_image"));
        }
        if let Some(id) = state.images.get(url) {
            return Ok(Some(id.clone()));
        }
        state.next_id += 1;
        let id = format!("gid://shopify/MediaImage/{}", state.next_id);
        state.images.insert(url.to_string(), id.clone());
        Ok(Some(id))
    }

    async fn upsert_metaobject(
        &self,
        type_name: &str,
        handle: &str,
        fields: &[(String, String)],
    ) -> Result<UpsertOutcome> {
        let mut state = self.record_call("upsert_metaobject");
        if let Some(message) = state.rejected_handles.get(handle) {
            return Ok(UpsertOutcome {
                id: None,
                user_errors: vec![UserError::new(message.clone())],
            });
        }

        let fields: Vec<RawField> = fields
            .iter()
            .map(|(key, value)| text_field(key, value))
            .collect();
        if let Some(existing) = state
            .metaobjects
            .iter_mut()
            .find(|m| m.type_name == type_name && m.handle == handle)
        {
            existing.fields = fields;
            return Ok(UpsertOutcome {
                id: Some(existing.id.clone()),
                user_errors: Vec::new(),
            });
        }

        state.next_id += 1;
        let id = format!("gid://shopify/Metaobject/{}", state.next_id);
        state
            .metaobjects
            .push(record(&id, type_name, handle, fields));
        Ok(UpsertOutcome {
            id: Some(id),
            user_errors: Vec::new(),
        })
    }

    async fn set_metafields(&self, writes: &[MetafieldWrite]) -> Result<Vec<UserError>> {
        let mut state = self.record_call("set_metafields");
        if let Some(locked) = writes
            .iter()
            .find(|w| state.rejected_owners.contains(&w.owner_id))
        {
            return Ok(vec![UserError::new(format!(
                "Owner {} is locked",
                locked.owner_id
            ))]);
        }
        for write in writes {
            state.metafields.insert(
                (
                    write.owner_id.clone(),
                    write.namespace.clone(),
                    write.key.clone(),
                ),
                write.value.clone(),
            );
        }
        Ok(Vec::new())
    }
}

fn page_of<T: Clone>(items: Vec<T>, start: usize, first: usize) -> Page<T> {
    let end = (start + first).min(items.len());
    Page {
        items: items[start.min(end)..end].to_vec(),
        has_next_page: end < items.len(),
        end_cursor: Some(end.to_string()),
    }
}

pub fn record(id: &str, type_name: &str, handle: &str, fields: Vec<RawField>) -> RawMetaobject {
    RawMetaobject {
        id: id.to_string(),
        handle: handle.to_string(),
        type_name: type_name.to_string(),
        fields,
        back_references: None,
    }
}

pub fn text_field(key: &str, value: &str) -> RawField {
    RawField {
        key: key.to_string(),
        field_type: "single_line_text_field".to_string(),
        value: Some(value.to_string()),
        reference: None,
        references: None,
    }
}

pub fn product(id: &str, handle: &str) -> ResourceRef {
    ResourceRef::Product {
        id: id.to_string(),
        handle: Some(handle.to_string()),
    }
}

pub fn metaobject(id: &str, type_name: &str, handle: &str) -> ResourceRef {
    ResourceRef::Metaobject {
        id: id.to_string(),
        type_name: type_name.to_string(),
        handle: Some(handle.to_string()),
    }
}

/// A single reference field pointing at `target`
pub fn reference_field(key: &str, field_type: &str, target: ResourceRef) -> RawField {
    RawField {
        key: key.to_string(),
        field_type: field_type.to_string(),
        value: Some(target.id().to_string()),
        reference: Some(target),
        references: None,
    }
}

/// A list reference field, its value holding the JSON list of ids
pub fn list_reference_field(key: &str, field_type: &str, targets: Vec<ResourceRef>) -> RawField {
    let ids: Vec<&str> = targets.iter().map(ResourceRef::id).collect();
    RawField {
        key: key.to_string(),
        field_type: field_type.to_string(),
        value: Some(serde_json::to_string(&ids).unwrap()),
        reference: None,
        references: Some(targets),
    }
}

pub fn back_reference(namespace: &str, key: &str, owner: ResourceRef) -> RawBackReference {
    RawBackReference {
        namespace: namespace.to_string(),
        key: key.to_string(),
        owner,
    }
}
