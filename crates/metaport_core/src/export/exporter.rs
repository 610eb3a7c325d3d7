use std::collections::{BTreeMap, HashMap};

use futures::future::join_all;
use tracing::{debug, info};

use super::ordering::order_entries;
use super::types::{BackReference, ExportDocument, ExportEntry};
use crate::Result;
use crate::config::LimitsConfig;
use crate::progress::{NoProgress, ProgressEvent, ProgressObserver};
use crate::reference::{normalize_type, to_symbolic_ref};
use crate::store::{RawBackReference, RawField, RawMetaobject, Store};
use crate::value::FieldValue;

/// Options for an export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Keep raw field values instead of making references portable
    pub retain_ids: bool,
    pub include_back_references: bool,
    pub page_size: usize,
    pub back_reference_page_size: usize,
    pub inline_back_references: usize,
}

impl ExportOptions {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            retain_ids: false,
            include_back_references: true,
            page_size: limits.page_size.max(1),
            back_reference_page_size: limits.back_reference_page_size.max(1),
            inline_back_references: limits.inline_back_references,
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}

/// Reads metaobjects from a store into an ordered [`ExportDocument`]
pub struct Exporter<'a> {
    store: &'a dyn Store,
    options: ExportOptions,
    observer: &'a dyn ProgressObserver,
}

impl<'a> Exporter<'a> {
    pub fn new(store: &'a dyn Store, options: ExportOptions) -> Self {
        Self {
            store,
            options,
            observer: &NoProgress,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Export every metaobject of the given types.
    ///
    /// Any fetch failure aborts the whole export.
    pub async fn export(&self, types: &[String]) -> Result<ExportDocument> {
        let mut entries = Vec::new();
        let mut source_ids = HashMap::new();

        for type_name in types {
            let records = self.fetch_type(type_name).await?;
            info!(
                "Fetched {} {} record(s) from {}",
                records.len(),
                type_name,
                self.store.label()
            );
            for (record, back_references) in records {
                source_ids.insert(record.id.clone(), entries.len());
                entries.push(self.to_entry(record, back_references));
            }
        }

        let entries = order_entries(entries, &source_ids);
        Ok(ExportDocument::new(self.store.label(), entries))
    }

    /// Fetch all records of one type with their complete back-reference lists.
    ///
    /// Back-reference follow-up for a page runs while the next page is
    /// fetched; both finish before the page's records are returned.
    async fn fetch_type(
        &self,
        type_name: &str,
    ) -> Result<Vec<(RawMetaobject, Vec<RawBackReference>)>> {
        let inline = if self.options.include_back_references {
            self.options.inline_back_references
        } else {
            0
        };
        let page_size = self.options.page_size;

        let mut records = Vec::new();
        let mut page = self
            .store
            .metaobjects_page(type_name, page_size, None, inline)
            .await?;
        let mut page_number = 1;

        loop {
            debug!(
                "Page {} of {}: {} record(s)",
                page_number,
                type_name,
                page.items.len()
            );
            self.observer.notify(ProgressEvent::ExportPage {
                type_name: type_name.to_string(),
                page: page_number,
                records: records.len() + page.items.len(),
            });

            let cursor = page.next_cursor().map(str::to_string);
            let next_page = async {
                match &cursor {
                    Some(after) => self
                        .store
                        .metaobjects_page(type_name, page_size, Some(after), inline)
                        .await
                        .map(Some),
                    None => Ok(None),
                }
            };
            let drains = join_all(
                page.items
                    .iter()
                    .map(|record| self.drain_back_references(record)),
            );
            let (next_page, drained) = futures::join!(next_page, drains);

            for (record, back_references) in page.items.into_iter().zip(drained) {
                records.push((record, back_references?));
            }
            match next_page? {
                Some(next) => {
                    page = next;
                    page_number += 1;
                }
                None => break,
            }
        }
        Ok(records)
    }

    async fn drain_back_references(&self, record: &RawMetaobject) -> Result<Vec<RawBackReference>> {
        let Some(inline) = &record.back_references else {
            return Ok(Vec::new());
        };
        let mut back_references = inline.items.clone();
        let mut cursor = inline.next_cursor().map(str::to_string);

        while let Some(after) = cursor {
            let page = self
                .store
                .back_references_page(
                    &record.id,
                    self.options.back_reference_page_size,
                    Some(&after),
                )
                .await?;
            cursor = page.next_cursor().map(str::to_string);
            back_references.extend(page.items);
        }

        if back_references.len() > inline.items.len() {
            debug!(
                "Followed up {} back-reference(s) for {}",
                back_references.len() - inline.items.len(),
                record.handle
            );
        }
        Ok(back_references)
    }

    fn to_entry(
        &self,
        record: RawMetaobject,
        back_references: Vec<RawBackReference>,
    ) -> ExportEntry {
        let fields: BTreeMap<String, FieldValue> = record
            .fields
            .iter()
            .filter_map(|field| Some((field.key.clone(), self.field_value(field)?)))
            .collect();

        let back_references = back_references
            .into_iter()
            .filter_map(|raw| {
                let kind = raw.owner.kind().filter(|k| k.is_back_reference_owner())?;
                let owner = to_symbolic_ref(&raw.owner)?;
                Some(BackReference {
                    owner_type: kind,
                    owner: owner.to_string(),
                    namespace: normalize_type(&raw.namespace),
                    key: raw.key,
                })
            })
            .collect();

        ExportEntry {
            handle: record.handle,
            type_name: normalize_type(&record.type_name),
            fields,
            back_references,
        }
    }

    /// `None` for a field without a value
    fn field_value(&self, field: &RawField) -> Option<FieldValue> {
        if !self.options.retain_ids {
            if let Some(symbolic) = field.reference.as_ref().and_then(to_symbolic_ref) {
                return Some(FieldValue::Reference(symbolic));
            }
            if let Some(references) = &field.references {
                // Items without a portable form keep their raw id
                let items = references
                    .iter()
                    .map(|r| match to_symbolic_ref(r) {
                        Some(symbolic) => FieldValue::Reference(symbolic),
                        None => FieldValue::Text(r.id().to_string()),
                    })
                    .collect();
                return Some(FieldValue::List(items));
            }
        }
        field.value.clone().map(FieldValue::from_text)
    }
}
