use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::backrefs::{PendingLink, plan_writes};
use super::summary::ImportReport;
use crate::config::LimitsConfig;
use crate::export::{ExportDocument, ExportEntry};
use crate::progress::{CompletionStatus, NoProgress, ProgressEvent, ProgressObserver};
use crate::reference::SymbolicRef;
use crate::resolve::HandleResolver;
use crate::store::{Store, describe_user_errors};
use crate::utils::error_chain;
use crate::{CoreError, Result};

/// Cooperative stop signal for a running import.
///
/// Checked before each entry and before back-references are applied; an
/// upsert already in flight always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for an import run
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Record per-entry failures and keep going instead of aborting
    pub skip_on_error: bool,
    /// Metafield writes per request in the back-reference pass
    pub write_chunk_size: usize,
    pub resolve_chunk_size: usize,
    pub resolve_concurrency: usize,
    pub cancel: Option<CancelFlag>,
}

impl ImportOptions {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            skip_on_error: false,
            write_chunk_size: limits.write_chunk_size.max(1),
            resolve_chunk_size: limits.resolve_chunk_size,
            resolve_concurrency: limits.resolve_concurrency,
            cancel: None,
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}

/// Applies export documents to a destination store.
///
/// A run has two phases. Every entry is upserted first, in document order;
/// back-references are written only afterwards, since they point at the
/// records the first phase creates. Each run gets a fresh resolver, so ids
/// are looked up at most once per run and never carried over between runs.
pub struct Importer<'a> {
    store: &'a dyn Store,
    options: ImportOptions,
    observer: &'a dyn ProgressObserver,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a dyn Store, options: ImportOptions) -> Self {
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

    /// Import every entry of the document
    pub async fn import(&self, document: &ExportDocument) -> Result<ImportReport> {
        let indices: Vec<usize> = (0..document.entries.len()).collect();
        self.run(document, &indices).await
    }

    /// Import a single entry, with the same bulk resolution as a full run
    pub async fn import_entry(
        &self,
        document: &ExportDocument,
        index: usize,
    ) -> Result<ImportReport> {
        if index >= document.entries.len() {
            return Err(CoreError::EntryOutOfRange {
                index,
                count: document.entries.len(),
            });
        }
        self.run(document, &[index]).await
    }

    fn cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancelFlag::is_cancelled)
    }

    fn set_status(
        &self,
        report: &mut ImportReport,
        row: usize,
        status: CompletionStatus,
        error: Option<String>,
    ) {
        if let Some(event) = report.update(row, status, error) {
            self.observer.notify(event);
        }
    }

    async fn run(&self, document: &ExportDocument, indices: &[usize]) -> Result<ImportReport> {
        let limits = LimitsConfig {
            resolve_chunk_size: self.options.resolve_chunk_size,
            resolve_concurrency: self.options.resolve_concurrency,
            ..LimitsConfig::default()
        };
        let resolver = HandleResolver::new(self.store, &limits).with_observer(self.observer);
        let mut report = ImportReport::new(self.store.label(), document, indices);

        info!(
            "Importing {} of {} entries from {} into {}",
            indices.len(),
            document.entries.len(),
            document.environment,
            self.store.label()
        );

        self.prefetch(&resolver, document, indices).await;

        for (row, &index) in indices.iter().enumerate() {
            if self.cancelled() {
                warn!("Import cancelled before entry {}", index);
                report.cancelled = true;
                break;
            }
            self.upsert_entry(&resolver, &document.entries[index], row, &mut report)
                .await?;
        }

        if !report.cancelled && self.cancelled() {
            warn!("Import cancelled before back-references");
            report.cancelled = true;
        }
        let failures = if report.cancelled {
            Vec::new()
        } else {
            self.apply_back_references(&resolver, document, &mut report)
                .await
        };

        let counters = resolver.counters();
        info!(
            "Import finished: {} created, {} failed, {} lookups ({} resolved, {} unresolved)",
            report.created_count(),
            report.failed_count(),
            counters.remote_calls,
            counters.resolved,
            counters.failed
        );
        report.finished_at = chrono::Utc::now();
        if failures.is_empty() || self.options.skip_on_error {
            Ok(report)
        } else {
            Err(CoreError::BackReferenceWriteFailed {
                failures,
                report: Box::new(report),
            })
        }
    }

    /// Resolve up front every reference whose target this run does not create
    async fn prefetch(
        &self,
        resolver: &HandleResolver<'_>,
        document: &ExportDocument,
        indices: &[usize],
    ) {
        let created: HashSet<SymbolicRef> = indices
            .iter()
            .map(|&i| document.entries[i].symbolic_ref())
            .collect();
        let external: BTreeSet<SymbolicRef> = indices
            .iter()
            .flat_map(|&i| document.entries[i].references())
            .filter(|r| !created.contains(r))
            .collect();

        if !external.is_empty() {
            debug!("Prefetching {} external reference(s)", external.len());
            resolver.resolve_all(&external).await;
        }
    }

    async fn upsert_entry(
        &self,
        resolver: &HandleResolver<'_>,
        entry: &ExportEntry,
        row: usize,
        report: &mut ImportReport,
    ) -> Result<()> {
        let resolved = resolver.resolve_all(&entry.references()).await;
        let lookup = |r: &SymbolicRef| resolved.get(r).cloned().flatten();

        let mut fields = Vec::with_capacity(entry.fields.len());
        for (key, value) in &entry.fields {
            match value.resolve(&lookup) {
                Some(value) => fields.push((key.clone(), value.to_wire())),
                None => debug!(
                    "Dropping {}.{} on {}: unresolved reference",
                    entry.type_name, key, entry.handle
                ),
            }
        }

        let failure = match self
            .store
            .upsert_metaobject(&entry.type_name, &entry.handle, &fields)
            .await
        {
            Ok(outcome) if outcome.user_errors.is_empty() => {
                debug!(
                    "Upserted {}/{} as {:?}",
                    entry.type_name, entry.handle, outcome.id
                );
                match outcome.id {
                    Some(id) => {
                        resolver.insert(entry.symbolic_ref(), id.clone());
                        report.results[row].id = Some(id);
                    }
                    None => warn!(
                        "Upsert of {}/{} returned no id; its back-references cannot be applied",
                        entry.type_name, entry.handle
                    ),
                }
                self.set_status(report, row, CompletionStatus::MetaobjectCreated, None);
                return Ok(());
            }
            Ok(outcome) => describe_user_errors(&outcome.user_errors),
            Err(e) => error_chain(&e),
        };

        let index = report.results[row].index;
        self.set_status(
            report,
            row,
            CompletionStatus::Failed,
            Some(format!(
                "metaobject {}/{}: {}",
                entry.type_name, entry.handle, failure
            )),
        );
        if self.options.skip_on_error {
            warn!(
                "Skipping metaobject {}/{} (entry {}): {}",
                entry.type_name, entry.handle, index, failure
            );
            Ok(())
        } else {
            Err(CoreError::entry_failed(
                index,
                &entry.type_name,
                &entry.handle,
                failure,
            ))
        }
    }

    /// Write back-references for every entry that declared them, returning
    /// the failed chunks.
    ///
    /// Every chunk is attempted before the run decides whether it failed.
    async fn apply_back_references(
        &self,
        resolver: &HandleResolver<'_>,
        document: &ExportDocument,
        report: &mut ImportReport,
    ) -> Vec<String> {
        let mut claims = Vec::new();
        for row in 0..report.results.len() {
            let result = &report.results[row];
            let entry = &document.entries[result.index];
            if entry.back_references.is_empty() || result.status.is_failed() {
                continue;
            }
            let Some(target_id) = result.id.clone() else {
                self.set_status(
                    report,
                    row,
                    CompletionStatus::Failed,
                    Some("back-reference write: no destination id for the metaobject".to_string()),
                );
                continue;
            };
            self.set_status(report, row, CompletionStatus::BackreferencesPending, None);
            for back_reference in &entry.back_references {
                claims.push((row, target_id.clone(), back_reference));
            }
        }
        if claims.is_empty() {
            return Vec::new();
        }

        let owners: BTreeSet<SymbolicRef> = claims
            .iter()
            .filter_map(|(_, _, back_reference)| back_reference.owner_ref())
            .collect();
        let resolved = resolver.resolve_all(&owners).await;

        let mut links = Vec::new();
        let mut participants = BTreeSet::new();
        for (row, target_id, back_reference) in claims {
            participants.insert(row);
            let owner_id = back_reference
                .owner_ref()
                .and_then(|owner| resolved.get(&owner).cloned().flatten());
            match owner_id {
                Some(owner_id) => links.push(PendingLink {
                    owner_id,
                    namespace: back_reference.namespace.clone(),
                    key: back_reference.key.clone(),
                    target_id,
                    row,
                }),
                None => {
                    warn!(
                        "Back-reference owner {} not found, dropping {}.{}",
                        back_reference.owner, back_reference.namespace, back_reference.key
                    );
                    self.set_status(
                        report,
                        row,
                        CompletionStatus::Failed,
                        Some(format!(
                            "back-reference write: owner {} not found",
                            back_reference.owner
                        )),
                    );
                }
            }
        }

        let planned = plan_writes(links);
        let chunk_size = self.options.write_chunk_size.max(1);
        let total_chunks = planned.len().div_ceil(chunk_size);
        let mut failures = Vec::new();

        for (number, chunk) in planned.chunks(chunk_size).enumerate() {
            let writes: Vec<_> = chunk.iter().map(|p| p.write.clone()).collect();
            let chunk_error = match self.store.set_metafields(&writes).await {
                Ok(errors) if errors.is_empty() => None,
                Ok(errors) => Some(describe_user_errors(&errors)),
                Err(e) => Some(error_chain(&e)),
            };
            debug!(
                "Back-reference chunk {}/{}: {} write(s){}",
                number + 1,
                total_chunks,
                writes.len(),
                if chunk_error.is_some() { ", failed" } else { "" }
            );
            self.observer.notify(ProgressEvent::BackReferenceChunk {
                chunk: number + 1,
                total_chunks,
                writes: writes.len(),
                failed: chunk_error.is_some(),
            });

            if let Some(message) = chunk_error {
                let message = format!("chunk {}/{}: {}", number + 1, total_chunks, message);
                warn!("Back-reference write failed, {}", message);
                for planned_write in chunk {
                    for &row in &planned_write.rows {
                        self.set_status(
                            report,
                            row,
                            CompletionStatus::Failed,
                            Some(format!("back-reference write: {message}")),
                        );
                    }
                }
                failures.push(message);
            }
        }

        for row in participants {
            self.set_status(report, row, CompletionStatus::BackreferencesCompleted, None);
        }

        failures
    }
}
