//! Progress reporting for export, resolution and import runs

use serde::Serialize;

use crate::reference::ReferenceKind;

/// Cumulative resolver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveCounters {
    /// Remote calls issued so far
    pub remote_calls: usize,
    /// References resolved to an id
    pub resolved: usize,
    /// References that ended without an id (not found or failed group)
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolveStage {
    GroupStarted,
    GroupCompleted,
    GroupFailed,
}

/// Where an entry is in an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStatus {
    Pending,
    MetaobjectCreated,
    BackreferencesPending,
    BackreferencesCompleted,
    Failed,
}

impl CompletionStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, CompletionStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProgressEvent {
    Resolve {
        stage: ResolveStage,
        kind: ReferenceKind,
        /// Metaobject type or product handle the group is keyed by
        label: Option<String>,
        size: usize,
        counters: ResolveCounters,
        error: Option<String>,
    },
    ExportPage {
        type_name: String,
        page: usize,
        records: usize,
    },
    Entry {
        index: usize,
        type_name: String,
        handle: String,
        status: CompletionStatus,
        error: Option<String>,
    },
    BackReferenceChunk {
        chunk: usize,
        total_chunks: usize,
        writes: usize,
        failed: bool,
    },
}

/// Receives progress events. Implemented for any `Fn(ProgressEvent)`.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn notify(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Observer that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn notify(&self, _event: ProgressEvent) {}
}
