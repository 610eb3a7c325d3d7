//! Import results and the persisted summary file

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::export::ExportDocument;
use crate::progress::{CompletionStatus, ProgressEvent};
use crate::{CoreError, Result};

/// Outcome of one entry in an import run
#[derive(Debug, Clone, PartialEq)]
pub struct EntryResult {
    /// Position of the entry in the document
    pub index: usize,
    pub type_name: String,
    pub handle: String,
    pub status: CompletionStatus,
    /// Destination id, once the upsert returned one
    pub id: Option<String>,
    pub error: Option<String>,
}

/// Everything an import run did
#[derive(Debug, Clone)]
pub struct ImportReport {
    /// Label of the destination store
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Stopped early; entries not started stay pending
    pub cancelled: bool,
    pub results: Vec<EntryResult>,
}

impl ImportReport {
    pub(crate) fn new(environment: String, document: &ExportDocument, indices: &[usize]) -> Self {
        let now = Utc::now();
        Self {
            environment,
            started_at: now,
            finished_at: now,
            cancelled: false,
            results: indices
                .iter()
                .map(|&index| {
                    let entry = &document.entries[index];
                    EntryResult {
                        index,
                        type_name: entry.type_name.clone(),
                        handle: entry.handle.clone(),
                        status: CompletionStatus::Pending,
                        id: None,
                        error: None,
                    }
                })
                .collect(),
        }
    }

    /// Move a row to `status`, returning the event to publish.
    ///
    /// `Failed` is absorbing: later transitions are ignored, later failures
    /// append their message.
    pub(crate) fn update(
        &mut self,
        row: usize,
        status: CompletionStatus,
        error: Option<String>,
    ) -> Option<ProgressEvent> {
        let result = self.results.get_mut(row)?;
        if result.status.is_failed() {
            if !status.is_failed() {
                return None;
            }
            if let Some(message) = error {
                result.error = Some(match result.error.take() {
                    Some(previous) => format!("{previous}; {message}"),
                    None => message,
                });
            }
        } else {
            result.status = status;
            if error.is_some() {
                result.error = error;
            }
        }

        Some(ProgressEvent::Entry {
            index: result.index,
            type_name: result.type_name.clone(),
            handle: result.handle.clone(),
            status: result.status,
            error: result.error.clone(),
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &EntryResult> {
        self.results.iter().filter(|r| r.status.is_failed())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Entries whose upsert went through
    pub fn created_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.status.is_failed() && r.status != CompletionStatus::Pending)
            .count()
    }

    pub fn to_summary(&self) -> ImportSummary {
        ImportSummary {
            environment: self.environment.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            count: self.results.len(),
            cancelled: self.cancelled,
            results: self
                .results
                .iter()
                .map(|r| SummaryResult {
                    index: r.index,
                    type_name: r.type_name.clone(),
                    handle: r.handle.clone(),
                    status: match r.status {
                        CompletionStatus::Failed => EntryStatus::Failed,
                        CompletionStatus::Pending => EntryStatus::Skipped,
                        _ => EntryStatus::Success,
                    },
                    completion_status: r.status,
                    error: r.error.clone(),
                })
                .collect(),
        }
    }

    /// Write the summary as pretty JSON
    pub async fn write_summary(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.to_summary())
            .map_err(|e| CoreError::serialization("import summary", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| CoreError::io(path, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Failed,
    /// Not attempted, the run was cancelled first
    Skipped,
}

/// Persisted summary of an import run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    pub results: Vec<SummaryResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub index: usize,
    #[serde(rename = "type")]
    pub type_name: String,
    pub handle: String,
    pub status: EntryStatus,
    pub completion_status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
