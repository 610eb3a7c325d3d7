//! Terminal progress rendering for export and import runs

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use metaport_core::progress::ResolveStage;
use metaport_core::{CompletionStatus, ProgressEvent, ProgressObserver};
use owo_colors::OwoColorize;

/// Progress bars fed by core progress events
pub struct ProgressDisplay {
    multi: MultiProgress,
    lookups: ProgressBar,
    work: ProgressBar,
    links: ProgressBar,
    /// Entries that finished their upsert, successfully or not
    settled: Mutex<HashSet<usize>>,
}

fn spinner(prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:12} {spinner:.dim} {msg}") {
        bar.set_style(style.tick_strings(&["|", "/", "-", "\\", " "]));
    }
    bar.set_prefix(format!("{}", prefix.green().bold()));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn counter(prefix: &str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{prefix:12} [{bar:25}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.set_prefix(format!("{}", prefix.green().bold()));
    bar
}

impl ProgressDisplay {
    /// Page counter for an export
    pub fn for_export() -> Self {
        let multi = MultiProgress::new();
        let work = multi.add(spinner("Fetching"));
        Self {
            lookups: ProgressBar::hidden(),
            links: ProgressBar::hidden(),
            work,
            multi,
            settled: Mutex::new(HashSet::new()),
        }
    }

    /// Lookup, entry and link bars for an import of `entries` entries
    pub fn for_import(entries: usize) -> Self {
        let multi = MultiProgress::new();
        let lookups = multi.add(spinner("Resolving"));
        let work = multi.add(counter("Importing", entries as u64));
        let links = multi.add(spinner("Linking"));
        Self {
            multi,
            lookups,
            work,
            links,
            settled: Mutex::new(HashSet::new()),
        }
    }

    pub fn finish(&self) {
        self.lookups.finish();
        self.work.finish();
        self.links.finish();
        let _ = self.multi.clear();
    }

    fn settle(&self, index: usize) -> bool {
        self.settled
            .lock()
            .map(|mut settled| settled.insert(index))
            .unwrap_or(false)
    }
}

impl ProgressObserver for ProgressDisplay {
    fn notify(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Resolve {
                stage,
                kind,
                label,
                counters,
                error,
                ..
            } => {
                let scope = match label {
                    Some(label) => format!("{kind} {label}"),
                    None => kind.to_string(),
                };
                let state = match stage {
                    ResolveStage::GroupStarted => "looking up".to_string(),
                    ResolveStage::GroupCompleted => "done".to_string(),
                    ResolveStage::GroupFailed => {
                        format!("{}", format!("failed: {}", error.unwrap_or_default()).red())
                    }
                };
                self.lookups.set_message(format!(
                    "{} lookups, {} resolved, {} unresolved ({scope}: {state})",
                    counters.remote_calls, counters.resolved, counters.failed
                ));
            }
            ProgressEvent::ExportPage {
                type_name,
                page,
                records,
            } => {
                self.work
                    .set_message(format!("{type_name}: page {page}, {records} records"));
            }
            ProgressEvent::Entry {
                index,
                type_name,
                handle,
                status,
                ..
            } => {
                let upserted = matches!(
                    status,
                    CompletionStatus::MetaobjectCreated | CompletionStatus::Failed
                );
                if upserted && self.settle(index) {
                    self.work.inc(1);
                }
                self.work.set_message(format!("{type_name}/{handle}"));
            }
            ProgressEvent::BackReferenceChunk {
                chunk,
                total_chunks,
                writes,
                failed,
            } => {
                let outcome = if failed {
                    format!("{}", "failed".red())
                } else {
                    "ok".to_string()
                };
                self.links.set_message(format!(
                    "chunk {chunk}/{total_chunks}, {writes} writes, {outcome}"
                ));
            }
        }
    }
}
