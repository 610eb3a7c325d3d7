//! Import of export documents into a destination store

mod backrefs;
mod importer;
mod summary;

pub use importer::{CancelFlag, ImportOptions, Importer};
pub use summary::{EntryResult, EntryStatus, ImportReport, ImportSummary, SummaryResult};
