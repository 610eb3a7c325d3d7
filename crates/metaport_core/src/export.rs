//! Export of metaobjects into portable, dependency-ordered documents
//!
//! In portable mode every reference field the source store can describe by
//! natural key is written as a symbolic reference, so the document can be
//! imported into any store. Back-references (metafields on products,
//! variants, collections and pages pointing at an entry) travel with the
//! entry and are re-applied after import.

mod document;
mod exporter;
mod ordering;
mod types;

pub use document::{read_document, write_document};
pub use exporter::{ExportOptions, Exporter};
pub use ordering::order_entries;
pub use types::{BackReference, ExportDocument, ExportEntry};
