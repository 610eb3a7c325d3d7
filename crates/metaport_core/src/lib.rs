//! Metaport core: metaobject migration between stores
//!
//! Exports metaobjects from one store into a portable document, where every
//! reference to another resource is written by natural key (handle, SKU,
//! URL) instead of a store-scoped id, and imports such documents into
//! another store, resolving those keys back to ids in bulk.

pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod progress;
pub mod reference;
pub mod resolve;
pub mod store;
pub mod transport;
pub mod utils;
pub mod value;

#[cfg(test)]
mod test_helpers;

// Macros are automatically available at crate root due to #[macro_export]

pub use config::MetaportConfig;
pub use error::{ConfigError, CoreError, Result};
pub use export::{ExportDocument, ExportEntry, ExportOptions, Exporter};
pub use import::{CancelFlag, ImportOptions, ImportReport, Importer};
pub use progress::{CompletionStatus, ProgressEvent, ProgressObserver};
pub use reference::{ReferenceKind, SymbolicRef, normalize_type};
pub use resolve::HandleResolver;
pub use store::{AdminStore, Store};
pub use transport::{HttpTransport, Transport};
pub use value::FieldValue;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        AdminStore, CancelFlag, CompletionStatus, CoreError, ExportDocument, ExportEntry,
        ExportOptions, Exporter, FieldValue, HandleResolver, HttpTransport, ImportOptions,
        ImportReport, Importer, MetaportConfig, ProgressEvent, ProgressObserver, ReferenceKind,
        Result, Store, SymbolicRef, Transport,
    };
}
