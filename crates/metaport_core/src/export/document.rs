use std::path::Path;

use tracing::{debug, warn};

use super::types::ExportDocument;
use crate::{CoreError, Result};

/// Write a document as pretty JSON.
///
/// The content goes to a sibling temporary file first and is renamed into
/// place, so `path` never holds a partial document.
pub async fn write_document(path: &Path, document: &ExportDocument) -> Result<()> {
    let content = serde_json::to_string_pretty(document)
        .map_err(|e| CoreError::serialization("export document", e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::io(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| CoreError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CoreError::io(path, e));
    }

    debug!(
        "Wrote {} entries to {}",
        document.entries.len(),
        path.display()
    );
    Ok(())
}

/// Read a document, trusting the entries over a stale `count`
pub async fn read_document(path: &Path) -> Result<ExportDocument> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::io(path, e))?;
    let mut document: ExportDocument = serde_json::from_str(&content)
        .map_err(|e| CoreError::serialization("export document", e))?;

    if document.count != document.entries.len() {
        warn!(
            "{} declares {} entries but holds {}",
            path.display(),
            document.count,
            document.entries.len()
        );
        document.count = document.entries.len();
    }
    Ok(document)
}
