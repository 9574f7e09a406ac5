//! Scanned vs. text-native classification.
//!
//! Only page 1's text layer is inspected: absent or whitespace-only text
//! means the document is treated as scanned. A text-native document whose
//! cover page is a full-page image is therefore routed through OCR; the
//! single-page probe keeps classification to one page read regardless of
//! document length.

use super::pdf::{PdfBackend, PdfBackendError};
use crate::error::ConversionError;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Return `true` if `path` looks scanned (no text on page 1).
pub async fn classify(pdf: Arc<dyn PdfBackend>, path: &Path) -> Result<bool, ConversionError> {
    let owned = path.to_path_buf();
    let probe = tokio::task::spawn_blocking(move || -> Result<Option<String>, PdfBackendError> {
        let pages = pdf.page_count(&owned)?;
        if pages == 0 {
            return Ok(None);
        }
        pdf.page_text(&owned, 0).map(Some)
    })
    .await
    .map_err(|e| ConversionError::Internal(format!("Classification task panicked: {}", e)))?;

    let first_page = probe.map_err(|e| ConversionError::Classification {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let Some(text) = first_page else {
        return Err(ConversionError::NoPages {
            path: path.to_path_buf(),
        });
    };

    let scanned = text.trim().is_empty();
    debug!(
        "Page 1 of {} has {} text chars → scanned={}",
        path.display(),
        text.trim().chars().count(),
        scanned
    );
    Ok(scanned)
}
