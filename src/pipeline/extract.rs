//! Raw text extraction, with OCR for scanned documents.
//!
//! Text-native documents are read directly. Scanned documents are first run
//! through the [`OcrEngine`] into a per-request artifact in the temp area,
//! and the text is read from that artifact instead.
//!
//! The artifact is a [`tempfile::TempPath`] named `ocr-<request id>-*.pdf`:
//! concurrent requests never share a file, and it is deleted when dropped,
//! so OCR failure, timeout, extraction failure and success all leave the
//! temp area as they found it.
//!
//! Detected tables are inlined after each page's text. Their cells usually
//! also appear in that flowing text, so table content is duplicated in the
//! output. This is kept as-is; nothing is deduplicated.

use super::ocr::OcrEngine;
use super::pdf::{PageContent, PdfBackend};
use super::tables::{format_table, Table};
use crate::error::ConversionError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything extraction needs besides the document itself.
pub struct ExtractContext<'a> {
    pub pdf: Arc<dyn PdfBackend>,
    pub ocr: &'a dyn OcrEngine,
    pub temp_dir: &'a Path,
    pub ocr_languages: &'a str,
    pub ocr_timeout: Duration,
    /// Unique per request; embedded in the OCR artifact's file name.
    pub request_id: &'a str,
}

/// Produce raw text (with inlined Markdown tables) for every page of `source`.
pub async fn extract(
    source: &Path,
    scanned: bool,
    ctx: &ExtractContext<'_>,
) -> Result<String, ConversionError> {
    if !scanned {
        let pages = read_pages(Arc::clone(&ctx.pdf), source, source).await?;
        return Ok(assemble_pages(&pages));
    }

    let artifact = tempfile::Builder::new()
        .prefix(&format!("ocr-{}-", ctx.request_id))
        .suffix(".pdf")
        .tempfile_in(ctx.temp_dir)
        .map_err(|e| ConversionError::Ocr {
            path: source.to_path_buf(),
            detail: format!(
                "cannot create OCR artifact in '{}': {}",
                ctx.temp_dir.display(),
                e
            ),
        })?
        .into_temp_path();
    debug!("OCR artifact: {}", artifact.display());

    info!("Running OCR on {} ({})", source.display(), ctx.ocr_languages);
    let ocr_run = ctx.ocr.ocr(source, &artifact, ctx.ocr_languages);
    match tokio::time::timeout(ctx.ocr_timeout, ocr_run).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Err(ConversionError::Ocr {
                path: source.to_path_buf(),
                detail: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ConversionError::OcrTimeout {
                path: source.to_path_buf(),
                secs: ctx.ocr_timeout.as_secs(),
            })
        }
    }

    let pages = read_pages(Arc::clone(&ctx.pdf), &artifact, source).await?;
    if let Err(e) = artifact.close() {
        warn!("Failed to remove OCR artifact: {}", e);
    }
    Ok(assemble_pages(&pages))
}

/// Read every page of `path` on the blocking pool. Errors name `source`.
async fn read_pages(
    pdf: Arc<dyn PdfBackend>,
    path: &Path,
    source: &Path,
) -> Result<Vec<PageContent>, ConversionError> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf.extract_document(&owned))
        .await
        .map_err(|e| ConversionError::Internal(format!("Extraction task panicked: {}", e)))?
        .map_err(|e| ConversionError::Extraction {
            path: source.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Concatenate pages in order: page text, then each of its non-empty tables
/// as a blank-line-separated Markdown block.
pub fn assemble_pages(pages: &[PageContent]) -> String {
    let mut out = String::new();
    for (idx, page) in pages.iter().enumerate() {
        out.push_str(&page.text);
        out.push('\n');
        let tables: Vec<&Table> = page.tables.iter().filter(|t| !t.is_empty()).collect();
        if !tables.is_empty() {
            warn!(
                "Page {}: {} table(s) appended after page text; cell text appears twice",
                idx + 1,
                tables.len()
            );
        }
        for table in tables {
            out.push('\n');
            out.push_str(&format_table(table));
            out.push('\n');
        }
    }
    out
}
