//! Persist Markdown to `<output_dir>/<stem>.md` and record the input.
//!
//! The file is written to a temp file in the output directory and renamed
//! into place, so readers never see a half-written document and a prior
//! version is replaced in one step. If the registry update fails after that,
//! the new file is removed again and the request fails.

use crate::config::ConverterConfig;
use crate::error::ConversionError;
use crate::output::ConversionResult;
use crate::registry::ProcessedFileRegistry;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `<output_dir>/<input stem>.md`.
pub fn output_path_for(source: &Path, output_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_dir.join(format!("{stem}.md"))
}

/// Write `markdown` for `source` into `output_dir` and register the input
/// file name.
pub async fn persist(
    source: &Path,
    markdown: &str,
    scanned: bool,
    output_dir: &Path,
    registry: &ProcessedFileRegistry,
    config: &ConverterConfig,
) -> Result<ConversionResult, ConversionError> {
    if markdown.trim().is_empty() {
        return Err(ConversionError::EmptyDocument {
            path: source.to_path_buf(),
        });
    }

    let target = output_path_for(source, output_dir);
    write_atomic(&target, markdown.as_bytes()).await?;
    info!("Saved {} ({} bytes)", target.display(), markdown.len());

    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Err(e) = registry.register(&filename).await {
        if let Err(rm) = tokio::fs::remove_file(&target).await {
            warn!("Failed to remove {} after registry error: {}", target.display(), rm);
        }
        return Err(e.into());
    }

    let download_url = target
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| config.download_url_for(n));

    Ok(ConversionResult::success(
        source,
        target,
        download_url,
        scanned,
    ))
}

async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), ConversionError> {
    let dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let target_owned = target.to_path_buf();
    let bytes = bytes.to_vec();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&target_owned).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| ConversionError::Internal(format!("Write task panicked: {}", e)))?
    .map_err(|source| ConversionError::OutputWriteFailed {
        path: target.to_path_buf(),
        source,
    })
}
