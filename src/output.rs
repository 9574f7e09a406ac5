//! Result records handed back to callers.
//!
//! [`ConversionResult`] is the only thing a collaborator (tool server, CLI,
//! upload handler) ever sees of a conversion. Its JSON shape is the wire
//! contract:
//!
//! ```json
//! {"status": "success", "message": "...", "output_path": "...", "download_url": "..."}
//! ```
//!
//! Optional fields are omitted rather than serialised as `null`.

use crate::error::{ConversionError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Terminal status of a conversion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Error,
}

/// Outcome of one `convert(path)` call. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub status: ConversionStatus,

    /// Human-readable summary; on error, the first captured error's message.
    pub message: String,

    /// Where the Markdown was written. Present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Public download reference, when a base URL is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// Category of the failure. Present only on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Whether the input was classified as scanned, if classification ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned: Option<bool>,
}

impl ConversionResult {
    /// A success result for `source` written to `output_path`.
    pub fn success(
        source: &Path,
        output_path: PathBuf,
        download_url: Option<String>,
        scanned: bool,
    ) -> Self {
        Self {
            status: ConversionStatus::Success,
            message: format!("Successfully converted {} to Markdown", source.display()),
            output_path: Some(output_path),
            download_url,
            error_kind: None,
            scanned: Some(scanned),
        }
    }

    /// An error result with a free-form message.
    pub fn failure(message: impl Into<String>, kind: Option<ErrorKind>) -> Self {
        Self {
            status: ConversionStatus::Error,
            message: message.into(),
            output_path: None,
            download_url: None,
            error_kind: kind,
            scanned: None,
        }
    }

    /// An error result carrying `error`'s message and category.
    pub fn from_error(error: &ConversionError) -> Self {
        Self::failure(error.to_string(), Some(error.kind()))
    }

    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Success
    }
}

/// Receipt returned by [`crate::Converter::ingest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// Base file name as stored in the upload area and the registry.
    pub filename: String,
    /// Location inside the upload area.
    pub path: PathBuf,
    /// Whether the source file was removed after copying.
    pub delete_after: bool,
    /// False when the registry already listed this file name.
    pub newly_registered: bool,
}
