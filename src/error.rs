//! Error types for the ocr-pdf2md library.
//!
//! Two distinct error types reflect two distinct failure domains:
//!
//! * [`ConversionError`]: everything that can stop a single conversion
//!   request (bad input, unreadable PDF, OCR failure, unwritable output) plus
//!   the few start-up failures of [`crate::Converter`] itself. Inside the
//!   pipeline the first one raised is stored on the record and surfaced to
//!   the caller as a [`crate::output::ConversionResult`] with
//!   `status = "error"`; it never takes the process down.
//!
//! * [`RegistryError`]: the processed-file registry could not be read or
//!   rewritten. Collaborators calling the registry directly see it as-is;
//!   inside the pipeline it is wrapped as a persistence failure.
//!
//! Every variant maps onto one [`ErrorKind`] so callers can branch on the
//! category without matching individual variants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors a conversion request (or converter start-up) can produce.
#[derive(Debug, Error)]
pub enum ConversionError {
    // ── Validation errors ────────────────────────────────────────────────
    /// The input does not carry a `.pdf` extension.
    #[error("Only PDF files are allowed (got '{path}')")]
    DisallowedFileType { path: PathBuf },

    /// Input file was not found at the given path.
    #[error("PDF file {path:?} not found")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file has a `.pdf` name but no `%PDF` header in its first KiB.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Classification errors ────────────────────────────────────────────
    /// The document could not be opened to inspect its first page.
    #[error("Failed to check PDF type of '{path}': {detail}")]
    Classification { path: PathBuf, detail: String },

    /// The document opened but contains no pages at all.
    #[error("Failed to check PDF type of '{path}': document has no pages")]
    NoPages { path: PathBuf },

    // ── OCR errors ───────────────────────────────────────────────────────
    /// The OCR engine ran and failed.
    #[error("OCR failed for '{path}': {detail}")]
    Ocr { path: PathBuf, detail: String },

    /// The OCR engine did not finish within the configured timeout.
    #[error("OCR timed out after {secs}s for '{path}'\nIncrease the OCR timeout or check the OCR engine.")]
    OcrTimeout { path: PathBuf, secs: u64 },

    // ── Extraction errors ────────────────────────────────────────────────
    /// Text extraction failed on a page or on the whole document.
    #[error("Failed to extract text from '{path}': {detail}")]
    Extraction { path: PathBuf, detail: String },

    /// Extraction succeeded but produced nothing worth persisting.
    #[error("No text could be extracted from '{path}'")]
    EmptyDocument { path: PathBuf },

    // ── Persistence errors ───────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to save Markdown to '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The processed-file registry rejected the update.
    #[error("Failed to record processed file: {0}")]
    Registry(#[from] RegistryError),

    /// Copying a file into the upload area failed.
    #[error("Failed to ingest '{path}': {source}")]
    IngestFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Setup errors ─────────────────────────────────────────────────────
    /// One of the working directories could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Place libpdfium next to the executable or in a system library path.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse category of a [`ConversionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Classification,
    Ocr,
    Extraction,
    Persist,
    Setup,
    Internal,
}

impl ConversionError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DisallowedFileType { .. }
            | Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::NotAPdf { .. } => ErrorKind::Validation,
            Self::Classification { .. } | Self::NoPages { .. } => ErrorKind::Classification,
            Self::Ocr { .. } | Self::OcrTimeout { .. } => ErrorKind::Ocr,
            Self::Extraction { .. } | Self::EmptyDocument { .. } => ErrorKind::Extraction,
            Self::OutputWriteFailed { .. } | Self::Registry(_) | Self::IngestFailed { .. } => {
                ErrorKind::Persist
            }
            Self::DirectoryCreateFailed { .. }
            | Self::InvalidConfig(_)
            | Self::PdfiumBindingFailed(_) => ErrorKind::Setup,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised by [`crate::registry::ProcessedFileRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Reading or rewriting the registry file failed.
    #[error("Registry I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry file exists but is not a JSON array of strings.
    #[error("Registry file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
