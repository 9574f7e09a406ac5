//! # ocr-pdf2md
//!
//! Convert PDF documents to Markdown, running OCR on scanned documents first.
//!
//! Each request is classified by looking at page 1: if it has a text layer
//! the document is read directly, otherwise it goes through `ocrmypdf` into a
//! temporary text-layered copy. Layout-preserving text is pulled with pdfium,
//! whitespace-aligned tables are rendered as Markdown tables, and a small set
//! of deterministic rules turns short uppercase or title-case lines into
//! headings. The result is written to `<output_dir>/<stem>.md` and the input
//! file name is recorded in a shared JSON registry.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 0. Validate   .pdf extension, exists, %PDF magic
//!  ├─ 1. Classify   page-1 text layer → scanned / text-native
//!  ├─ 2. Extract    pdfium layout text + tables (ocrmypdf first if scanned)
//!  ├─ 3. Structure  blank-line collapse, heading promotion
//!  └─ 4. Persist    atomic <stem>.md write, registry update
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_pdf2md::{Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder().root("/srv/pdf2md").build()?;
//!     let converter = Converter::new(config).await?;
//!
//!     let result = converter.convert(converter.resolve_input("report.pdf")).await;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External tools
//!
//! - **pdfium** shared library, found via `pdfium_library_path`,
//!   `PDFIUM_LIB_PATH`, the working directory, or the system library path.
//! - **ocrmypdf** (with Tesseract and the configured language packs) on
//!   `PATH`, only needed for scanned documents.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod registry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, DEFAULT_OCR_LANGUAGES};
pub use convert::{ConversionRecord, Converter};
pub use error::{ConversionError, ErrorKind, RegistryError};
pub use output::{ConversionResult, ConversionStatus, IngestReceipt};
pub use pipeline::ocr::{OcrEngine, OcrError, OcrMyPdf};
pub use pipeline::pdf::{PageContent, PdfBackend, PdfBackendError, PdfiumBackend};
pub use pipeline::tables::{format_table, Table};
pub use pipeline::{PipelineState, Stage};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::ProcessedFileRegistry;
