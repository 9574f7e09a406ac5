//! The conversion pipeline and its collaborator operations.
//!
//! A [`Converter`] owns everything one deployment shares across requests:
//! configuration, the processed-file registry, and the PDF and OCR engines.
//! It is cheap to clone, and independent requests may run on it
//! concurrently; per-request state lives in a [`ConversionRecord`] that only
//! the request's own task touches.
//!
//! ## Request lifecycle
//!
//! ```text
//! validate ──▶ Classify ──▶ Extract ──▶ Structure ──▶ Persist ──▶ Done
//!    │            │            │            │            │
//!    └────────────┴────────────┴────────────┴────────────┴──▶ Error
//! ```
//!
//! Validation runs before any stage, so a rejected path touches nothing on
//! disk. The first error ends the request; later stages do not run and the
//! recorded error is never replaced.

use crate::config::ConverterConfig;
use crate::error::ConversionError;
use crate::output::{ConversionResult, IngestReceipt};
use crate::pipeline::extract::ExtractContext;
use crate::pipeline::ocr::{OcrEngine, OcrMyPdf};
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::pipeline::tables::TableDetection;
use crate::pipeline::{classify, extract, input, persist, structure, PipelineState, Stage};
use crate::registry::ProcessedFileRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Mutable state of one request as it moves through the stages.
#[derive(Debug)]
pub struct ConversionRecord {
    /// Unique per request; names the OCR artifact.
    pub request_id: String,
    pub source: PathBuf,
    pub raw_text: String,
    pub markdown: String,
    /// `None` until classification has run.
    pub scanned: Option<bool>,
    /// First error raised. Never overwritten once set.
    pub error: Option<ConversionError>,
    /// Set only when persistence succeeded.
    pub output_path: Option<PathBuf>,
    pub state: PipelineState,
    result: Option<ConversionResult>,
}

impl ConversionRecord {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
            source: source.into(),
            raw_text: String::new(),
            markdown: String::new(),
            scanned: None,
            error: None,
            output_path: None,
            state: PipelineState::Classify,
            result: None,
        }
    }

    /// Record `error` unless one is already recorded, and stop the pipeline.
    pub fn fail(&mut self, error: ConversionError) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            debug!("Dropping follow-up error: {}", error);
        }
        self.state = PipelineState::Error;
    }

    /// Terminal result for the caller.
    pub fn to_result(&self) -> ConversionResult {
        match (&self.error, &self.result) {
            (Some(err), _) => {
                let mut result = ConversionResult::from_error(err);
                result.scanned = self.scanned;
                result
            }
            (None, Some(result)) if self.state == PipelineState::Done => result.clone(),
            _ => ConversionResult::failure(
                format!("Conversion of {} did not complete", self.source.display()),
                Some(crate::error::ErrorKind::Internal),
            ),
        }
    }
}

/// Scanned-aware PDF → Markdown converter.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ConverterConfig>,
    registry: Arc<ProcessedFileRegistry>,
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("registry", &self.registry.path())
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Bind pdfium, use `ocrmypdf` for OCR, and prepare the working tree.
    pub async fn new(config: ConverterConfig) -> Result<Self, ConversionError> {
        let tables = table_detection(&config);
        let pdf = PdfiumBackend::new(config.pdfium_library_path.as_deref(), tables)
            .map_err(|e| ConversionError::PdfiumBindingFailed(e.to_string()))?;
        let ocr = OcrMyPdf::new(&config.ocrmypdf_path, config.force_ocr);
        Self::with_backends(config, Arc::new(pdf), Arc::new(ocr)).await
    }

    /// Like [`Converter::new`], but pdfium is only bound when a document is
    /// first read.
    ///
    /// Ingest, status and registry listing work on hosts without the pdfium
    /// library; conversions fail there with a classification error.
    pub async fn deferred(config: ConverterConfig) -> Result<Self, ConversionError> {
        let tables = table_detection(&config);
        let pdf = PdfiumBackend::deferred(config.pdfium_library_path.as_deref(), tables);
        let ocr = OcrMyPdf::new(&config.ocrmypdf_path, config.force_ocr);
        Self::with_backends(config, Arc::new(pdf), Arc::new(ocr)).await
    }

    /// Build a converter around caller-supplied engines.
    ///
    /// Creates the upload, output and temp directories and opens (or
    /// creates) the registry.
    pub async fn with_backends(
        config: ConverterConfig,
        pdf: Arc<dyn PdfBackend>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Result<Self, ConversionError> {
        for dir in [&config.upload_dir, &config.output_dir, &config.temp_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ConversionError::DirectoryCreateFailed {
                    path: dir.clone(),
                    source,
                })?;
        }
        let registry = ProcessedFileRegistry::open(&config.registry_path).await?;
        info!(
            "Converter ready (uploads: {}, output: {})",
            config.upload_dir.display(),
            config.output_dir.display()
        );

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            pdf,
            ocr,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// The shared processed-file registry.
    pub fn registry(&self) -> &Arc<ProcessedFileRegistry> {
        &self.registry
    }

    /// Convert `path` into the configured output directory.
    pub async fn convert(&self, path: impl AsRef<Path>) -> ConversionResult {
        self.convert_into(path, &self.config.output_dir).await
    }

    /// Convert `path`, writing `<stem>.md` into `output_dir` (created if absent).
    pub async fn convert_into(
        &self,
        path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> ConversionResult {
        let record = self.convert_record(path, output_dir).await;
        let result = record.to_result();
        if let Some(cb) = &self.config.progress_callback {
            cb.on_conversion_complete(&result);
        }
        result
    }

    /// Run the pipeline and return the full record instead of just the result.
    pub async fn convert_record(
        &self,
        path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> ConversionRecord {
        let start = Instant::now();
        let output_dir = output_dir.as_ref();
        let mut record = ConversionRecord::new(path.as_ref());
        info!(
            "Starting conversion {}: {}",
            record.request_id,
            record.source.display()
        );

        if let Err(e) = input::validate_pdf(&record.source) {
            warn!("Rejected {}: {}", record.source.display(), e);
            record.fail(e);
            return record;
        }

        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_conversion_start(&record.source);
        }

        while !record.state.is_terminal() {
            let Some(stage) = record.state.stage() else {
                break;
            };
            if let Some(cb) = cb {
                cb.on_stage_start(stage);
            }
            debug!("[{}] {} started", record.request_id, stage);

            match self.run_stage(stage, &mut record, output_dir).await {
                Ok(()) => {
                    if let Some(cb) = cb {
                        cb.on_stage_complete(stage);
                    }
                    record.state = record.state.next();
                }
                Err(e) => {
                    warn!("[{}] {} failed: {}", record.request_id, stage, e);
                    if let Some(cb) = cb {
                        cb.on_stage_error(stage, &e.to_string());
                    }
                    record.fail(e);
                }
            }
        }

        let elapsed = start.elapsed().as_millis();
        match &record.error {
            None => info!(
                "Conversion {} complete in {}ms: {}",
                record.request_id,
                elapsed,
                record
                    .output_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            Some(e) => info!(
                "Conversion {} failed after {}ms: {}",
                record.request_id, elapsed, e
            ),
        }
        record
    }

    async fn run_stage(
        &self,
        stage: Stage,
        record: &mut ConversionRecord,
        output_dir: &Path,
    ) -> Result<(), ConversionError> {
        match stage {
            Stage::Classify => {
                let scanned = classify::classify(Arc::clone(&self.pdf), &record.source).await?;
                info!(
                    "{} classified as {}",
                    record.source.display(),
                    if scanned { "scanned" } else { "text-native" }
                );
                record.scanned = Some(scanned);
            }
            Stage::Extract => {
                let scanned = record.scanned.ok_or_else(|| {
                    ConversionError::Internal("extraction ran before classification".into())
                })?;
                let ctx = ExtractContext {
                    pdf: Arc::clone(&self.pdf),
                    ocr: self.ocr.as_ref(),
                    temp_dir: &self.config.temp_dir,
                    ocr_languages: &self.config.ocr_languages,
                    ocr_timeout: self.config.ocr_timeout,
                    request_id: &record.request_id,
                };
                record.raw_text = extract::extract(&record.source, scanned, &ctx).await?;
                debug!("Extracted {} chars", record.raw_text.len());
            }
            Stage::Structure => {
                record.markdown = structure::structure_markdown(&record.raw_text);
            }
            Stage::Persist => {
                let result = persist::persist(
                    &record.source,
                    &record.markdown,
                    record.scanned.unwrap_or(false),
                    output_dir,
                    &self.registry,
                    &self.config,
                )
                .await?;
                record.output_path = result.output_path.clone();
                record.result = Some(result);
            }
        }
        Ok(())
    }

    // ── Collaborator operations ──────────────────────────────────────────

    /// Resolve a user-supplied path: relative paths are taken to live in the
    /// upload area.
    pub fn resolve_input(&self, path: impl AsRef<Path>) -> PathBuf {
        input::resolve_against(&self.config.upload_dir, path)
    }

    /// Copy `file` into the upload area and register its name.
    ///
    /// With `delete_after`, the source is removed once the copy succeeded.
    /// Ingesting a file that already lives at its upload location only
    /// registers it.
    pub async fn ingest(
        &self,
        file: impl AsRef<Path>,
        delete_after: bool,
    ) -> Result<IngestReceipt, ConversionError> {
        let src = file.as_ref();
        if !input::has_pdf_extension(src) {
            return Err(ConversionError::DisallowedFileType {
                path: src.to_path_buf(),
            });
        }
        let filename = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ConversionError::DisallowedFileType {
                path: src.to_path_buf(),
            })?;
        let dst = self.config.upload_dir.join(&filename);

        let ingest_err = |source| ConversionError::IngestFailed {
            path: src.to_path_buf(),
            source,
        };
        let src_canon = tokio::fs::canonicalize(src).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConversionError::FileNotFound {
                    path: src.to_path_buf(),
                }
            } else {
                ingest_err(e)
            }
        })?;
        let in_place = tokio::fs::canonicalize(&dst)
            .await
            .is_ok_and(|d| d == src_canon);

        if in_place {
            debug!("{} already in upload area", dst.display());
        } else {
            tokio::fs::copy(src, &dst).await.map_err(ingest_err)?;
            info!("Copied {} → {}", src.display(), dst.display());
            if delete_after {
                tokio::fs::remove_file(src).await.map_err(ingest_err)?;
                debug!("Removed source {}", src.display());
            }
        }

        let newly_registered = self.registry.register(&filename).await?;
        Ok(IngestReceipt {
            filename,
            path: dst,
            delete_after: delete_after && !in_place,
            newly_registered,
        })
    }

    /// Whether `filename` is present in the upload area.
    ///
    /// Only the final path component is considered.
    pub async fn file_status(&self, filename: &str) -> bool {
        let Some(name) = Path::new(filename).file_name() else {
            return false;
        };
        tokio::fs::metadata(self.config.upload_dir.join(name))
            .await
            .is_ok_and(|m| m.is_file())
    }
}

fn table_detection(config: &ConverterConfig) -> TableDetection {
    TableDetection {
        min_rows: config.min_table_rows,
        min_columns: config.min_table_columns,
    }
}
