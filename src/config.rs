//! Configuration types for PDF-to-Markdown conversion.
//!
//! Every path and knob the pipeline needs lives in one [`ConverterConfig`],
//! built once via [`ConverterConfigBuilder`] and handed to
//! [`crate::Converter::new`]. Nothing is read from process-wide globals, so
//! converters with different roots can coexist in one process.

use crate::error::ConversionError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Tesseract language list passed to the OCR engine.
pub const DEFAULT_OCR_LANGUAGES: &str = "vie+eng";

/// Configuration for a [`crate::Converter`].
///
/// # Example
/// ```rust
/// use ocr_pdf2md::ConverterConfig;
/// use std::time::Duration;
///
/// let config = ConverterConfig::builder()
///     .root("/srv/pdf2md")
///     .ocr_languages("eng")
///     .ocr_timeout(Duration::from_secs(120))
///     .build()
///     .unwrap();
/// assert!(config.output_dir.ends_with("output"));
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Upload/input area. Relative inputs are resolved against it.
    pub upload_dir: PathBuf,

    /// Where `<stem>.md` files are written.
    pub output_dir: PathBuf,

    /// Scratch area for per-request OCR artifacts.
    pub temp_dir: PathBuf,

    /// JSON file backing the processed-file registry.
    pub registry_path: PathBuf,

    /// Tesseract language list, `+`-separated. Default: `vie+eng`.
    pub ocr_languages: String,

    /// Upper bound on a single OCR invocation. Default: 600 s.
    ///
    /// On expiry the engine process is killed and the request fails with an
    /// OCR timeout.
    pub ocr_timeout: Duration,

    /// Executable used by [`crate::pipeline::ocr::OcrMyPdf`]. Default: `ocrmypdf`.
    pub ocrmypdf_path: String,

    /// Rasterise and OCR every page even if some already carry text. Default: true.
    pub force_ocr: bool,

    /// Public prefix for download references, e.g. `http://localhost:8001/output`.
    ///
    /// When set, successful results carry `download_url = <prefix>/<escaped name>`.
    pub download_base_url: Option<String>,

    /// Explicit pdfium library path. Falls back to `PDFIUM_LIB_PATH`, then
    /// the working directory, then the system library path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Minimum consecutive aligned rows (header included) to call a block a table. Default: 2.
    pub min_table_rows: usize,

    /// Minimum columns per row to call a block a table. Default: 2.
    pub min_table_columns: usize,

    /// Optional stage-level progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::from_root(".")
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("temp_dir", &self.temp_dir)
            .field("registry_path", &self.registry_path)
            .field("ocr_languages", &self.ocr_languages)
            .field("ocr_timeout", &self.ocr_timeout)
            .field("ocrmypdf_path", &self.ocrmypdf_path)
            .field("force_ocr", &self.force_ocr)
            .field("download_base_url", &self.download_base_url)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("min_table_rows", &self.min_table_rows)
            .field("min_table_columns", &self.min_table_columns)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Standard layout beneath a project root:
    /// `uploaded/`, `output/`, `temp/` and `processed_files.json`.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            upload_dir: root.join("uploaded"),
            output_dir: root.join("output"),
            temp_dir: root.join("temp"),
            registry_path: root.join("processed_files.json"),
            ocr_languages: DEFAULT_OCR_LANGUAGES.to_string(),
            ocr_timeout: Duration::from_secs(600),
            ocrmypdf_path: "ocrmypdf".to_string(),
            force_ocr: true,
            download_base_url: None,
            pdfium_library_path: None,
            min_table_rows: 2,
            min_table_columns: 2,
            progress_callback: None,
        }
    }

    /// Create a new builder rooted at the current directory.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build the public download reference for an output file name.
    pub fn download_url_for(&self, file_name: &str) -> Option<String> {
        self.download_base_url.as_ref().map(|base| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                urlencoding::encode(file_name)
            )
        })
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    /// Re-root every directory and the registry file under `root`.
    ///
    /// Call this first: later per-directory setters override it.
    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        let fresh = ConverterConfig::from_root(root);
        self.config.upload_dir = fresh.upload_dir;
        self.config.output_dir = fresh.output_dir;
        self.config.temp_dir = fresh.temp_dir;
        self.config.registry_path = fresh.registry_path;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    pub fn registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.registry_path = path.into();
        self
    }

    pub fn ocr_languages(mut self, langs: impl Into<String>) -> Self {
        self.config.ocr_languages = langs.into();
        self
    }

    pub fn ocr_timeout(mut self, timeout: Duration) -> Self {
        self.config.ocr_timeout = timeout;
        self
    }

    pub fn ocrmypdf_path(mut self, path: impl Into<String>) -> Self {
        self.config.ocrmypdf_path = path.into();
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.config.force_ocr = v;
        self
    }

    pub fn download_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.download_base_url = Some(url.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn min_table_rows(mut self, n: usize) -> Self {
        self.config.min_table_rows = n;
        self
    }

    pub fn min_table_columns(mut self, n: usize) -> Self {
        self.config.min_table_columns = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConversionError> {
        let c = &self.config;
        validate_ocr_languages(&c.ocr_languages)?;
        if c.ocr_timeout.is_zero() {
            return Err(ConversionError::InvalidConfig(
                "OCR timeout must be greater than zero".into(),
            ));
        }
        if c.ocrmypdf_path.trim().is_empty() {
            return Err(ConversionError::InvalidConfig(
                "OCR executable path must not be empty".into(),
            ));
        }
        if c.min_table_rows < 2 {
            return Err(ConversionError::InvalidConfig(format!(
                "A table needs at least 2 rows (header + data), got {}",
                c.min_table_rows
            )));
        }
        if c.min_table_columns < 2 {
            return Err(ConversionError::InvalidConfig(format!(
                "A table needs at least 2 columns, got {}",
                c.min_table_columns
            )));
        }
        Ok(self.config)
    }
}

/// Reject language lists that could smuggle extra arguments into the OCR
/// command line. Accepts e.g. `eng`, `vie+eng`, `chi_sim`.
pub fn validate_ocr_languages(langs: &str) -> Result<(), ConversionError> {
    if langs.is_empty() || langs.len() > 32 {
        return Err(ConversionError::InvalidConfig(format!(
            "OCR language list must be 1–32 characters, got {:?}",
            langs
        )));
    }
    if let Some(bad) = langs
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '+' && *c != '_')
    {
        return Err(ConversionError::InvalidConfig(format!(
            "Invalid character {:?} in OCR language list {:?}",
            bad, langs
        )));
    }
    Ok(())
}
