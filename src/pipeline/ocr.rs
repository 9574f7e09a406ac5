//! OCR engine seam and the `ocrmypdf` subprocess implementation.
//!
//! The engine reads a scanned PDF and writes a new PDF with an added text
//! layer. Deadlines and artifact cleanup belong to the caller
//! ([`super::extract`]); the engine only has to honour cancellation, which
//! [`OcrMyPdf`] does by killing its child process when the future is dropped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Failure reported by an [`OcrEngine`].
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("invalid OCR language list '{0}'")]
    InvalidLanguages(String),

    #[error("{0}")]
    Other(String),
}

/// Adds a text layer to a scanned PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Read `input`, write the text-layered PDF to `output`.
    ///
    /// `languages` is a `+`-joined list of language codes, e.g. `"vie+eng"`.
    async fn ocr(&self, input: &Path, output: &Path, languages: &str) -> Result<(), OcrError>;
}

/// Runs the `ocrmypdf` command-line tool.
#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    program: PathBuf,
    force_ocr: bool,
}

impl OcrMyPdf {
    /// `force_ocr` rasterises and re-OCRs every page; otherwise pages that
    /// already carry text are skipped.
    pub fn new(program: impl Into<PathBuf>, force_ocr: bool) -> Self {
        Self {
            program: program.into(),
            force_ocr,
        }
    }

    fn args(&self, input: &Path, output: &Path, languages: &str) -> Vec<std::ffi::OsString> {
        let mode = if self.force_ocr {
            "--force-ocr"
        } else {
            "--skip-text"
        };
        vec![
            "-l".into(),
            languages.into(),
            mode.into(),
            "-q".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl OcrEngine for OcrMyPdf {
    async fn ocr(&self, input: &Path, output: &Path, languages: &str) -> Result<(), OcrError> {
        crate::config::validate_ocr_languages(languages)
            .map_err(|_| OcrError::InvalidLanguages(languages.to_string()))?;

        info!(
            "Running {} ({}) on {}",
            self.program.display(),
            languages,
            input.display()
        );

        let result = Command::new(&self.program)
            .args(self.args(input, output, languages))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| OcrError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            return Err(OcrError::Failed {
                status: result.status.to_string(),
                stderr,
            });
        }

        debug!("OCR wrote {}", output.display());
        Ok(())
    }
}
