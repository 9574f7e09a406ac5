//! PDF text access: the [`PdfBackend`] capability and its pdfium implementation.
//!
//! The pipeline never talks to pdfium directly. Classification and extraction
//! go through [`PdfBackend`], so the stage logic can be exercised with an
//! in-memory fake and the real engine can be swapped without touching it.
//!
//! ## Layout reconstruction
//!
//! pdfium's plain `text().all()` returns characters in content-stream order
//! with column gaps collapsed, which destroys exactly the whitespace that
//! table detection relies on. [`PdfiumBackend`] instead reads positioned text
//! segments and re-lays them on a character grid ([`compose_layout`]):
//! segments on the same baseline share a line, horizontal offsets become
//! runs of spaces, and large vertical gaps become blank lines.
//!
//! ## Threading
//!
//! All methods are blocking. Callers run them inside
//! `tokio::task::spawn_blocking`; pdfium-render's `thread_safe` feature
//! serialises calls into the library across those threads.

use super::tables::{detect_tables, Table, TableDetection};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Failure reported by a [`PdfBackend`].
#[derive(Debug, Error)]
pub enum PdfBackendError {
    /// The document could not be opened or parsed.
    #[error("cannot open document: {0}")]
    Open(String),

    /// A single page could not be read.
    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    /// The pdfium library could not be loaded.
    #[error("{0}")]
    Binding(String),
}

/// Text and tables of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    /// Layout-preserving text of the page.
    pub text: String,
    /// Tables detected on the page, in reading order.
    pub tables: Vec<Table>,
}

/// Read access to a PDF's text layer.
pub trait PdfBackend: Send + Sync {
    /// Number of pages. Fails if the document cannot be opened.
    fn page_count(&self, path: &Path) -> Result<usize, PdfBackendError>;

    /// Raw text layer of one page, without layout reconstruction.
    fn page_text(&self, path: &Path, page_index: usize) -> Result<String, PdfBackendError>;

    /// Layout-preserving text and detected tables of one page.
    fn extract_page(&self, path: &Path, page_index: usize)
        -> Result<PageContent, PdfBackendError>;

    /// Every page in order. Implementations that can keep the document open
    /// across pages should override this.
    fn extract_document(&self, path: &Path) -> Result<Vec<PageContent>, PdfBackendError> {
        let count = self.page_count(path)?;
        (0..count).map(|idx| self.extract_page(path, idx)).collect()
    }
}

// ── pdfium implementation ────────────────────────────────────────────────────

/// [`PdfBackend`] backed by the pdfium library via `pdfium-render`.
///
/// Every call binds its own `Pdfium` handle on the calling (blocking) thread
/// and releases it before returning, so no pdfium state is shared between
/// requests.
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
    tables: TableDetection,
}

impl PdfiumBackend {
    /// Resolve the pdfium library and check that it can be bound.
    ///
    /// Library resolution, first match wins:
    /// 1. `library_path` when given
    /// 2. `PDFIUM_LIB_PATH` environment variable
    /// 3. the platform library name in the working directory
    /// 4. the system library search path
    pub fn new(
        library_path: Option<&Path>,
        tables: TableDetection,
    ) -> Result<Self, PdfBackendError> {
        let backend = Self::deferred(library_path, tables);
        backend.bind()?;
        Ok(backend)
    }

    /// Resolve the library like [`PdfiumBackend::new`] without binding it.
    ///
    /// A missing library surfaces on the first document access instead.
    pub fn deferred(library_path: Option<&Path>, tables: TableDetection) -> Self {
        let library_path: Option<PathBuf> = library_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));
        if let Some(path) = &library_path {
            info!("Using pdfium from {}", path.display());
        }
        Self {
            library_path,
            tables,
        }
    }

    fn bind(&self) -> Result<Pdfium, PdfBackendError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path).map_err(|e| {
                PdfBackendError::Binding(format!("{}: {:?}", path.display(), e))
            })?,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| PdfBackendError::Binding(format!("{:?}", e)))?,
        };
        Ok(Pdfium::new(bindings))
    }

    /// Open `path` and hand the document to `f`.
    fn with_document<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, PdfBackendError>,
    ) -> Result<T, PdfBackendError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfBackendError::Open(format!("{:?}", e)))?;
        f(&document)
    }

    fn page_content(&self, page: &PdfPage<'_>, page_index: usize) -> Result<PageContent, PdfBackendError> {
        let text_page = page.text().map_err(|e| page_error(page_index, e))?;

        let fragments: Vec<TextFragment> = text_page
            .segments()
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                TextFragment {
                    text: segment.text(),
                    left: bounds.left().value,
                    right: bounds.right().value,
                    top: bounds.top().value,
                    bottom: bounds.bottom().value,
                }
            })
            .collect();

        let text = compose_layout(&fragments);
        let tables = detect_tables(&text, self.tables);
        debug!(
            "Page {}: {} fragments, {} chars, {} tables",
            page_index + 1,
            fragments.len(),
            text.len(),
            tables.len()
        );
        Ok(PageContent { text, tables })
    }
}

fn page_error(page_index: usize, e: PdfiumError) -> PdfBackendError {
    PdfBackendError::Page {
        page: page_index + 1,
        detail: format!("{:?}", e),
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_count(&self, path: &Path) -> Result<usize, PdfBackendError> {
        self.with_document(path, |document| Ok(document.pages().len() as usize))
    }

    fn page_text(&self, path: &Path, page_index: usize) -> Result<String, PdfBackendError> {
        self.with_document(path, |document| {
            let page = document
                .pages()
                .get(page_index as u16)
                .map_err(|e| page_error(page_index, e))?;
            let text = page.text().map_err(|e| page_error(page_index, e))?;
            Ok(text.all())
        })
    }

    fn extract_page(
        &self,
        path: &Path,
        page_index: usize,
    ) -> Result<PageContent, PdfBackendError> {
        self.with_document(path, |document| {
            let page = document
                .pages()
                .get(page_index as u16)
                .map_err(|e| page_error(page_index, e))?;
            self.page_content(&page, page_index)
        })
    }

    fn extract_document(&self, path: &Path) -> Result<Vec<PageContent>, PdfBackendError> {
        self.with_document(path, |document| {
            let pages = document.pages();
            let total = pages.len() as usize;
            info!("PDF loaded: {} pages", total);

            let mut out = Vec::with_capacity(total);
            for idx in 0..total {
                let page = pages.get(idx as u16).map_err(|e| page_error(idx, e))?;
                out.push(self.page_content(&page, idx)?);
            }
            Ok(out)
        })
    }
}

// ── Layout reconstruction ────────────────────────────────────────────────────

/// A positioned run of text in PDF user space (origin bottom-left, y up).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextFragment {
    fn height(&self) -> f32 {
        (self.top - self.bottom).max(0.0)
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// Fallback glyph width (points) when fragments carry no usable widths.
const DEFAULT_CHAR_WIDTH: f32 = 5.0;

/// Re-lay positioned fragments as monospaced text.
///
/// - fragments whose vertical centres lie within half a line height of a
///   line's first fragment join that line;
/// - lines are emitted top to bottom, fragments left to right;
/// - a fragment starts at column `(left - page_left) / char_width`, padded
///   with spaces, and at least one space after the previous fragment when
///   they do not touch;
/// - a vertical gap larger than 1.5 line heights inserts one blank line.
pub fn compose_layout(fragments: &[TextFragment]) -> String {
    let mut frags: Vec<&TextFragment> = fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .collect();
    if frags.is_empty() {
        return String::new();
    }

    let char_width = average_char_width(&frags);
    let page_left = frags
        .iter()
        .map(|f| f.left)
        .fold(f32::INFINITY, f32::min);

    // Top of page first.
    frags.sort_by(|a, b| b.center_y().total_cmp(&a.center_y()));

    let mut lines: Vec<Vec<&TextFragment>> = Vec::new();
    for frag in frags {
        let joins = lines.last().is_some_and(|line| {
            let anchor = line[0];
            let tolerance = anchor.height().max(frag.height()) / 2.0;
            (anchor.center_y() - frag.center_y()).abs() <= tolerance
        });
        match lines.last_mut() {
            Some(line) if joins => line.push(frag),
            _ => lines.push(vec![frag]),
        }
    }

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut prev: Option<(f32, f32)> = None; // (center_y, height) of previous line

    for mut line in lines {
        line.sort_by(|a, b| a.left.total_cmp(&b.left));

        let center = line[0].center_y();
        let height = line
            .iter()
            .map(|f| f.height())
            .fold(0.0_f32, f32::max)
            .max(1.0);
        if let Some((prev_center, prev_height)) = prev {
            if prev_center - center > 1.5 * prev_height.max(height) {
                out.push(String::new());
            }
        }
        prev = Some((center, height));

        let mut rendered = String::new();
        let mut cursor = 0usize;
        let mut last_right: Option<f32> = None;
        for frag in line {
            let column = ((frag.left - page_left) / char_width).round().max(0.0) as usize;
            let touches = last_right.is_some_and(|r| frag.left - r < char_width * 0.25);
            if column > cursor {
                rendered.extend(std::iter::repeat_n(' ', column - cursor));
                cursor = column;
            } else if cursor > 0 && !touches {
                rendered.push(' ');
                cursor += 1;
            }
            let text = frag.text.trim_end_matches(['\r', '\n']);
            rendered.push_str(text);
            cursor += text.chars().count();
            last_right = Some(frag.right);
        }
        out.push(rendered.trim_end().to_string());
    }

    out.join("\n")
}

fn average_char_width(frags: &[&TextFragment]) -> f32 {
    let (width, chars) = frags.iter().fold((0.0_f32, 0usize), |(w, n), f| {
        (w + (f.right - f.left).max(0.0), n + f.text.chars().count())
    });
    if chars == 0 || width <= 0.0 {
        DEFAULT_CHAR_WIDTH
    } else {
        width / chars as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, left: f32, baseline: f32) -> TextFragment {
        // 5pt per char, 10pt tall
        TextFragment {
            text: text.to_string(),
            left,
            right: left + 5.0 * text.chars().count() as f32,
            top: baseline + 10.0,
            bottom: baseline,
        }
    }

    #[test]
    fn orders_lines_top_to_bottom() {
        let text = compose_layout(&[frag("second", 0.0, 700.0), frag("first", 0.0, 712.0)]);
        assert_eq!(text, "first\nsecond");
    }

    #[test]
    fn preserves_column_gaps() {
        let text = compose_layout(&[
            frag("Name", 0.0, 700.0),
            frag("Age", 50.0, 700.0),
            frag("Alice", 0.0, 688.0),
            frag("30", 50.0, 688.0),
        ]);
        assert_eq!(text, "Name      Age\nAlice     30");
    }

    #[test]
    fn indentation_is_relative_to_left_margin() {
        let text = compose_layout(&[frag("body", 72.0, 700.0), frag("indented", 92.0, 688.0)]);
        assert_eq!(text, "body\n    indented");
    }

    #[test]
    fn large_vertical_gap_inserts_blank_line() {
        let text = compose_layout(&[frag("para one", 0.0, 700.0), frag("para two", 0.0, 650.0)]);
        assert_eq!(text, "para one\n\npara two");
    }

    #[test]
    fn adjacent_words_on_a_line_are_separated() {
        let text = compose_layout(&[frag("hello", 0.0, 700.0), frag("world", 27.0, 700.0)]);
        assert_eq!(text, "hello world");
    }

    #[test]
    fn whitespace_only_input_is_empty() {
        assert_eq!(compose_layout(&[frag("   ", 0.0, 700.0)]), "");
        assert_eq!(compose_layout(&[]), "");
    }

    #[test]
    fn layout_feeds_table_detection() {
        let text = compose_layout(&[
            frag("Region", 0.0, 700.0),
            frag("Total", 60.0, 700.0),
            frag("North", 0.0, 688.0),
            frag("12", 60.0, 688.0),
        ]);
        let tables = detect_tables(&text, TableDetection::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows()[1], vec!["North", "12"]);
    }

    #[test]
    fn two_column_prose_page_is_emitted_once() {
        let text = compose_layout(&[
            frag("The committee met on Monday to", 0.0, 700.0),
            frag("Budget figures were reviewed and", 300.0, 700.0),
            frag("discuss the proposal in detail.", 0.0, 688.0),
            frag("approved without any amendments.", 300.0, 688.0),
            frag("Members raised several points", 0.0, 676.0),
            frag("The chair closed the session.", 300.0, 676.0),
        ]);
        let tables = detect_tables(&text, TableDetection::default());
        assert!(tables.is_empty(), "{tables:?}");

        let raw = crate::pipeline::extract::assemble_pages(&[PageContent { text, tables }]);
        assert_eq!(raw.matches("discuss the proposal in detail.").count(), 1);
        assert!(!raw.contains('|'), "{raw}");
    }
}
