//! End-to-end tests against the real pdfium library (and, optionally, a real
//! `ocrmypdf`).
//!
//! Fixture PDFs are generated on the fly with pdfium itself, so no binary
//! test files are checked in. The tests are gated behind `E2E_ENABLED` so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 LD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture
//!
//! The OCR test additionally needs `ocrmypdf` on `PATH`.

use async_trait::async_trait;
use ocr_pdf2md::{
    Converter, ConverterConfig, ErrorKind, OcrEngine, OcrError, PdfBackend, PdfiumBackend,
};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn bind_pdfium() -> Pdfium {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(path) => Pdfium::bind_to_library(PathBuf::from(path)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .expect("pdfium library must be available for e2e tests");
    Pdfium::new(bindings)
}

/// One line of text at (x, y) in points.
struct Line<'a>(f32, f32, &'a str);

const BLANK_PAGE: &[Line<'static>] = &[];

/// Write a PDF with one page per entry; an empty entry is a page with no text.
fn write_pdf(path: &Path, pages: &[&[Line<'_>]]) {
    let pdfium = bind_pdfium();
    let mut document = pdfium.create_new_pdf().unwrap();
    let font = document.fonts_mut().helvetica();

    for lines in pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
        for Line(x, y, text) in lines.iter() {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(*x),
                    PdfPoints::new(*y),
                    *text,
                    font,
                    PdfPoints::new(11.0),
                )
                .unwrap();
        }
    }

    document.save_to_file(path).unwrap();
}

fn report_pages() -> Vec<Vec<Line<'static>>> {
    vec![vec![
        Line(72.0, 760.0, "QUARTERLY REPORT"),
        Line(72.0, 720.0, "Revenue grew in every region this quarter."),
        Line(72.0, 680.0, "Region"),
        Line(220.0, 680.0, "Total"),
        Line(72.0, 665.0, "North"),
        Line(220.0, 665.0, "120"),
        Line(72.0, 650.0, "South"),
        Line(220.0, 650.0, "95"),
    ]]
}

async fn converter_in(dir: &TempDir, ocr: Option<Arc<dyn OcrEngine>>) -> Converter {
    let config = ConverterConfig::builder().root(dir.path()).build().unwrap();
    match ocr {
        None => Converter::new(config).await.unwrap(),
        Some(ocr) => {
            let pdf = PdfiumBackend::new(None, Default::default()).unwrap();
            Converter::with_backends(config, Arc::new(pdf), ocr)
                .await
                .unwrap()
        }
    }
}

/// Stands in for OCR by copying a prepared text-layered PDF to the output.
struct CopyOcr(PathBuf);

#[async_trait]
impl OcrEngine for CopyOcr {
    async fn ocr(&self, _input: &Path, output: &Path, _languages: &str) -> Result<(), OcrError> {
        tokio::fs::copy(&self.0, output)
            .await
            .map(|_| ())
            .map_err(|e| OcrError::Other(e.to_string()))
    }
}

// ── Backend ──────────────────────────────────────────────────────────────────

#[test]
fn pdfium_backend_reads_layout_and_tables() {
    e2e_skip_unless_enabled!();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.pdf");
    let pages = report_pages();
    let refs: Vec<&[Line<'_>]> = pages.iter().map(Vec::as_slice).collect();
    write_pdf(&path, &refs);

    let backend = PdfiumBackend::new(None, Default::default()).unwrap();
    assert_eq!(backend.page_count(&path).unwrap(), 1);
    assert!(backend.page_text(&path, 0).unwrap().contains("QUARTERLY"));

    let page = backend.extract_page(&path, 0).unwrap();
    println!("{}", page.text);
    assert!(page.text.lines().any(|l| l.contains("Region") && l.contains("Total")));
    assert_eq!(page.tables.len(), 1, "expected one table in:\n{}", page.text);
    assert_eq!(page.tables[0].column_count(), 2);
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn text_native_pdf_converts_with_table() {
    e2e_skip_unless_enabled!();
    let dir = TempDir::new().unwrap();
    let converter = converter_in(&dir, None).await;
    let src = converter.config().upload_dir.join("report.pdf");
    let pages = report_pages();
    let refs: Vec<&[Line<'_>]> = pages.iter().map(Vec::as_slice).collect();
    write_pdf(&src, &refs);

    let result = converter.convert(&src).await;
    assert!(result.is_success(), "{}", result.message);
    assert_eq!(result.scanned, Some(false));

    let md = std::fs::read_to_string(result.output_path.unwrap()).unwrap();
    println!("{md}");
    assert!(md.contains("## QUARTERLY REPORT"));
    assert!(md.contains("| Region | Total |"));
    assert!(md.lines().any(|l| l.starts_with("| ---")));
    assert!(md.ends_with('\n'));
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_pdf_is_routed_through_ocr() {
    e2e_skip_unless_enabled!();
    let dir = TempDir::new().unwrap();

    let ocr_output = dir.path().join("prepared.pdf");
    let recognised: &[Line<'_>] = &[Line(72.0, 760.0, "RECOGNISED TEXT")];
    write_pdf(&ocr_output, &[recognised]);

    let converter = converter_in(&dir, Some(Arc::new(CopyOcr(ocr_output)))).await;
    let src = converter.config().upload_dir.join("scan.pdf");
    write_pdf(&src, &[BLANK_PAGE]);

    let result = converter.convert(&src).await;
    assert!(result.is_success(), "{}", result.message);
    assert_eq!(result.scanned, Some(true));

    let md = std::fs::read_to_string(result.output_path.unwrap()).unwrap();
    assert!(md.contains("## RECOGNISED TEXT"), "{md}");
    let leftovers = std::fs::read_dir(&converter.config().temp_dir)
        .unwrap()
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn real_ocrmypdf_leaves_no_artifacts() {
    e2e_skip_unless_enabled!();
    let has_ocrmypdf = std::process::Command::new("ocrmypdf")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !has_ocrmypdf {
        println!("SKIP: ocrmypdf not on PATH");
        return;
    }

    let dir = TempDir::new().unwrap();
    let converter = converter_in(&dir, None).await;
    let src = converter.config().upload_dir.join("blank.pdf");
    write_pdf(&src, &[BLANK_PAGE]);

    // A blank page OCRs to nothing, so either outcome is acceptable here.
    let result = converter.convert(&src).await;
    println!("{}", result.message);
    if !result.is_success() {
        assert!(matches!(
            result.error_kind,
            Some(ErrorKind::Ocr) | Some(ErrorKind::Extraction)
        ));
    }
    let leftovers = std::fs::read_dir(&converter.config().temp_dir)
        .unwrap()
        .count();
    assert_eq!(leftovers, 0);
}
