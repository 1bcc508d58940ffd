//! End-to-end tests against a real vision provider and real pdfium.
//!
//! Inputs are generated on the fly (a PNG via `image`, a PDF via pdfium), so
//! no sample files are needed. These make live API calls and are gated behind
//! the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture

use handwriting_ocr::{
    BatchConfig, BatchProcessor, ChainedCredentials, EnvKey, InputFile, KeyFile, NoopProgressCallback,
};
use image::{ImageFormat, Rgb, RgbImage};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn live_processor(report: PathBuf) -> BatchProcessor {
    let config = BatchConfig::builder()
        .report_path(report)
        .progress_callback(Arc::new(NoopProgressCallback))
        .build()
        .unwrap();
    let credentials = ChainedCredentials::new()
        .with(EnvKey::new("GEMINI_API_KEY"))
        .with(KeyFile::default());
    BatchProcessor::from_credentials(config, &credentials)
}

/// A white page with a few dark pen-like strokes.
fn stroke_png() -> Vec<u8> {
    let mut img = RgbImage::from_pixel(400, 200, Rgb([255, 255, 255]));
    for x in 40..360 {
        for row in [60u32, 100, 140] {
            let y = row + ((x / 7) % 5);
            img.put_pixel(x, y, Rgb([20, 20, 30]));
            img.put_pixel(x, y + 1, Rgb([20, 20, 30]));
        }
    }
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn bind_pdfium() -> Pdfium {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => Pdfium::bind_to_library(&p),
        _ => Pdfium::bind_to_system_library(),
    }
    .unwrap();
    Pdfium::new(bindings)
}

fn write_blank_pdf(path: &Path, pages: usize) {
    let pdfium = bind_pdfium();
    let mut document = pdfium.create_new_pdf().unwrap();
    for _ in 0..pages {
        document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
    }
    document.save_to_file(path).unwrap();
}

#[tokio::test]
async fn test_extract_generated_scan() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let processor = live_processor(dir.path().join("report.txt"));
    assert!(processor.is_configured(), "GEMINI_API_KEY must be set");

    let out = processor
        .process(&[InputFile::from_bytes("note.png", stroke_png())])
        .await
        .unwrap();

    assert_eq!(out.report.labels(), vec!["File note.png"]);
    assert!(out.report.entries[0].result.is_success(), "{}", out.text);
    println!("{}", out.text);
}

#[tokio::test]
async fn test_extract_generated_pdf() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("pages.pdf");
    write_blank_pdf(&pdf, 2);
    let processor = live_processor(dir.path().join("report.txt"));
    assert!(processor.is_configured(), "GEMINI_API_KEY must be set");

    let out = processor.process(&[InputFile::from_path(&pdf)]).await.unwrap();

    assert_eq!(out.report.labels(), vec!["Page page_1.jpg", "Page page_2.jpg"]);
    println!(
        "{} pages, {} extracted in {}ms",
        out.report.len(),
        out.report.stats.succeeded,
        out.report.stats.total_duration_ms
    );
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<BatchProcessor>();
}
