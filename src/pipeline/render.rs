//! PDF expansion: rasterise every page to a JPEG file via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Callers run [`PdfExpander::expand`] inside `tokio::task::spawn_blocking`
//! (see [`expand_async`]) so Tokio worker threads never stall on rendering.
//!
//! ## Failure granularity
//!
//! A PDF that cannot be opened fails as a whole ([`PageError::PdfDecode`]).
//! A page that fails to render only fails itself: its [`RenderedPage`] carries
//! a [`PageError::Render`] and the remaining pages are still produced.

use crate::error::PageError;
use image::codecs::jpeg::JpegEncoder;
use pdfium_render::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One page produced by a [`PdfExpander`].
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based page number.
    pub page_num: usize,
    /// File name used as the page's provenance label, e.g. `page_3.jpg`.
    pub image_name: String,
    /// Path to the written page image, or why this page could not be rendered.
    pub outcome: Result<PathBuf, PageError>,
}

impl RenderedPage {
    /// Name of the image file for a 1-based page number.
    pub fn image_name_for(page_num: usize) -> String {
        format!("page_{page_num}.jpg")
    }
}

/// Turns a PDF document into ordered page images on disk.
///
/// Implementations are blocking; async callers go through [`expand_async`].
pub trait PdfExpander: Send + Sync {
    /// Rasterise every page of `pdf_path` into `output_dir` (created if
    /// absent), returning one entry per page in page order.
    fn expand(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<RenderedPage>, PageError>;
}

/// Run an expander on the blocking thread pool.
pub async fn expand_async(
    expander: Arc<dyn PdfExpander>,
    pdf_path: PathBuf,
    output_dir: PathBuf,
) -> Result<Vec<RenderedPage>, PageError> {
    tokio::task::spawn_blocking(move || expander.expand(&pdf_path, &output_dir))
        .await
        .map_err(|e| PageError::PdfDecode {
            detail: format!("render task panicked: {e}"),
        })?
}

/// Production expander backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumExpander {
    /// Rasterisation resolution.
    pub dpi: u32,
    /// JPEG quality for the page files.
    pub jpeg_quality: u8,
}

impl Default for PdfiumExpander {
    fn default() -> Self {
        Self {
            dpi: 300,
            jpeg_quality: 75,
        }
    }
}

impl PdfiumExpander {
    pub fn new(dpi: u32, jpeg_quality: u8) -> Self {
        Self { dpi, jpeg_quality }
    }

    /// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the system library.
    fn bind() -> Result<Pdfium, PageError> {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(p) if !p.is_empty() => Pdfium::bind_to_library(&p),
            _ => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PageError::PdfDecode {
            detail: format!("pdfium library unavailable: {e:?}"),
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl PdfExpander for PdfiumExpander {
    fn expand(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<RenderedPage>, PageError> {
        std::fs::create_dir_all(output_dir).map_err(|e| PageError::PdfDecode {
            detail: format!("cannot create {}: {}", output_dir.display(), e),
        })?;

        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PageError::PdfDecode {
                detail: format!("{}: {:?}", pdf_path.display(), e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} ({} pages)", pdf_path.display(), total_pages);

        // Points are 1/72 inch.
        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.dpi as f32 / 72.0);

        let mut results = Vec::with_capacity(total_pages);
        for idx in 0..total_pages {
            let page_num = idx + 1;
            let image_name = RenderedPage::image_name_for(page_num);
            let target = output_dir.join(&image_name);

            let outcome = render_page(&pages, idx, &render_config, &target, self.jpeg_quality)
                .map(|()| target)
                .map_err(|detail| {
                    warn!("Page {} of {} failed to render: {}", page_num, pdf_path.display(), detail);
                    PageError::Render {
                        page: page_num,
                        detail,
                    }
                });

            results.push(RenderedPage {
                page_num,
                image_name,
                outcome,
            });
        }

        Ok(results)
    }
}

/// Render one 0-based page and write it to `target`.
fn render_page(
    pages: &PdfPages<'_>,
    idx: usize,
    render_config: &PdfRenderConfig,
    target: &Path,
    quality: u8,
) -> Result<(), String> {
    let page = pages.get(idx as u16).map_err(|e| format!("{e:?}"))?;
    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| format!("{e:?}"))?;
    let rgb = bitmap.as_image().to_rgb8();
    debug!("Rendered page {} → {}x{} px", idx + 1, rgb.width(), rgb.height());
    write_jpeg(&rgb, target, quality)
}

/// Write an RGB image as a JPEG file.
fn write_jpeg(rgb: &image::RgbImage, path: &Path, quality: u8) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    JpegEncoder::new_with_quality(BufWriter::new(file), quality)
        .encode_image(rgb)
        .map_err(|e| format!("{}: {}", path.display(), e))
}
