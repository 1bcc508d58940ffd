//! Image normalisation: any decodable image → opaque RGB JPEG bytes.
//!
//! Vision APIs accept JPEG universally, but JPEG has no alpha channel. A
//! transparent PNG scan fed straight to a JPEG encoder either fails or turns
//! transparent regions black, hiding dark ink. Transparent pixels are
//! therefore composited onto white first, the way the page would look on
//! paper.

use crate::error::PageError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// Media type of every normalised image.
pub const NORMALIZED_MEDIA_TYPE: &str = "image/jpeg";

/// A canonical image ready for transmission.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,
    /// Always [`NORMALIZED_MEDIA_TYPE`].
    pub media_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Decode `bytes` (format guessed from content) and normalise them.
pub fn normalize_bytes(bytes: &[u8], quality: u8) -> Result<NormalizedImage, PageError> {
    let img = image::load_from_memory(bytes).map_err(|e| PageError::Decode {
        detail: e.to_string(),
    })?;
    normalize_image(&img, quality)
}

/// Flatten transparency onto white, drop alpha, and JPEG-encode.
pub fn normalize_image(img: &DynamicImage, quality: u8) -> Result<NormalizedImage, PageError> {
    let rgb = flatten_to_rgb(img);
    let (width, height) = rgb.dimensions();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| PageError::Decode {
            detail: format!("JPEG encoding failed: {e}"),
        })?;

    debug!("Normalised {}x{} image → {} bytes JPEG", width, height, buf.len());

    Ok(NormalizedImage {
        bytes: buf,
        media_type: NORMALIZED_MEDIA_TYPE,
        width,
        height,
    })
}

/// Convert to RGB8, compositing over an opaque white background when the
/// source colour type carries alpha.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        out.put_pixel(x, y, Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]));
    }
    out
}

/// Source-over blend of one channel onto white (255).
fn over_white(c: u8, a: u8) -> u8 {
    let c = c as u32;
    let a = a as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
