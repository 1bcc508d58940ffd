//! Pipeline stages for handwriting extraction.
//!
//! Each submodule implements one step; [`crate::batch`] strings them
//! together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ normalize ──▶ extract
//! (classify) (pdfium)   (RGB JPEG)    (VLM)
//! ```
//!
//! 1. [`input`]     classify caller files by extension; resolve CLI paths
//!    and URLs
//! 2. [`render`]    expand a PDF into `page_N.jpg` files; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`normalize`] decode any raster image and re-encode it as RGB JPEG
//! 4. [`extract`]   one vision-model call per image, with failure
//!    classification; the only stage with network I/O

pub mod extract;
pub mod input;
pub mod normalize;
pub mod render;
