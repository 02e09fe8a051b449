//! Rasterization backends.
//!
//! The viewport never decodes documents itself. It asks a [`PageBackend`]
//! for the page list once, then for individual page bitmaps at the width the
//! page currently needs. Backends must tolerate concurrent `rasterize` calls
//! for different pages: each call works on its own document handle.

mod image_sequence;
#[cfg(feature = "pdfium")]
mod pdfium;

pub use image_sequence::ImageSequenceBackend;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumBackend;

use image::RgbaImage;

use crate::document::{Document, Page};
use crate::error::Result;

pub trait PageBackend: Send + Sync {
    /// Enumerate pages and their aspect ratios.
    ///
    /// Fails with [`ViewerError::DocumentOpen`](crate::ViewerError::DocumentOpen)
    /// when the source is unreadable or not a valid document.
    fn open(&self) -> Result<Document>;

    /// Render `page` into an RGBA buffer `target_width` pixels wide and
    /// `page.height_for_width(target_width)` pixels tall.
    fn rasterize(&self, page: &Page, target_width: u32) -> Result<RgbaImage>;

    /// Release backend resources. Calling it more than once is harmless.
    fn close(&self);
}
