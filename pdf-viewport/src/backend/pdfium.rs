use anyhow::{ensure, Context};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::PageBackend;
use crate::document::{Document, Page};
use crate::error::{Result, ViewerError};

/// PDF backend using pdfium-render.
///
/// The PDFium library binding is shared, but every `open`/`rasterize` call
/// loads its own document handle, so page renders never share a session.
pub struct PdfiumBackend {
    pdfium: Pdfium,
    path: PathBuf,
    closed: AtomicBool,
}

impl PdfiumBackend {
    /// Bind PDFium (next to the executable, the working directory, then the
    /// system library) for the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self {
            pdfium: bind_pdfium()?,
            path: path.into(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<PdfDocument<'_>> {
        ensure!(!self.closed.load(Ordering::Acquire), "backend is closed");
        self.pdfium
            .load_pdf_from_file(&self.path, None)
            .with_context(|| format!("Failed to load PDF document {}", self.path.display()))
    }

    fn render(&self, page: &Page, target_width: u32) -> anyhow::Result<RgbaImage> {
        let document = self.load()?;
        let pdf_page = document
            .pages()
            .get(pdfium_page_index(page.index)?)
            .context("Page index out of bounds")?;

        let target_height = page.height_for_width(target_width);
        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width as i32)
            .set_maximum_height(target_height as i32)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = pdf_page
            .render_with_config(&render_config)
            .context("Failed to render page")?;

        let img = RgbaImage::from_raw(
            bitmap.width() as u32,
            bitmap.height() as u32,
            bitmap.as_rgba_bytes(),
        )
        .context("Failed to create image from bitmap")?;

        // PDFium may round the height differently; the slot contract is exact.
        if img.width() == target_width && img.height() == target_height {
            Ok(img)
        } else {
            Ok(image::imageops::resize(
                &img,
                target_width,
                target_height,
                image::imageops::FilterType::Triangle,
            ))
        }
    }
}

/// PDFium addresses pages with a `u16`.
fn pdfium_page_index(index: usize) -> anyhow::Result<u16> {
    u16::try_from(index)
        .with_context(|| format!("Page {index} is beyond PDFium's page index range"))
}

fn bind_pdfium() -> anyhow::Result<Pdfium> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    if let Some(dir) = exe_dir {
        if let Ok(bindings) =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        {
            return Ok(Pdfium::new(bindings));
        }
    }

    Ok(Pdfium::new(
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .context("Failed to bind to PDFium library. Please install PDFium or download the library from https://github.com/bblanchon/pdfium-binaries")?,
    ))
}

impl PageBackend for PdfiumBackend {
    fn open(&self) -> Result<Document> {
        let document = self.load().map_err(ViewerError::document_open)?;

        let mut pages = Vec::with_capacity(document.pages().len() as usize);
        for (index, page) in document.pages().iter().enumerate() {
            pages.push(Page::from_size(index, page.width().value, page.height().value)?);
        }

        tracing::debug!("opened {} ({} pages)", self.path.display(), pages.len());
        Document::new(pages)
    }

    fn rasterize(&self, page: &Page, target_width: u32) -> Result<RgbaImage> {
        self.render(page, target_width)
            .map_err(|e| ViewerError::page_render(page.index, e))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("closed {}", self.path.display());
        }
    }
}
