use anyhow::{ensure, Context};
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use super::PageBackend;
use crate::document::{Document, Page};
use crate::error::{Result, ViewerError};

const PAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Where the page images come from.
#[derive(Debug)]
enum Source {
    /// Every PNG/JPEG in a directory, ordered by file name.
    Directory(PathBuf),
    /// An explicit page list.
    Files(Vec<PathBuf>),
}

/// Backend for documents stored as one image per page, e.g. scanned books.
///
/// `open` only reads image headers; pixels are decoded per `rasterize` call
/// and resized to the requested width.
#[derive(Debug)]
pub struct ImageSequenceBackend {
    source: Source,
    files: OnceLock<Vec<PathBuf>>,
    closed: AtomicBool,
}

impl ImageSequenceBackend {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::with_source(Source::Directory(dir.into()))
    }

    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self::with_source(Source::Files(files))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            files: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn list_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        match &self.source {
            Source::Files(files) => Ok(files.clone()),
            Source::Directory(dir) => {
                let mut files = Vec::new();
                for entry in std::fs::read_dir(dir)
                    .with_context(|| format!("Failed to read directory {}", dir.display()))?
                {
                    let path = entry?.path();
                    if path.is_file() && has_page_extension(&path) {
                        files.push(path);
                    }
                }
                files.sort();
                ensure!(!files.is_empty(), "no page images in {}", dir.display());
                Ok(files)
            }
        }
    }

    fn render(&self, page: &Page, target_width: u32) -> anyhow::Result<RgbaImage> {
        ensure!(!self.closed.load(Ordering::Acquire), "backend is closed");
        let path = self
            .files
            .get()
            .and_then(|files| files.get(page.index))
            .context("Page index out of bounds")?;

        let decoded =
            image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
        let target_height = page.height_for_width(target_width);

        Ok(decoded
            .resize_exact(target_width, target_height, FilterType::Triangle)
            .into_rgba8())
    }
}

fn has_page_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            PAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

impl PageBackend for ImageSequenceBackend {
    fn open(&self) -> Result<Document> {
        let files = match self.files.get() {
            Some(files) => files,
            None => {
                let files = self.list_files().map_err(ViewerError::document_open)?;
                self.files.get_or_init(|| files)
            }
        };

        let pages = files
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let (width, height) = image::image_dimensions(path)
                    .with_context(|| format!("Failed to read {}", path.display()))
                    .map_err(ViewerError::document_open)?;
                Page::from_size(index, width as f32, height as f32)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("opened image sequence with {} pages", pages.len());
        Document::new(pages)
    }

    fn rasterize(&self, page: &Page, target_width: u32) -> Result<RgbaImage> {
        self.render(page, target_width)
            .map_err(|e| ViewerError::page_render(page.index, e))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
