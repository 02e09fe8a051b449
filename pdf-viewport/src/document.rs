//! The immutable page list produced when a document is opened.

use crate::error::{Result, ViewerError};

/// One page of an opened document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub index: usize,
    /// Height divided by width of the page's native size.
    pub aspect_ratio: f32,
}

impl Page {
    pub fn new(index: usize, aspect_ratio: f32) -> Result<Self> {
        if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
            return Err(ViewerError::DocumentOpen {
                reason: format!("page {index} has invalid aspect ratio {aspect_ratio}"),
            });
        }

        Ok(Self {
            index,
            aspect_ratio,
        })
    }

    /// Build a page from its native width and height.
    pub fn from_size(index: usize, width: f32, height: f32) -> Result<Self> {
        if !(width > 0.0) {
            return Err(ViewerError::DocumentOpen {
                reason: format!("page {index} has zero width"),
            });
        }
        Self::new(index, height / width)
    }

    /// Pixel height of this page when drawn `width` pixels wide.
    pub fn height_for_width(&self, width: u32) -> u32 {
        ((width as f32 * self.aspect_ratio).round() as u32).max(1)
    }
}

/// Ordered pages of an opened document. Never mutated after open.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    /// Wrap a page list. Page indices must match their positions.
    pub fn new(pages: Vec<Page>) -> Result<Self> {
        if let Some((position, page)) = pages
            .iter()
            .enumerate()
            .find(|(position, page)| page.index != *position)
        {
            return Err(ViewerError::DocumentOpen {
                reason: format!("page at position {position} reports index {}", page.index),
            });
        }

        Ok(Self { pages })
    }

    /// Build a document from a list of aspect ratios.
    pub fn from_aspect_ratios(ratios: &[f32]) -> Result<Self> {
        let pages = ratios
            .iter()
            .enumerate()
            .map(|(index, ratio)| Page::new(index, *ratio))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Result<&Page> {
        self.pages.get(index).ok_or(ViewerError::InvalidIndex {
            index,
            page_count: self.pages.len(),
        })
    }
}
