//! Page layout engine.
//!
//! Pages are stacked vertically in document space. Every page spans the
//! viewport width minus horizontal padding, and its height follows from the
//! aspect ratio. Nothing here touches pixels, so laying out a document is a
//! cheap linear pass over the page list.

use crate::config::Padding;
use crate::document::Page;
use crate::geometry::Rect;

/// A page's rectangle in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutRect {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutRect {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Inputs of a layout pass other than the pages themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub viewport_width: f32,
    pub padding: Padding,
    pub vertical_spacing: f32,
}

impl LayoutParams {
    /// Width every page is laid out at.
    pub fn page_width(&self) -> f32 {
        (self.viewport_width - self.padding.horizontal()).max(0.0)
    }
}

/// Lazily yields one [`LayoutRect`] per page, in index order.
///
/// After the iterator is exhausted, [`LayoutIter::document_height`] is the
/// total height without walking the pages a second time.
pub struct LayoutIter<'a> {
    pages: std::slice::Iter<'a, Page>,
    params: LayoutParams,
    cursor_y: f32,
    emitted: usize,
}

impl<'a> LayoutIter<'a> {
    pub fn new(pages: &'a [Page], params: LayoutParams) -> Self {
        Self {
            pages: pages.iter(),
            params,
            cursor_y: params.padding.top,
            emitted: 0,
        }
    }

    /// Height of everything laid out so far, including bottom padding.
    pub fn document_height(&self) -> f32 {
        if self.emitted == 0 {
            return self.params.padding.top + self.params.padding.bottom;
        }
        self.cursor_y - self.params.vertical_spacing + self.params.padding.bottom
    }
}

impl Iterator for LayoutIter<'_> {
    type Item = LayoutRect;

    fn next(&mut self) -> Option<LayoutRect> {
        let page = self.pages.next()?;
        let width = self.params.page_width();
        let height = width * page.aspect_ratio;

        let rect = LayoutRect {
            index: page.index,
            x: self.params.padding.left,
            y: self.cursor_y,
            width,
            height,
        };

        self.cursor_y += height + self.params.vertical_spacing;
        self.emitted += 1;
        Some(rect)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pages.size_hint()
    }
}

/// Lay out `pages` lazily.
pub fn layout_pages(pages: &[Page], params: LayoutParams) -> LayoutIter<'_> {
    LayoutIter::new(pages, params)
}

/// A fully materialized layout, cached by the viewer until the parameters
/// change.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    params: LayoutParams,
    rects: Vec<LayoutRect>,
    document_height: f32,
}

impl PageLayout {
    pub fn compute(pages: &[Page], params: LayoutParams) -> Self {
        let mut iter = layout_pages(pages, params);
        let rects: Vec<LayoutRect> = iter.by_ref().collect();

        Self {
            params,
            rects,
            document_height: iter.document_height(),
        }
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn rects(&self) -> &[LayoutRect] {
        &self.rects
    }

    pub fn rect(&self, index: usize) -> Option<&LayoutRect> {
        self.rects.get(index)
    }

    pub fn document_height(&self) -> f32 {
        self.document_height
    }

    pub fn page_width(&self) -> f32 {
        self.params.page_width()
    }

    /// Index of the page at document-space `y`.
    ///
    /// Points in the gap after a page (or in the bottom padding) resolve to
    /// that page; points above the first page resolve to page 0.
    pub fn page_at(&self, y: f32) -> Option<usize> {
        if self.rects.is_empty() {
            return None;
        }
        let after = self.rects.partition_point(|rect| rect.y <= y);
        Some(after.saturating_sub(1))
    }
}
