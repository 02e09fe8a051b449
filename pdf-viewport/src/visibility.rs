//! Decides which pages are alive.
//!
//! The window extends `margin_above` viewport heights above the scroll
//! offset and `margin_below` viewport heights below it (0.5 and 1.5 by
//! default). Reading mostly scrolls downward, so the lookahead is biased that
//! way while still covering a fast fling back up.

use std::ops::Range;

use crate::layout::LayoutRect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityWindow {
    pub top: f32,
    pub bottom: f32,
}

impl VisibilityWindow {
    pub fn new(translate_y: f32, viewport_height: f32, margin_above: f32, margin_below: f32) -> Self {
        Self {
            top: translate_y - margin_above * viewport_height,
            bottom: translate_y + margin_below * viewport_height,
        }
    }

    pub fn contains(&self, rect: &LayoutRect) -> bool {
        rect.y + rect.height > self.top && rect.y < self.bottom
    }
}

/// Indices of the rectangles intersecting `window`.
///
/// `rects` must come from one layout pass: bottoms and tops are then both
/// non-decreasing, so the visible set is a contiguous range found by two
/// binary searches.
pub fn visible_range(rects: &[LayoutRect], window: &VisibilityWindow) -> Range<usize> {
    let start = rects.partition_point(|rect| rect.y + rect.height <= window.top);
    let end = rects.partition_point(|rect| rect.y < window.bottom);

    start..end.max(start)
}
