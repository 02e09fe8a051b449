//! Pan/zoom transform of the page column.
//!
//! The horizontal and vertical translation and the zoom factor are three
//! independent [`AnimatedAxis`] values, so a fling on one axis keeps running
//! while the other is dragged or zoomed. Content is drawn at
//! `(doc - translate)` and then scaled by `zoom` about the viewport centre.

use std::time::Duration;

use crate::animation::AnimatedAxis;
use crate::config::ViewerConfig;
use crate::geometry::{Point, Rect, Size};

/// Immutable snapshot of the transform for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translate_x: f32,
    pub translate_y: f32,
    pub zoom: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translate_x: 0.0,
        translate_y: 0.0,
        zoom: 1.0,
    };

    /// Map a document-space rectangle into the viewport before zooming.
    pub fn translate_rect(&self, rect: Rect) -> Rect {
        rect.translate(-self.translate_x, -self.translate_y)
    }

    /// Map a document-space rectangle to where it lands on screen.
    pub fn to_screen(&self, rect: Rect, viewport: Size) -> Rect {
        self.translate_rect(rect)
            .scale_about(viewport.center(), self.zoom)
    }
}

/// Clamping ranges for the two translate axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslateBounds {
    pub x: (f32, f32),
    pub y: (f32, f32),
}

impl TranslateBounds {
    /// Bounds for the given viewport, laid-out document height and zoom.
    ///
    /// Horizontally the slack grows symmetrically with zoom and is zero at
    /// 1.0. Vertically the range runs from the top of the document to its
    /// bottom, widened by the area the zoom hides around the centre. A
    /// document shorter than the viewport collapses the range to its top.
    pub fn compute(viewport: Size, document_height: f32, zoom: f32) -> Self {
        let shift_x = viewport.width / 4.0 * (1.0 - zoom);
        let shift_y = viewport.height * (1.0 / zoom - 1.0) / 2.0;
        let bottom = document_height - viewport.height - shift_y;

        Self {
            x: (shift_x, -shift_x),
            y: (shift_y, bottom.max(shift_y)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformState {
    x: AnimatedAxis,
    y: AnimatedAxis,
    zoom: AnimatedAxis,
    min_zoom: f32,
    max_zoom: f32,
}

impl TransformState {
    const ZOOM_STEP: f32 = 0.25;

    pub fn new(config: &ViewerConfig) -> Self {
        let animation = config.animation;
        Self {
            x: AnimatedAxis::new(0.0, 0.0, 0.0, animation),
            y: AnimatedAxis::new(0.0, 0.0, 0.0, animation),
            zoom: AnimatedAxis::new(config.min_zoom, config.min_zoom, config.max_zoom, animation),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    pub fn snapshot(&self) -> Transform {
        Transform {
            translate_x: self.x.value(),
            translate_y: self.y.value(),
            zoom: self.zoom.value(),
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom.value()
    }

    pub fn translate(&self) -> Point {
        Point::new(self.x.value(), self.y.value())
    }

    pub fn bounds(&self) -> TranslateBounds {
        TranslateBounds {
            x: self.x.bounds(),
            y: self.y.bounds(),
        }
    }

    /// Recompute translate bounds for the current zoom. Stored values are
    /// left alone; the next snap or animation pulls them back in range.
    pub fn update_bounds(&mut self, viewport: Size, document_height: f32) {
        let bounds = TranslateBounds::compute(viewport, document_height, self.zoom.value());
        self.x.update_bounds(bounds.x.0, bounds.x.1);
        self.y.update_bounds(bounds.y.0, bounds.y.1);
    }

    /// Move the content with a pointer so it stays under the finger: the
    /// screen-pixel delta is divided by the zoom and applied opposite to the
    /// pointer. Cancels any animation on both axes.
    pub fn drag_by(&mut self, delta: Point) {
        let scale = self.zoom.value();
        self.scroll_by(Point::new(-delta.x / scale, -delta.y / scale));
    }

    /// Move the viewport over the document by `delta`.
    pub fn scroll_by(&mut self, delta: Point) {
        self.x.snap_to(self.x.value() + delta.x);
        self.y.snap_to(self.y.value() + delta.y);
    }

    pub fn snap_to(&mut self, translate: Point) {
        self.x.snap_to(translate.x);
        self.y.snap_to(translate.y);
    }

    pub fn animate_to(&mut self, translate: Point) {
        self.x.animate_to(translate.x);
        self.y.animate_to(translate.y);
    }

    /// Continue a drag that was released with `velocity` (screen px/s).
    pub fn fling(&mut self, velocity: Point) {
        let scale = self.zoom.value();
        self.x.animate_decay(-velocity.x / scale);
        self.y.animate_decay(-velocity.y / scale);
    }

    /// Multiply the zoom by `ratio`, clamped to the zoom range.
    pub fn zoom_by(&mut self, ratio: f32) {
        if !(ratio.is_finite() && ratio > 0.0) {
            return;
        }
        self.zoom.snap_to(self.zoom.value() * ratio);
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom.snap_to(zoom);
    }

    pub fn animate_zoom_to(&mut self, zoom: f32) {
        self.zoom.animate_to(zoom);
    }

    /// Double-tap behaviour: zoomed in goes back to the minimum, otherwise
    /// zoom to the maximum. Returns the target.
    pub fn toggle_zoom(&mut self) -> f32 {
        let target = if self.zoom.value() > self.min_zoom {
            self.min_zoom
        } else {
            self.max_zoom
        };
        self.zoom.animate_to(target);
        target
    }

    pub fn zoom_in(&mut self) {
        let current = self.zoom.target().unwrap_or(self.zoom.value());
        self.zoom.animate_to((current + Self::ZOOM_STEP).min(self.max_zoom));
    }

    pub fn zoom_out(&mut self) {
        let current = self.zoom.target().unwrap_or(self.zoom.value());
        self.zoom.animate_to((current - Self::ZOOM_STEP).max(self.min_zoom));
    }

    pub fn reset_zoom(&mut self) {
        self.zoom.animate_to(self.min_zoom);
        self.x.animate_to(0.0);
    }

    /// Start pulling idle, out-of-range translate axes back into bounds.
    pub fn settle(&mut self) {
        for axis in [&mut self.x, &mut self.y] {
            if !axis.is_animating() && axis.is_out_of_bounds() {
                let target = axis.clamp(axis.value());
                axis.animate_to(target);
            }
        }
    }

    /// Advance all running animations. Returns whether any is still running.
    pub fn tick(&mut self, now: Duration) -> bool {
        let x = self.x.tick(now);
        let y = self.y.tick(now);
        let zoom = self.zoom.tick(now);
        x || y || zoom
    }

    pub fn is_animating(&self) -> bool {
        self.x.is_animating() || self.y.is_animating() || self.zoom.is_animating()
    }
}
