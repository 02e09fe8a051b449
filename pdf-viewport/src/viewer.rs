//! The viewer facade the host drives.
//!
//! The host feeds pointer events through [`PdfViewer::handle_pointer`] and
//! calls [`PdfViewer::frame`] once per display frame. A frame advances the
//! transform animations, refreshes the cached layout, decides which pages
//! are alive, keeps their raster slots in sync and reports where each live
//! page lands on screen.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::runtime::Handle;

use crate::backend::PageBackend;
use crate::config::ViewerConfig;
use crate::document::Document;
use crate::error::{Result, ViewerError};
use crate::geometry::{Point, Rect, Size};
use crate::gesture::{Gesture, GestureReconciler, PointerEvent};
use crate::layout::{LayoutParams, PageLayout};
use crate::raster::{target_width, RasterEvent, RasterSlots};
use crate::transform::{Transform, TransformState};
use crate::visibility::{visible_range, VisibilityWindow};

/// Where one live page goes this frame.
#[derive(Debug, Clone, Copy)]
pub struct PagePlacement<'a> {
    pub index: usize,
    /// Rectangle after translation, before zoom.
    pub rect: Rect,
    /// Rectangle on screen, zoom applied about the viewport centre.
    pub screen_rect: Rect,
    /// Generation of the page's raster slot, for host-side texture caches.
    pub generation: u64,
    /// Finished bitmap or placeholder; `None` draws a blank page.
    pub raster: Option<&'a RgbaImage>,
}

#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub transform: Transform,
    pub viewport: Size,
    pub document_height: f32,
    pub visible: Range<usize>,
    pub pages: Vec<PagePlacement<'a>>,
    /// Whether an animation is still running and another frame is needed.
    pub animating: bool,
}

pub struct PdfViewer {
    backend: Arc<dyn PageBackend>,
    config: ViewerConfig,
    document: Option<Document>,
    layout: Option<PageLayout>,
    viewport: Size,
    transform: TransformState,
    gestures: GestureReconciler,
    slots: RasterSlots,
    closed: bool,
}

impl PdfViewer {
    /// Create a viewer rendering through `backend` on `runtime`'s blocking
    /// pool. Nothing is opened yet.
    pub fn new(backend: Arc<dyn PageBackend>, config: ViewerConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            slots: RasterSlots::new(Arc::clone(&backend), runtime),
            transform: TransformState::new(&config),
            gestures: GestureReconciler::new(config.gestures.clone()),
            backend,
            config,
            document: None,
            layout: None,
            viewport: Size::default(),
            closed: false,
        })
    }

    /// Open the document and return its page count. On failure the viewer
    /// keeps no partial document.
    pub fn open(&mut self) -> Result<usize> {
        self.slots.clear();
        self.layout = None;
        self.document = None;
        self.transform = TransformState::new(&self.config);

        let document = self.backend.open().inspect_err(|e| tracing::error!("{e}"))?;
        let page_count = document.page_count();
        tracing::debug!("opened document with {page_count} pages");
        self.closed = false;
        self.document = Some(document);
        self.refresh_layout();

        Ok(page_count)
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, Document::page_count)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn layout(&self) -> Option<&PageLayout> {
        self.layout.as_ref()
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport != self.viewport {
            tracing::debug!("viewport resized to {}x{}", viewport.width, viewport.height);
            self.viewport = viewport;
            self.refresh_layout();
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform.snapshot()
    }

    pub fn is_animating(&self) -> bool {
        self.transform.is_animating()
    }

    /// Feed one pointer event and apply the resulting gesture, if any.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Option<Gesture> {
        let gesture = self.gestures.handle(event)?;

        match gesture {
            Gesture::Drag { delta } => self.transform.drag_by(delta),
            Gesture::Fling { velocity } => self.transform.fling(velocity),
            Gesture::Zoom { ratio, .. } => {
                self.transform.zoom_by(ratio);
                self.refresh_layout();
            }
            Gesture::DoubleTap { .. } => {
                let target = self.transform.toggle_zoom();
                tracing::debug!("double tap, zooming to {target}");
            }
        }

        Some(gesture)
    }

    /// Scroll by a wheel or keyboard delta in document pixels.
    pub fn scroll_by(&mut self, delta: Point) {
        self.transform.scroll_by(delta);
    }

    pub fn zoom_in(&mut self) {
        self.transform.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.transform.zoom_out();
    }

    pub fn reset_zoom(&mut self) {
        self.transform.reset_zoom();
    }

    /// Page under the viewport centre; 0 before a document is laid out.
    pub fn current_page(&self) -> usize {
        let centre = self.transform.translate().y + self.viewport.height / 2.0;
        self.layout
            .as_ref()
            .and_then(|layout| layout.page_at(centre))
            .unwrap_or(0)
    }

    /// Animate so the top of page `index` sits at the top of the viewport.
    pub fn scroll_to_page(&mut self, index: usize) -> Result<()> {
        let document = self.document.as_ref().ok_or(ViewerError::InvalidIndex {
            index,
            page_count: 0,
        })?;
        document.page(index)?;

        let Some(rect) = self.layout.as_ref().and_then(|layout| layout.rect(index)) else {
            return Ok(());
        };
        let zoom = self.transform.zoom();
        let half = self.viewport.height / 2.0;
        let y = rect.y - self.config.content_padding.top - half * (1.0 - 1.0 / zoom);

        tracing::debug!("scrolling to page {index}");
        let x = self.transform.translate().x;
        self.transform.animate_to(Point::new(x, y));
        Ok(())
    }

    pub fn next_page(&mut self) -> Result<()> {
        let next = self.current_page() + 1;
        if next < self.page_count() {
            self.scroll_to_page(next)?;
        }
        Ok(())
    }

    pub fn previous_page(&mut self) -> Result<()> {
        match self.current_page().checked_sub(1) {
            Some(previous) if self.document.is_some() => self.scroll_to_page(previous),
            _ => Ok(()),
        }
    }

    /// Rasterize one page synchronously, bypassing the slots.
    pub fn load_page(&self, index: usize, width: u32) -> Result<RgbaImage> {
        let document = self.document.as_ref().ok_or(ViewerError::InvalidIndex {
            index,
            page_count: 0,
        })?;
        let page = document.page(index)?;
        self.backend.rasterize(page, width)
    }

    /// Advance to `now` and describe what to draw.
    pub fn frame(&mut self, now: Duration) -> Frame<'_> {
        self.transform.tick(now);
        self.refresh_layout();
        if !self.gestures.is_active() {
            self.transform.settle();
        }

        let transform = self.transform.snapshot();
        let animating = self.transform.is_animating();
        let viewport = self.viewport;

        let (Some(document), Some(layout)) = (self.document.as_ref(), self.layout.as_ref()) else {
            return Frame {
                transform,
                viewport,
                document_height: 0.0,
                visible: 0..0,
                pages: Vec::new(),
                animating,
            };
        };

        let window = VisibilityWindow::new(
            transform.translate_y,
            viewport.height,
            self.config.margin_above,
            self.config.margin_below,
        );
        let visible = visible_range(layout.rects(), &window);
        let width = target_width(layout.page_width(), transform.zoom, self.config.oversample);

        self.slots.sync(document.pages(), visible.clone(), width);
        self.slots.poll_completions();

        let slots = &self.slots;
        let pages = layout.rects()[visible.clone()]
            .iter()
            .map(|rect| {
                let slot = slots.get(rect.index);
                PagePlacement {
                    index: rect.index,
                    rect: transform.translate_rect(rect.rect()),
                    screen_rect: transform.to_screen(rect.rect(), viewport),
                    generation: slot.map_or(0, |slot| slot.generation()),
                    raster: slot.and_then(|slot| slot.image()),
                }
            })
            .collect();

        Frame {
            transform,
            viewport,
            document_height: layout.document_height(),
            visible,
            pages,
            animating,
        }
    }

    /// Wait for the next raster completion and apply it. `None` when no
    /// render is in flight.
    pub async fn next_raster(&mut self) -> Option<RasterEvent> {
        self.slots.next_completion().await
    }

    pub fn slots(&self) -> &RasterSlots {
        &self.slots
    }

    /// Release every slot and close the backend. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.slots.clear();
        self.layout = None;
        self.document = None;
        self.backend.close();
        self.closed = true;
        tracing::debug!("viewer closed");
    }

    fn refresh_layout(&mut self) {
        let Some(document) = self.document.as_ref() else {
            return;
        };
        if self.viewport.width <= 0.0 {
            return;
        }

        let params = LayoutParams {
            viewport_width: self.viewport.width,
            padding: self.config.content_padding,
            vertical_spacing: self.config.vertical_spacing,
        };
        if self.layout.as_ref().map(PageLayout::params) != Some(&params) {
            let layout = PageLayout::compute(document.pages(), params);
            tracing::trace!("layout recomputed, height {}", layout.document_height());
            self.layout = Some(layout);
        }

        if let Some(layout) = &self.layout {
            self.transform.update_bounds(self.viewport, layout.document_height());
        }
    }
}

impl Drop for PdfViewer {
    fn drop(&mut self) {
        self.close();
    }
}
