//! In-memory backends for exercising the viewer without a real document.
//!
//! [`ScriptedBackend`] renders immediately. [`GatedBackend`] holds every
//! render until the test releases it, which makes completion order fully
//! controllable.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};

use crate::backend::PageBackend;
use crate::document::{Document, Page};
use crate::error::{Result, ViewerError};

const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Solid bitmap whose red channel carries `tag` and green channel the page.
fn tagged_image(page: &Page, width: u32, tag: usize) -> RgbaImage {
    RgbaImage::from_pixel(
        width,
        page.height_for_width(width),
        Rgba([tag as u8, page.index as u8, 0, 255]),
    )
}

/// The tag stored by [`GatedBackend`] (its call number) in a bitmap.
pub fn call_id(image: &RgbaImage) -> usize {
    image.get_pixel(0, 0)[0] as usize
}

pub struct ScriptedBackend {
    document: Document,
    failing: HashSet<usize>,
    panicking: HashSet<usize>,
    unreadable: bool,
    calls: AtomicUsize,
    closed: AtomicBool,
}

impl ScriptedBackend {
    pub fn new(aspect_ratios: &[f32]) -> Self {
        Self {
            document: Document::from_aspect_ratios(aspect_ratios).unwrap_or_default(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            unreadable: false,
            calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn failing_pages(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(pages);
        self
    }

    /// Pages whose render panics inside the backend.
    pub fn panicking_pages(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.panicking.extend(pages);
        self
    }

    /// Make `open` fail as if the file were corrupt.
    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl PageBackend for ScriptedBackend {
    fn open(&self) -> Result<Document> {
        if self.unreadable {
            return Err(ViewerError::document_open("not a PDF file"));
        }
        Ok(self.document.clone())
    }

    fn rasterize(&self, page: &Page, target_width: u32) -> Result<RgbaImage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&page.index) {
            return Err(ViewerError::page_render(page.index, "scripted failure"));
        }
        if self.panicking.contains(&page.index) {
            panic!("scripted panic rendering page {}", page.index);
        }
        Ok(tagged_image(page, target_width, call))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One `rasterize` call seen by a [`GatedBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterCall {
    pub page: usize,
    pub width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Closed,
    Release,
    Fail,
}

#[derive(Default)]
struct GateState {
    calls: Vec<(RasterCall, Gate)>,
    open_all: bool,
}

pub struct GatedBackend {
    document: Document,
    state: Mutex<GateState>,
    changed: Condvar,
    closed: AtomicBool,
}

impl GatedBackend {
    pub fn new(aspect_ratios: &[f32]) -> Self {
        Self {
            document: Document::from_aspect_ratios(aspect_ratios).unwrap_or_default(),
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block until at least `n` renders have started. Panics after a few
    /// seconds so a broken test fails instead of hanging.
    pub fn wait_for_calls(&self, n: usize) -> Vec<RasterCall> {
        let deadline = Instant::now() + GATE_TIMEOUT;
        let mut state = self.lock();
        while state.calls.len() < n {
            let remaining = deadline.saturating_duration_since(Instant::now());
            assert!(!remaining.is_zero(), "timed out waiting for {n} raster calls");
            state = self
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
        state.calls.iter().map(|(call, _)| *call).collect()
    }

    pub fn calls(&self) -> Vec<RasterCall> {
        self.lock().calls.iter().map(|(call, _)| *call).collect()
    }

    /// Let call number `call` finish successfully.
    pub fn release(&self, call: usize) {
        self.set_gate(call, Gate::Release);
    }

    /// Let call number `call` finish with a render error.
    pub fn fail(&self, call: usize) {
        self.set_gate(call, Gate::Fail);
    }

    /// Release every pending call and let all future calls through.
    pub fn release_all(&self) {
        let mut state = self.lock();
        state.open_all = true;
        for (_, gate) in state.calls.iter_mut() {
            if *gate == Gate::Closed {
                *gate = Gate::Release;
            }
        }
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_gate(&self, call: usize, value: Gate) {
        let mut state = self.lock();
        if let Some((_, gate)) = state.calls.get_mut(call) {
            *gate = value;
        }
        self.changed.notify_all();
    }
}

impl PageBackend for GatedBackend {
    fn open(&self) -> Result<Document> {
        Ok(self.document.clone())
    }

    fn rasterize(&self, page: &Page, target_width: u32) -> Result<RgbaImage> {
        let mut state = self.lock();
        let id = state.calls.len();
        let initial = if state.open_all {
            Gate::Release
        } else {
            Gate::Closed
        };
        state.calls.push((
            RasterCall {
                page: page.index,
                width: target_width,
            },
            initial,
        ));
        self.changed.notify_all();

        let deadline = Instant::now() + GATE_TIMEOUT;
        loop {
            match state.calls[id].1 {
                Gate::Release => return Ok(tagged_image(page, target_width, id)),
                Gate::Fail => return Err(ViewerError::page_render(page.index, "gated failure")),
                Gate::Closed => {}
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ViewerError::page_render(page.index, "gate never opened"));
            }
            state = self
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
