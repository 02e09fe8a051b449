//! Raster slot manager.
//!
//! Only pages inside the visibility range own a slot, and only a slot owns
//! pixels. A slot is keyed by page index and carries a generation number:
//! every request gets a fresh generation, and a finished render is applied
//! only while its slot still carries the generation it was started for.
//! Renders for pages that scrolled away, or that were superseded by a
//! request at another width, are dropped when they come back.
//!
//! Renders run on the tokio blocking pool and report back over an unbounded
//! channel. The owner drains it each frame with
//! [`RasterSlots::poll_completions`] or awaits it with
//! [`RasterSlots::next_completion`].

use std::collections::HashMap;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::backend::PageBackend;
use crate::document::Page;
use crate::error::{Result, ViewerError};

/// Cooperative cancellation flag shared between a slot and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub enum SlotState {
    /// A render is in flight. A re-request at a new width keeps the previous
    /// bitmap so the page does not flash blank while zooming.
    Pending { placeholder: Option<RgbaImage> },
    Ready(RgbaImage),
    /// Stays blank until the page leaves and re-enters visibility.
    Failed(ViewerError),
}

#[derive(Debug)]
pub struct RasterSlot {
    generation: u64,
    requested_width: u32,
    state: SlotState,
    token: CancellationToken,
}

impl RasterSlot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn requested_width(&self) -> u32 {
        self.requested_width
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    /// The bitmap to draw, if any: the finished render or the placeholder.
    pub fn image(&self) -> Option<&RgbaImage> {
        match &self.state {
            SlotState::Ready(image) => Some(image),
            SlotState::Pending { placeholder } => placeholder.as_ref(),
            SlotState::Failed(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SlotState::Ready(_))
    }

    fn into_image(self) -> Option<RgbaImage> {
        match self.state {
            SlotState::Ready(image) => Some(image),
            SlotState::Pending { placeholder } => placeholder,
            SlotState::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The bitmap is now the slot's content.
    Applied,
    /// The render failed and the slot is marked failed.
    Failed,
    /// The result belonged to a released or superseded request.
    Discarded,
}

/// A worker result after it has been matched against the slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterEvent {
    pub index: usize,
    pub generation: u64,
    pub outcome: CompletionOutcome,
}

/// What a [`RasterSlots::sync`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub requested: usize,
    pub released: usize,
}

struct Completion {
    index: usize,
    generation: u64,
    /// `None` when the worker saw its token cancelled and skipped the render.
    result: Option<Result<RgbaImage>>,
}

pub struct RasterSlots {
    backend: Arc<dyn PageBackend>,
    runtime: Handle,
    slots: HashMap<usize, RasterSlot>,
    next_generation: u64,
    in_flight: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl RasterSlots {
    pub fn new(backend: Arc<dyn PageBackend>, runtime: Handle) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            runtime,
            slots: HashMap::new(),
            next_generation: 1,
            in_flight: 0,
            completions_tx,
            completions_rx,
        }
    }

    /// Reconcile the slots with the visible range.
    ///
    /// Slots outside `visible` are released. Visible pages without a slot,
    /// or whose slot was requested at another width, get a new request. A
    /// `target_width` of zero releases nothing new and requests nothing.
    pub fn sync(&mut self, pages: &[Page], visible: Range<usize>, target_width: u32) -> SyncReport {
        let visible = visible.start.min(pages.len())..visible.end.min(pages.len());
        let mut report = SyncReport::default();

        self.slots.retain(|index, slot| {
            let keep = visible.contains(index);
            if !keep {
                slot.token.cancel();
                report.released += 1;
            }
            keep
        });

        if target_width == 0 {
            return report;
        }

        for page in &pages[visible] {
            let stale = self
                .slots
                .get(&page.index)
                .map_or(true, |slot| slot.requested_width != target_width);
            if stale {
                self.request(*page, target_width);
                report.requested += 1;
            }
        }

        if report != SyncReport::default() {
            tracing::trace!(
                "raster sync: {} requested, {} released, {} live",
                report.requested,
                report.released,
                self.slots.len()
            );
        }
        report
    }

    /// Start rendering `page` at `width`, superseding any earlier request for
    /// the same page. Returns the new generation.
    pub fn request(&mut self, page: Page, width: u32) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;

        let placeholder = self.slots.remove(&page.index).and_then(|previous| {
            previous.token.cancel();
            previous.into_image()
        });

        let token = CancellationToken::new();
        self.slots.insert(
            page.index,
            RasterSlot {
                generation,
                requested_width: width,
                state: SlotState::Pending { placeholder },
                token: token.clone(),
            },
        );

        let backend = Arc::clone(&self.backend);
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        self.runtime.spawn_blocking(move || {
            let result = if token.is_cancelled() {
                None
            } else {
                // A panicking backend still has to report, or the slot
                // would count as in flight forever.
                let render =
                    panic::catch_unwind(AssertUnwindSafe(|| backend.rasterize(&page, width)));
                Some(render.unwrap_or_else(|_| {
                    Err(ViewerError::page_render(page.index, "backend panicked"))
                }))
            };
            // The receiver is gone once the slots are dropped.
            let _ = tx.send(Completion {
                index: page.index,
                generation,
                result,
            });
        });

        generation
    }

    /// Apply every completion that has already arrived.
    pub fn poll_completions(&mut self) -> Vec<RasterEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            events.push(self.apply(completion));
        }
        events
    }

    /// Wait for the next completion and apply it. `None` when nothing is in
    /// flight.
    pub async fn next_completion(&mut self) -> Option<RasterEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    fn apply(&mut self, completion: Completion) -> RasterEvent {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion {
            index,
            generation,
            result,
        } = completion;

        let outcome = match (self.slots.get_mut(&index), result) {
            (Some(slot), Some(result)) if slot.generation == generation => match result {
                Ok(image) => {
                    tracing::trace!("page {index} rasterized ({}x{})", image.width(), image.height());
                    slot.state = SlotState::Ready(image);
                    CompletionOutcome::Applied
                }
                Err(err) => {
                    tracing::warn!("{err}");
                    slot.state = SlotState::Failed(err);
                    CompletionOutcome::Failed
                }
            },
            _ => {
                tracing::trace!("discarding stale raster for page {index} (generation {generation})");
                CompletionOutcome::Discarded
            }
        };

        RasterEvent {
            index,
            generation,
            outcome,
        }
    }

    /// Drop the slot for `index`, cancelling its request. Returns whether a
    /// slot existed.
    pub fn release(&mut self, index: usize) -> bool {
        match self.slots.remove(&index) {
            Some(slot) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.token.cancel();
        }
    }

    pub fn get(&self, index: usize) -> Option<&RasterSlot> {
        self.slots.get(&index)
    }

    pub fn image(&self, index: usize) -> Option<&RgbaImage> {
        self.slots.get(&index).and_then(RasterSlot::image)
    }

    /// Indices that currently own a slot, ascending.
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.slots.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Requests whose completion has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl Drop for RasterSlots {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Pixel width to rasterize a page at.
///
/// The zoom is rounded up to the next half step and never taken below
/// `oversample`, so small zoom changes reuse the existing bitmap.
pub fn target_width(page_width: f32, zoom: f32, oversample: f32) -> u32 {
    if !(page_width.is_finite() && page_width > 0.0) {
        return 0;
    }
    let scale = oversample.max((zoom * 2.0).ceil() / 2.0);
    (page_width * scale).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::testing::{call_id, GatedBackend, ScriptedBackend};
    use tokio::runtime::Runtime;

    fn pages(n: usize) -> Document {
        Document::from_aspect_ratios(&vec![1.0; n]).unwrap()
    }

    #[test]
    fn target_width_quantizes_zoom() {
        assert_eq!(target_width(1000.0, 1.0, 1.5), 1500);
        assert_eq!(target_width(1000.0, 1.4, 1.5), 1500);
        assert_eq!(target_width(1000.0, 1.6, 1.5), 2000);
        assert_eq!(target_width(1000.0, 2.0, 1.0), 2000);
        assert_eq!(target_width(0.0, 1.0, 1.5), 0);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let worker = token.clone();
        token.cancel();
        token.cancel();
        assert!(worker.is_cancelled());
    }

    #[test]
    fn sync_requests_visible_and_releases_the_rest() {
        let runtime = Runtime::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(&[1.0; 6]));
        let document = pages(6);
        let mut slots = RasterSlots::new(backend.clone(), runtime.handle().clone());

        let report = slots.sync(document.pages(), 1..4, 100);
        assert_eq!(report, SyncReport { requested: 3, released: 0 });
        assert_eq!(slots.indices(), vec![1, 2, 3]);

        // Same range and width: nothing to do.
        assert_eq!(slots.sync(document.pages(), 1..4, 100), SyncReport::default());

        let report = slots.sync(document.pages(), 3..6, 100);
        assert_eq!(report, SyncReport { requested: 2, released: 2 });
        assert_eq!(slots.indices(), vec![3, 4, 5]);

        while runtime.block_on(slots.next_completion()).is_some() {}
        assert!(slots.indices().iter().all(|i| slots.get(*i).unwrap().is_ready()));
    }

    #[test]
    fn width_change_keeps_old_bitmap_as_placeholder() {
        let runtime = Runtime::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(&[1.0]));
        let document = pages(1);
        let mut slots = RasterSlots::new(backend, runtime.handle().clone());

        slots.sync(document.pages(), 0..1, 100);
        while runtime.block_on(slots.next_completion()).is_some() {}
        assert_eq!(slots.image(0).unwrap().width(), 100);

        slots.sync(document.pages(), 0..1, 200);
        let slot = slots.get(0).unwrap();
        assert!(matches!(slot.state(), SlotState::Pending { .. }));
        assert_eq!(slot.image().unwrap().width(), 100);

        while runtime.block_on(slots.next_completion()).is_some() {}
        assert_eq!(slots.image(0).unwrap().width(), 200);
    }

    #[test]
    fn released_slot_discards_late_result() {
        let runtime = Runtime::new().unwrap();
        let backend = Arc::new(GatedBackend::new(&[1.0, 1.0]));
        let document = pages(2);
        let mut slots = RasterSlots::new(backend.clone(), runtime.handle().clone());

        slots.sync(document.pages(), 0..1, 100);
        backend.wait_for_calls(1);
        slots.sync(document.pages(), 1..2, 100);
        backend.wait_for_calls(2);

        backend.release(0);
        let event = runtime.block_on(slots.next_completion()).unwrap();
        assert_eq!(event.index, 0);
        assert_eq!(event.outcome, CompletionOutcome::Discarded);
        assert!(slots.get(0).is_none());

        backend.release(1);
        let event = runtime.block_on(slots.next_completion()).unwrap();
        assert_eq!(event.outcome, CompletionOutcome::Applied);
        assert_eq!(call_id(slots.image(1).unwrap()), 1);
    }

    #[test]
    fn failure_marks_only_that_slot() {
        let runtime = Runtime::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(&[1.0, 1.0, 1.0]).failing_pages([1]));
        let document = pages(3);
        let mut slots = RasterSlots::new(backend, runtime.handle().clone());

        slots.sync(document.pages(), 0..3, 50);
        let mut failed = Vec::new();
        while let Some(event) = runtime.block_on(slots.next_completion()) {
            if event.outcome == CompletionOutcome::Failed {
                failed.push(event.index);
            }
        }

        assert_eq!(failed, vec![1]);
        assert!(matches!(
            slots.get(1).unwrap().state(),
            SlotState::Failed(ViewerError::PageRender { index: 1, .. })
        ));
        assert!(slots.get(0).unwrap().is_ready());
        assert!(slots.get(2).unwrap().is_ready());

        // A failed page is not retried while it stays visible.
        assert_eq!(slots.sync(document.pages(), 0..3, 50).requested, 0);
    }

    #[test]
    fn panicking_backend_reports_a_page_failure() {
        let runtime = Runtime::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(&[1.0, 1.0]).panicking_pages([0]));
        let document = pages(2);
        let mut slots = RasterSlots::new(backend, runtime.handle().clone());

        slots.sync(document.pages(), 0..2, 50);
        let mut outcomes = Vec::new();
        while let Some(event) = runtime.block_on(slots.next_completion()) {
            outcomes.push((event.index, event.outcome));
        }
        outcomes.sort_by_key(|(index, _)| *index);

        assert_eq!(
            outcomes,
            vec![(0, CompletionOutcome::Failed), (1, CompletionOutcome::Applied)]
        );
        assert_eq!(slots.in_flight(), 0);
        assert!(matches!(
            slots.get(0).unwrap().state(),
            SlotState::Failed(ViewerError::PageRender { index: 0, .. })
        ));
    }
}
