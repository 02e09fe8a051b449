use std::sync::Arc;
use std::time::Duration;

use pdf_viewport::testing::{call_id, GatedBackend, RasterCall, ScriptedBackend};
use pdf_viewport::{
    CompletionOutcome, PdfViewer, Point, PointerEvent, Size, SlotState, ViewerConfig, ViewerError,
};
use pretty_assertions::assert_eq;
use tokio::runtime::Runtime;

const VIEWPORT: Size = Size {
    width: 408.0,
    height: 600.0,
};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn open_viewer(runtime: &Runtime, backend: Arc<dyn pdf_viewport::PageBackend>) -> PdfViewer {
    let mut viewer =
        PdfViewer::new(backend, ViewerConfig::default(), runtime.handle().clone()).unwrap();
    viewer.open().unwrap();
    viewer.set_viewport(VIEWPORT);
    viewer
}

/// Run frames every 16ms over `[from, to)`.
fn run_frames(viewer: &mut PdfViewer, from: u64, to: u64) {
    for t in (from..to).step_by(16) {
        viewer.frame(ms(t));
    }
}

fn tap(viewer: &mut PdfViewer, position: Point, at: u64) {
    viewer.handle_pointer(&PointerEvent::down(1, position, ms(at)));
    viewer.handle_pointer(&PointerEvent::up(1, position, ms(at + 50)));
}

#[test]
fn open_lays_out_and_close_releases_everything() {
    let runtime = Runtime::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new(&[1.4, 0.7, 1.4]));
    let mut viewer = open_viewer(&runtime, backend.clone());

    assert_eq!(viewer.page_count(), 3);
    let frame = viewer.frame(ms(0));
    assert_eq!(frame.visible, 0..3);
    assert_eq!(frame.document_height, 4.0 + 560.0 + 4.0 + 280.0 + 4.0 + 560.0 + 4.0);

    while runtime.block_on(viewer.next_raster()).is_some() {}
    assert!(viewer.slots().get(0).unwrap().is_ready());

    viewer.close();
    assert!(backend.is_closed());
    assert!(viewer.slots().is_empty());
    assert!(viewer.frame(ms(16)).pages.is_empty());
}

#[test]
fn unreadable_document_is_fatal() {
    let runtime = Runtime::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new(&[1.0]).unreadable());
    let mut viewer =
        PdfViewer::new(backend, ViewerConfig::default(), runtime.handle().clone()).unwrap();

    let err = viewer.open().unwrap_err();
    assert!(matches!(err, ViewerError::DocumentOpen { .. }));
    assert!(!err.is_recoverable());
    assert!(viewer.document().is_none());

    viewer.set_viewport(VIEWPORT);
    assert!(viewer.frame(ms(0)).pages.is_empty());
}

#[test]
fn loading_a_page_needs_an_open_document() {
    let runtime = Runtime::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new(&[1.0, 2.0]));
    let mut viewer =
        PdfViewer::new(backend, ViewerConfig::default(), runtime.handle().clone()).unwrap();

    assert_eq!(
        viewer.load_page(0, 100).unwrap_err(),
        ViewerError::InvalidIndex {
            index: 0,
            page_count: 0
        }
    );

    viewer.open().unwrap();
    let image = viewer.load_page(1, 100).unwrap();
    assert_eq!(image.dimensions(), (100, 200));
    assert_eq!(
        viewer.load_page(2, 100).unwrap_err(),
        ViewerError::InvalidIndex {
            index: 2,
            page_count: 2
        }
    );
}

#[test]
fn double_tap_toggles_zoom_to_exact_extremes() {
    let runtime = Runtime::new().unwrap();
    let mut viewer = open_viewer(&runtime, Arc::new(ScriptedBackend::new(&[1.0; 5])));
    let centre = Point::new(200.0, 300.0);

    tap(&mut viewer, centre, 0);
    tap(&mut viewer, centre, 150);
    run_frames(&mut viewer, 300, 3_000);
    assert_eq!(viewer.transform().zoom, 2.0);

    viewer.reset_zoom();
    run_frames(&mut viewer, 3_000, 6_000);
    viewer.zoom_in();
    viewer.zoom_in();
    run_frames(&mut viewer, 6_000, 9_000);
    assert_eq!(viewer.transform().zoom, 1.5);

    tap(&mut viewer, centre, 10_000);
    tap(&mut viewer, centre, 10_150);
    run_frames(&mut viewer, 10_300, 13_000);
    assert_eq!(viewer.transform().zoom, 1.0);
}

#[test]
fn pinch_zoom_is_clamped_to_max() {
    let runtime = Runtime::new().unwrap();
    let mut viewer = open_viewer(&runtime, Arc::new(ScriptedBackend::new(&[1.0; 5])));

    viewer.handle_pointer(&PointerEvent::down(1, Point::new(100.0, 300.0), ms(0)));
    viewer.handle_pointer(&PointerEvent::down(2, Point::new(300.0, 300.0), ms(5)));
    viewer.handle_pointer(&PointerEvent::moved(2, Point::new(2100.0, 300.0), ms(20)));
    assert_eq!(viewer.transform().zoom, 2.0);

    viewer.handle_pointer(&PointerEvent::up(2, Point::new(2100.0, 300.0), ms(30)));
    viewer.handle_pointer(&PointerEvent::up(1, Point::new(100.0, 300.0), ms(40)));
    assert_eq!(viewer.transform().zoom, 2.0);
}

#[test]
fn zoomed_drag_keeps_the_page_under_the_finger() {
    let runtime = Runtime::new().unwrap();
    let mut viewer = open_viewer(&runtime, Arc::new(ScriptedBackend::new(&[1.0; 5])));
    let centre = Point::new(200.0, 300.0);

    tap(&mut viewer, centre, 0);
    tap(&mut viewer, centre, 150);
    run_frames(&mut viewer, 300, 3_000);
    assert_eq!(viewer.transform().zoom, 2.0);
    let before = viewer.frame(ms(3_000)).pages[0].screen_rect;

    // 10px crosses the 8px slop and scrolls 2px, then 100px more.
    viewer.handle_pointer(&PointerEvent::down(1, Point::new(200.0, 500.0), ms(4_000)));
    viewer.handle_pointer(&PointerEvent::moved(1, Point::new(200.0, 490.0), ms(4_010)));
    viewer.handle_pointer(&PointerEvent::moved(1, Point::new(200.0, 390.0), ms(4_020)));
    let after = viewer.frame(ms(4_030)).pages[0].screen_rect;

    assert!((after.y - before.y + 102.0).abs() < 1e-3, "moved {}", after.y - before.y);
    assert_eq!(after.x, before.x);
}

#[test]
fn drag_past_the_top_is_clamped_while_held() {
    let runtime = Runtime::new().unwrap();
    let mut viewer = open_viewer(&runtime, Arc::new(ScriptedBackend::new(&[1.0; 5])));

    viewer.handle_pointer(&PointerEvent::down(1, Point::new(200.0, 100.0), ms(0)));
    viewer.handle_pointer(&PointerEvent::moved(1, Point::new(200.0, 400.0), ms(16)));
    viewer.frame(ms(32));

    assert_eq!(viewer.transform().translate_y, 0.0);
    assert!(!viewer.is_animating());
}

fn drag_upward(viewer: &mut PdfViewer, start: u64) {
    let x = 200.0;
    viewer.handle_pointer(&PointerEvent::down(1, Point::new(x, 500.0), ms(start)));
    for step in 1..=6u64 {
        let y = 500.0 - step as f32 * 20.0;
        viewer.handle_pointer(&PointerEvent::moved(1, Point::new(x, y), ms(start + step * 10)));
    }
    viewer.handle_pointer(&PointerEvent::up(1, Point::new(x, 360.0), ms(start + 70)));
}

#[test]
fn fling_coasts_and_rests_inside_bounds() {
    let runtime = Runtime::new().unwrap();
    let mut viewer = open_viewer(&runtime, Arc::new(ScriptedBackend::new(&[1.0; 20])));
    viewer.scroll_by(Point::new(0.0, 2000.0));

    drag_upward(&mut viewer, 0);
    let released = viewer.transform().translate_y;
    // 12px past the slop, then five 20px steps.
    assert_eq!(released, 2000.0 + 112.0);
    assert!(viewer.is_animating());

    run_frames(&mut viewer, 100, 6_000);
    let rest = viewer.transform().translate_y;
    assert!(!viewer.is_animating());
    assert!(rest > released + 400.0, "rested at {rest}");

    let (lower, upper) = (0.0, viewer.frame(ms(6_000)).document_height - VIEWPORT.height);
    assert!(rest >= lower && rest <= upper);
}

#[test]
fn drag_stops_a_running_fling() {
    let runtime = Runtime::new().unwrap();
    let mut viewer = open_viewer(&runtime, Arc::new(ScriptedBackend::new(&[1.0; 20])));

    drag_upward(&mut viewer, 0);
    run_frames(&mut viewer, 100, 200);
    assert!(viewer.is_animating());

    viewer.handle_pointer(&PointerEvent::down(1, Point::new(200.0, 300.0), ms(210)));
    viewer.handle_pointer(&PointerEvent::moved(1, Point::new(200.0, 320.0), ms(220)));
    assert!(!viewer.is_animating());

    let held = viewer.transform().translate_y;
    run_frames(&mut viewer, 230, 500);
    assert_eq!(viewer.transform().translate_y, held);
}

/// One page, rasterized at 600px for zoom 1.0, then re-requested at 800px
/// after pinching to 2.0.
fn superseded_request(runtime: &Runtime) -> (PdfViewer, Arc<GatedBackend>) {
    let backend = Arc::new(GatedBackend::new(&[1.0]));
    let mut viewer = open_viewer(runtime, backend.clone());

    viewer.frame(ms(0));
    backend.wait_for_calls(1);

    viewer.handle_pointer(&PointerEvent::down(1, Point::new(100.0, 300.0), ms(10)));
    viewer.handle_pointer(&PointerEvent::down(2, Point::new(300.0, 300.0), ms(15)));
    viewer.handle_pointer(&PointerEvent::moved(2, Point::new(2100.0, 300.0), ms(20)));
    viewer.frame(ms(32));

    let calls = backend.wait_for_calls(2);
    assert_eq!(calls[0].width, 600);
    assert_eq!(calls[1].width, 800);
    (viewer, backend)
}

#[test]
fn stale_raster_finishing_last_is_discarded() {
    let runtime = Runtime::new().unwrap();
    let (mut viewer, backend) = superseded_request(&runtime);

    backend.release(1);
    let event = runtime.block_on(viewer.next_raster()).unwrap();
    assert_eq!(event.outcome, CompletionOutcome::Applied);

    backend.release(0);
    let event = runtime.block_on(viewer.next_raster()).unwrap();
    assert_eq!(event.outcome, CompletionOutcome::Discarded);

    let image = viewer.slots().image(0).unwrap();
    assert_eq!(call_id(image), 1);
    assert_eq!(image.width(), 800);
    backend.release_all();
}

#[test]
fn stale_raster_finishing_first_is_discarded() {
    let runtime = Runtime::new().unwrap();
    let (mut viewer, backend) = superseded_request(&runtime);

    backend.release(0);
    let event = runtime.block_on(viewer.next_raster()).unwrap();
    assert_eq!(event.outcome, CompletionOutcome::Discarded);
    assert!(viewer.slots().image(0).is_none());

    backend.release(1);
    let event = runtime.block_on(viewer.next_raster()).unwrap();
    assert_eq!(event.outcome, CompletionOutcome::Applied);
    assert_eq!(call_id(viewer.slots().image(0).unwrap()), 1);
    backend.release_all();
}

#[test]
fn failed_page_leaves_neighbours_intact() {
    let runtime = Runtime::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new(&[0.2, 0.2, 0.2]).failing_pages([1]));
    let mut viewer = open_viewer(&runtime, backend.clone());

    viewer.frame(ms(0));
    while runtime.block_on(viewer.next_raster()).is_some() {}

    let frame = viewer.frame(ms(16));
    let drawn: Vec<(usize, bool)> = frame
        .pages
        .iter()
        .map(|page| (page.index, page.raster.is_some()))
        .collect();
    assert_eq!(drawn, vec![(0, true), (1, false), (2, true)]);

    assert!(matches!(
        viewer.slots().get(1).unwrap().state(),
        SlotState::Failed(ViewerError::PageRender { index: 1, .. })
    ));
    // Staying visible does not retry the failed page.
    assert_eq!(backend.call_count(), 3);
}

fn call_for_page(calls: &[RasterCall], page: usize, from: usize) -> usize {
    from + calls[from..]
        .iter()
        .position(|call| call.page == page)
        .unwrap()
}

#[test]
fn page_scrolled_out_and_back_ignores_its_first_raster() {
    let runtime = Runtime::new().unwrap();
    let backend = Arc::new(GatedBackend::new(&[1.0; 20]));
    let mut viewer = open_viewer(&runtime, backend.clone());

    // Pages 0..3 are live at the top, 9..13 after scrolling away.
    viewer.frame(ms(0));
    let first = call_for_page(&backend.wait_for_calls(3), 0, 0);

    viewer.scroll_by(Point::new(0.0, 4000.0));
    viewer.frame(ms(16));
    backend.wait_for_calls(7);
    assert!(viewer.slots().get(0).is_none());

    viewer.scroll_by(Point::new(0.0, -4000.0));
    viewer.frame(ms(32));
    let second = call_for_page(&backend.wait_for_calls(10), 0, 7);

    backend.release(second);
    let event = runtime.block_on(viewer.next_raster()).unwrap();
    assert_eq!((event.index, event.outcome), (0, CompletionOutcome::Applied));

    backend.release(first);
    let event = runtime.block_on(viewer.next_raster()).unwrap();
    assert_eq!((event.index, event.outcome), (0, CompletionOutcome::Discarded));

    assert_eq!(call_id(viewer.slots().image(0).unwrap()), second);
    backend.release_all();
}
