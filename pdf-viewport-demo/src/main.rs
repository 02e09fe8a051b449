use anyhow::Context;
use clap::{Parser, ValueEnum};
use iced::mouse;
use iced::touch;
use iced::widget::canvas::{self, Canvas, Geometry};
use iced::widget::image::Handle;
use iced::widget::{button, column, horizontal_space, row, text};
use iced::{window, Color, Element, Length, Rectangle, Renderer, Subscription, Task, Theme};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pdf_viewport::{
    ImageSequenceBackend, PageBackend, PdfViewer, PdfiumBackend, Point, PointerEvent, PointerId,
    PointerKind, Size, ViewerConfig,
};

const TOOLBAR_HEIGHT: f32 = 48.0;
const LINE_HEIGHT: f32 = 40.0;
const MOUSE_POINTER: u64 = 0;

#[derive(Parser, Debug)]
#[command(name = "pdf-viewport-demo", about = "Scroll and zoom a document with pdf-viewport")]
struct Args {
    /// PDF file, or a directory of page images with `--backend images`
    path: PathBuf,

    #[arg(long, value_enum, default_value_t = BackendKind::Pdfium)]
    backend: BackendKind,

    /// JSON file overriding viewer settings
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Pdfium,
    Images,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_viewport=debug,pdf_viewport_demo=debug,info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ViewerConfig::from_json(&json)?
        }
        None => ViewerConfig::default(),
    };

    let backend: Arc<dyn PageBackend> = match args.backend {
        BackendKind::Pdfium => Arc::new(PdfiumBackend::new(&args.path)?),
        BackendKind::Images => Arc::new(ImageSequenceBackend::from_dir(&args.path)),
    };

    // Page rasterization runs on this runtime's blocking pool.
    let runtime = tokio::runtime::Runtime::new().context("Failed to start raster runtime")?;
    let mut viewer = PdfViewer::new(backend, config, runtime.handle().clone())?;
    let pages = viewer
        .open()
        .with_context(|| format!("Failed to open {}", args.path.display()))?;
    tracing::info!("{} opened, {pages} pages", args.path.display());

    let title = args
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Untitled")
        .to_string();

    iced::application(move |_: &Demo| title.clone(), Demo::update, Demo::view)
        .subscription(Demo::subscription)
        .theme(|_| Theme::Dark)
        .run_with(move || Demo::new(viewer))?;

    Ok(())
}

#[derive(Debug, Clone)]
enum Message {
    Tick(Instant),
    WindowResized(iced::Size),
    Pointer(PointerEvent),
    Scroll(f32),
    ZoomIn,
    ZoomOut,
    ZoomReset,
    PreviousPage,
    NextPage,
}

/// One page as the canvas draws it.
struct Placed {
    bounds: Rectangle,
    handle: Option<Handle>,
}

/// Converts page bitmaps into GPU handles once per raster.
#[derive(Default)]
struct Textures {
    handles: HashMap<usize, ((u64, u32), Handle)>,
}

impl Textures {
    fn get(&mut self, index: usize, generation: u64, image: &image::RgbaImage) -> Handle {
        // A pending slot shows the previous bitmap under its new generation,
        // so the width is part of the key.
        let key = (generation, image.width());
        match self.handles.get(&index) {
            Some((cached, handle)) if *cached == key => handle.clone(),
            _ => {
                let handle =
                    Handle::from_rgba(image.width(), image.height(), image.as_raw().clone());
                self.handles.insert(index, (key, handle.clone()));
                handle
            }
        }
    }

    fn retain(&mut self, visible: &std::ops::Range<usize>) {
        self.handles.retain(|index, _| visible.contains(index));
    }
}

struct Demo {
    viewer: PdfViewer,
    start: Instant,
    scene: Vec<Placed>,
    textures: Textures,
    animating: bool,
}

impl Demo {
    fn new(viewer: PdfViewer) -> (Self, Task<Message>) {
        let demo = Self {
            viewer,
            start: Instant::now(),
            scene: Vec::new(),
            textures: Textures::default(),
            animating: false,
        };
        let size = window::get_oldest()
            .and_then(window::get_size)
            .map(Message::WindowResized);
        (demo, size)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick(_) => {}
            Message::WindowResized(size) => {
                self.viewer.set_viewport(Size::new(
                    size.width,
                    (size.height - TOOLBAR_HEIGHT).max(0.0),
                ));
            }
            Message::Pointer(event) => {
                self.viewer.handle_pointer(&event);
            }
            Message::Scroll(dy) => self.viewer.scroll_by(Point::new(0.0, dy)),
            Message::ZoomIn => self.viewer.zoom_in(),
            Message::ZoomOut => self.viewer.zoom_out(),
            Message::ZoomReset => self.viewer.reset_zoom(),
            Message::PreviousPage => {
                if let Err(e) = self.viewer.previous_page() {
                    tracing::error!("{e}");
                }
            }
            Message::NextPage => {
                if let Err(e) = self.viewer.next_page() {
                    tracing::error!("{e}");
                }
            }
        }

        self.refresh();
        Task::none()
    }

    /// Run one viewer frame and rebuild the scene from it.
    fn refresh(&mut self) {
        let frame = self.viewer.frame(self.start.elapsed());
        self.animating = frame.animating;

        self.scene = frame
            .pages
            .iter()
            .map(|page| Placed {
                bounds: Rectangle {
                    x: page.screen_rect.x,
                    y: page.screen_rect.y,
                    width: page.screen_rect.width,
                    height: page.screen_rect.height,
                },
                handle: page
                    .raster
                    .map(|image| self.textures.get(page.index, page.generation, image)),
            })
            .collect();
        self.textures.retain(&frame.visible);
    }

    fn subscription(&self) -> Subscription<Message> {
        let resize = window::resize_events().map(|(_, size)| Message::WindowResized(size));

        // Keep ticking while something moves or a page is still rendering.
        if self.animating || self.viewer.slots().in_flight() > 0 {
            Subscription::batch([
                resize,
                iced::time::every(Duration::from_millis(16)).map(Message::Tick),
            ])
        } else {
            resize
        }
    }

    fn view(&self) -> Element<Message> {
        let page_count = self.viewer.page_count();
        let current = self.viewer.current_page();

        let toolbar = row![
            button("−").on_press(Message::ZoomOut),
            text(format!("{}%", (self.viewer.transform().zoom * 100.0).round() as i32)),
            button("+").on_press(Message::ZoomIn),
            button("Reset").on_press(Message::ZoomReset),
            horizontal_space(),
            text(format!("Page {} of {}", current + 1, page_count)),
            button("◀").on_press_maybe((current > 0).then_some(Message::PreviousPage)),
            button("▶").on_press_maybe((current + 1 < page_count).then_some(Message::NextPage)),
        ]
        .spacing(10)
        .padding(8)
        .height(Length::Fixed(TOOLBAR_HEIGHT));

        let pages = Canvas::new(PageCanvas {
            scene: &self.scene,
            start: self.start,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        column![toolbar, pages].into()
    }
}

/// Draws the scene and turns raw mouse/touch input into pointer events.
struct PageCanvas<'a> {
    scene: &'a [Placed],
    start: Instant,
}

impl PageCanvas<'_> {
    fn pointer_event(
        &self,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
        pressed: &mut bool,
    ) -> Option<PointerEvent> {
        let time = self.start.elapsed();
        let local = |p: iced::Point| Point::new(p.x - bounds.x, p.y - bounds.y);
        let from_mouse = |kind: PointerKind, position: Point| {
            PointerEvent::new(PointerId(MOUSE_POINTER), kind, position, time)
        };

        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let position = cursor.position_in(bounds)?;
                *pressed = true;
                Some(from_mouse(PointerKind::Down, Point::new(position.x, position.y)))
            }
            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) if *pressed => {
                Some(from_mouse(PointerKind::Move, local(position)))
            }
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) if *pressed => {
                *pressed = false;
                let position = cursor.position().map(local).unwrap_or(Point::ZERO);
                Some(from_mouse(PointerKind::Up, position))
            }
            canvas::Event::Touch(finger_event) => {
                let (finger, kind, position) = match finger_event {
                    touch::Event::FingerPressed { id, position } => (id, PointerKind::Down, position),
                    touch::Event::FingerMoved { id, position } => (id, PointerKind::Move, position),
                    touch::Event::FingerLifted { id, position } => (id, PointerKind::Up, position),
                    touch::Event::FingerLost { id, position } => (id, PointerKind::Cancel, position),
                };
                // Finger ids start at 0 like the mouse; keep them apart.
                Some(PointerEvent::new(
                    PointerId(finger.0 + 1),
                    kind,
                    local(position),
                    time,
                ))
            }
            _ => None,
        }
    }
}

impl canvas::Program<Message> for PageCanvas<'_> {
    /// Whether the left mouse button is held.
    type State = bool;

    fn update(
        &self,
        pressed: &mut bool,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        if let canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) = event {
            if cursor.position_in(bounds).is_none() {
                return (canvas::event::Status::Ignored, None);
            }
            let dy = match delta {
                mouse::ScrollDelta::Lines { y, .. } => -y * LINE_HEIGHT,
                mouse::ScrollDelta::Pixels { y, .. } => -y,
            };
            return (canvas::event::Status::Captured, Some(Message::Scroll(dy)));
        }

        match self.pointer_event(event, bounds, cursor, pressed) {
            Some(pointer) => (canvas::event::Status::Captured, Some(Message::Pointer(pointer))),
            None => (canvas::event::Status::Ignored, None),
        }
    }

    fn draw(
        &self,
        _pressed: &bool,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            iced::Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.18, 0.18, 0.2),
        );

        for page in self.scene {
            match &page.handle {
                Some(handle) => frame.draw_image(page.bounds, handle),
                None => frame.fill_rectangle(
                    page.bounds.position(),
                    page.bounds.size(),
                    Color::from_rgb(0.95, 0.95, 0.95),
                ),
            }
        }

        vec![frame.into_geometry()]
    }
}
