//! Virtualized pan/zoom viewport for paginated documents.
//!
//! Pages are stacked in a vertical column. Only pages near the viewport own
//! a bitmap; everything else is a rectangle computed from the page's aspect
//! ratio. Drags, flings, pinches and double taps drive an animated
//! translate/zoom transform, and bitmaps are re-requested at a resolution
//! matching the current zoom.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pdf_viewport::{ImageSequenceBackend, PdfViewer, Size, ViewerConfig};
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let backend = Arc::new(ImageSequenceBackend::from_dir("scans/"));
//! let mut viewer = PdfViewer::new(backend, ViewerConfig::default(), runtime.handle().clone())?;
//!
//! viewer.open()?;
//! viewer.set_viewport(Size::new(1080.0, 1920.0));
//! for placement in viewer.frame(Duration::ZERO).pages {
//!     println!("page {} at {:?}", placement.index, placement.screen_rect);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod animation;
pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod layout;
pub mod raster;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transform;
pub mod viewer;
pub mod visibility;

pub use backend::{ImageSequenceBackend, PageBackend};
#[cfg(feature = "pdfium")]
pub use backend::PdfiumBackend;
pub use config::{AnimationConfig, GestureConfig, Padding, ViewerConfig};
pub use document::{Document, Page};
pub use error::{Result, ViewerError};
pub use geometry::{Point, Rect, Size};
pub use gesture::{Gesture, GesturePhase, GestureReconciler, PointerEvent, PointerId, PointerKind};
pub use layout::{LayoutRect, PageLayout};
pub use raster::{CompletionOutcome, RasterEvent, SlotState};
pub use transform::Transform;
pub use viewer::{Frame, PagePlacement, PdfViewer};
pub use visibility::VisibilityWindow;
