//! Gesture reconciliation.
//!
//! A single state machine consumes the raw pointer stream and decides which
//! high-level gesture (if any) each event produces. Drag, pinch and
//! double-tap recognition share one view of the active pointers, so they
//! cannot disagree about who owns a sequence:
//!
//! ```text
//! Idle ──down──▶ Tracking ──move > slop──▶ Dragging ──up──▶ Idle (Fling)
//!                   │ │
//!                   │ └──second down──▶ Pinching ──all up──▶ Idle
//!                   └──up──▶ Tapped ──down in time──▶ Tracking ──up──▶ Idle (DoubleTap)
//! ```
//!
//! Once a sequence has pinched it stays in `Pinching` until every pointer
//! has lifted, even if only one finger remains.

mod pointer;
mod velocity;

pub use pointer::{PointerEvent, PointerId, PointerKind};
pub use velocity::VelocityTracker;

use std::time::Duration;

use crate::config::GestureConfig;
use crate::geometry::Point;

/// What the reconciler asks the transform to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// The content follows the pointer by `delta` (viewport pixels).
    Drag { delta: Point },
    /// A drag ended with this release velocity (px/s).
    Fling { velocity: Point },
    /// Multiply the zoom by `ratio`.
    Zoom { ratio: f32, centroid: Point },
    DoubleTap { position: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    /// One pointer is down but has not moved past the touch slop.
    Tracking,
    Dragging,
    Pinching,
    /// A tap completed; a second one may turn it into a double tap.
    Tapped,
}

#[derive(Debug, Clone, Copy)]
struct Tap {
    position: Point,
    time: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Pinch {
    /// Product of all ratios since the pinch began.
    cumulative: f32,
    /// Centroid size at the previous step; zero when unknown.
    last_span: f32,
    past_slop: bool,
}

impl Pinch {
    fn new(span: f32) -> Self {
        Self {
            cumulative: 1.0,
            last_span: span,
            past_slop: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GestureReconciler {
    config: GestureConfig,
    phase: GesturePhase,
    /// Active pointers in press order.
    pointers: Vec<(PointerId, Point)>,
    down_position: Point,
    last_position: Point,
    velocity: VelocityTracker,
    pinch: Pinch,
    last_tap: Option<Tap>,
    double_tap_pending: bool,
}

impl GestureReconciler {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            phase: GesturePhase::Idle,
            pointers: Vec::new(),
            down_position: Point::ZERO,
            last_position: Point::ZERO,
            velocity: VelocityTracker::new(),
            pinch: Pinch::new(0.0),
            last_tap: None,
            double_tap_pending: false,
        }
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Whether any pointer is currently pressed.
    pub fn is_active(&self) -> bool {
        !self.pointers.is_empty()
    }

    pub fn handle(&mut self, event: &PointerEvent) -> Option<Gesture> {
        match event.kind {
            PointerKind::Down => self.on_down(event),
            PointerKind::Move => self.on_move(event),
            PointerKind::Up => self.on_up(event),
            PointerKind::Cancel => {
                self.reset();
                None
            }
        }
    }

    fn reset(&mut self) {
        self.phase = GesturePhase::Idle;
        self.pointers.clear();
        self.velocity.clear();
        self.last_tap = None;
        self.double_tap_pending = false;
    }

    fn on_down(&mut self, event: &PointerEvent) -> Option<Gesture> {
        if self.pointers.iter().any(|(id, _)| *id == event.pointer) {
            return None;
        }
        self.pointers.push((event.pointer, event.position));

        if self.pointers.len() > 1 {
            self.phase = GesturePhase::Pinching;
            self.last_tap = None;
            self.double_tap_pending = false;
            self.pinch = Pinch::new(self.two_finger_span().unwrap_or(0.0));
            return None;
        }

        self.double_tap_pending = self.last_tap.take().is_some_and(|tap| {
            let elapsed = event.time.saturating_sub(tap.time);
            elapsed >= self.config.double_tap_min()
                && elapsed <= self.config.double_tap_timeout()
                && tap.position.distance(event.position) <= self.config.double_tap_slop
        });

        self.phase = GesturePhase::Tracking;
        self.down_position = event.position;
        self.last_position = event.position;
        self.velocity.clear();
        self.velocity.add(event.time, event.position);
        None
    }

    fn on_move(&mut self, event: &PointerEvent) -> Option<Gesture> {
        let slot = self
            .pointers
            .iter_mut()
            .find(|(id, _)| *id == event.pointer)?;
        slot.1 = event.position;

        match self.phase {
            GesturePhase::Tracking => {
                self.velocity.add(event.time, event.position);
                let total = event.position - self.down_position;
                let distance = total.length();
                if distance <= self.config.touch_slop {
                    return None;
                }

                self.phase = GesturePhase::Dragging;
                self.double_tap_pending = false;
                self.last_position = event.position;
                let remainder = total - total * (self.config.touch_slop / distance);
                tracing::trace!("drag started");
                Some(Gesture::Drag { delta: remainder })
            }
            GesturePhase::Dragging => {
                self.velocity.add(event.time, event.position);
                let delta = event.position - self.last_position;
                self.last_position = event.position;
                (delta != Point::ZERO).then_some(Gesture::Drag { delta })
            }
            GesturePhase::Pinching => self.pinch_step(),
            GesturePhase::Idle | GesturePhase::Tapped => None,
        }
    }

    fn pinch_step(&mut self) -> Option<Gesture> {
        let span = self.two_finger_span()?;
        let centroid = self.centroid();
        let last = std::mem::replace(&mut self.pinch.last_span, span);
        if last <= 0.0 || span <= 0.0 {
            return None;
        }

        let step = span / last;
        self.pinch.cumulative *= step;

        if !self.pinch.past_slop {
            if (1.0 - self.pinch.cumulative).abs() * span > self.config.touch_slop {
                self.pinch.past_slop = true;
                tracing::trace!("pinch started");
                return Some(Gesture::Zoom {
                    ratio: self.pinch.cumulative,
                    centroid,
                });
            }
            return None;
        }

        (step != 1.0).then_some(Gesture::Zoom {
            ratio: step,
            centroid,
        })
    }

    fn on_up(&mut self, event: &PointerEvent) -> Option<Gesture> {
        let position = self
            .pointers
            .iter()
            .position(|(id, _)| *id == event.pointer)?;
        self.pointers.remove(position);

        match self.phase {
            GesturePhase::Tracking => {
                self.phase = GesturePhase::Tapped;
                if std::mem::take(&mut self.double_tap_pending) {
                    self.phase = GesturePhase::Idle;
                    return Some(Gesture::DoubleTap {
                        position: event.position,
                    });
                }
                self.last_tap = Some(Tap {
                    position: event.position,
                    time: event.time,
                });
                None
            }
            GesturePhase::Dragging => {
                self.phase = GesturePhase::Idle;
                self.velocity.add(event.time, event.position);
                let velocity = self.clamp_velocity(self.velocity.velocity());
                self.velocity.clear();
                Some(Gesture::Fling { velocity })
            }
            GesturePhase::Pinching => {
                if self.pointers.is_empty() {
                    self.phase = GesturePhase::Idle;
                } else {
                    // A finger left; restart ratio tracking from the remaining pair.
                    self.pinch.last_span = self.two_finger_span().unwrap_or(0.0);
                }
                None
            }
            GesturePhase::Idle | GesturePhase::Tapped => None,
        }
    }

    fn clamp_velocity(&self, velocity: Point) -> Point {
        let max = self.config.max_fling_velocity;
        let speed = velocity.length();
        if speed > max {
            velocity * (max / speed)
        } else {
            velocity
        }
    }

    fn centroid(&self) -> Point {
        let n = self.pointers.len().max(1) as f32;
        self.pointers
            .iter()
            .fold(Point::ZERO, |acc, (_, p)| acc + *p)
            * (1.0 / n)
    }

    /// Mean distance of the two pointers from their centroid. `None` unless
    /// exactly two pointers are down.
    fn two_finger_span(&self) -> Option<f32> {
        match self.pointers.as_slice() {
            [(_, a), (_, b)] => Some(a.distance(*b) / 2.0),
            _ => None,
        }
    }
}
