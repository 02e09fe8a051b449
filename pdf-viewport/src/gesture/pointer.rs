use std::time::Duration;

use crate::geometry::Point;

/// Identifies one finger (or the mouse) for the lifetime of a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    /// The platform took the pointer away (e.g. a system gesture).
    Cancel,
}

/// One raw input event in viewport coordinates.
///
/// `time` is a monotonic timestamp from the host's clock; only differences
/// between events are used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer: PointerId,
    pub kind: PointerKind,
    pub position: Point,
    pub time: Duration,
}

impl PointerEvent {
    pub fn new(pointer: PointerId, kind: PointerKind, position: Point, time: Duration) -> Self {
        Self {
            pointer,
            kind,
            position,
            time,
        }
    }

    pub fn down(pointer: u64, position: Point, time: Duration) -> Self {
        Self::new(PointerId(pointer), PointerKind::Down, position, time)
    }

    pub fn moved(pointer: u64, position: Point, time: Duration) -> Self {
        Self::new(PointerId(pointer), PointerKind::Move, position, time)
    }

    pub fn up(pointer: u64, position: Point, time: Duration) -> Self {
        Self::new(PointerId(pointer), PointerKind::Up, position, time)
    }

    pub fn cancel(pointer: u64, position: Point, time: Duration) -> Self {
        Self::new(PointerId(pointer), PointerKind::Cancel, position, time)
    }
}
