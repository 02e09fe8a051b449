//! Viewer configuration.
//!
//! Every field has a default, so hosts only spell out what they change:
//!
//! ```
//! use pdf_viewport::ViewerConfig;
//!
//! let config = ViewerConfig::from_json(r#"{ "vertical_spacing": 12.0 }"#).unwrap();
//! assert_eq!(config.vertical_spacing, 12.0);
//! assert_eq!(config.max_zoom, 2.0);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, ViewerError};

/// Content padding around the page column, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub top: f32,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Padding {
    pub const ZERO: Padding = Padding::all(0.0);

    pub const fn all(value: f32) -> Self {
        Self {
            top: value,
            left: value,
            right: value,
            bottom: value,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    fn is_valid(&self) -> bool {
        [self.top, self.left, self.right, self.bottom]
            .iter()
            .all(|edge| edge.is_finite() && *edge >= 0.0)
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::all(4.0)
    }
}

/// Thresholds used by the gesture reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Movement (or pinch deformation) below this is treated as noise.
    pub touch_slop: f32,
    /// Maximum delay between the first tap's release and the second press.
    pub double_tap_timeout_ms: u64,
    /// Second presses arriving sooner than this are treated as bounce.
    pub double_tap_min_ms: u64,
    /// Maximum distance between the two taps of a double tap.
    pub double_tap_slop: f32,
    /// Release velocities are clamped to this magnitude (px/s).
    pub max_fling_velocity: f32,
}

impl GestureConfig {
    pub fn double_tap_timeout(&self) -> Duration {
        Duration::from_millis(self.double_tap_timeout_ms)
    }

    pub fn double_tap_min(&self) -> Duration {
        Duration::from_millis(self.double_tap_min_ms)
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            double_tap_timeout_ms: 300,
            double_tap_min_ms: 40,
            double_tap_slop: 100.0,
            max_fling_velocity: 8000.0,
        }
    }
}

/// Parameters of the transform animations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Stiffness of the critically damped spring used by animated moves.
    pub spring_stiffness: f32,
    /// Friction of the exponential fling decay.
    pub decay_friction: f32,
    /// A fling stops once its speed falls below this (px/s).
    pub velocity_threshold: f32,
    /// A spring snaps onto its target once closer than this.
    pub settle_threshold: f32,
}

impl AnimationConfig {
    /// Every field finite and positive, so springs and flings always end.
    fn is_valid(&self) -> bool {
        [
            self.spring_stiffness,
            self.decay_friction,
            self.velocity_threshold,
            self.settle_threshold,
        ]
        .iter()
        .all(|value| value.is_finite() && *value > 0.0)
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            spring_stiffness: 1500.0,
            decay_friction: 4.2,
            velocity_threshold: 0.1,
            settle_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Gap between consecutive pages.
    pub vertical_spacing: f32,
    pub content_padding: Padding,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Fraction of the viewport height kept alive above the visible area.
    pub margin_above: f32,
    /// Fraction of the viewport height kept alive below the visible area.
    pub margin_below: f32,
    /// Pages are rasterized this much wider than their on-screen width.
    pub oversample: f32,
    pub gestures: GestureConfig,
    pub animation: AnimationConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            vertical_spacing: 4.0,
            content_padding: Padding::default(),
            min_zoom: 1.0,
            max_zoom: 2.0,
            margin_above: 0.5,
            margin_below: 1.5,
            oversample: 1.5,
            gestures: GestureConfig::default(),
            animation: AnimationConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Parse a (possibly partial) JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(json)
            .map_err(|e| ViewerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ViewerError::InvalidConfig(msg.to_string()));

        if !(self.min_zoom.is_finite() && self.min_zoom > 0.0) {
            return invalid("min_zoom must be positive");
        }
        if !(self.max_zoom.is_finite() && self.max_zoom >= self.min_zoom) {
            return invalid("max_zoom must not be below min_zoom");
        }
        if !(self.vertical_spacing.is_finite() && self.vertical_spacing >= 0.0) {
            return invalid("vertical_spacing must be non-negative");
        }
        if !self.content_padding.is_valid() {
            return invalid("content_padding edges must be non-negative");
        }
        if !(self.margin_above >= 0.0 && self.margin_below >= 0.0) {
            return invalid("visibility margins must be non-negative");
        }
        if !(self.oversample.is_finite() && self.oversample >= 1.0) {
            return invalid("oversample must be at least 1.0");
        }
        if !(self.gestures.touch_slop >= 0.0 && self.gestures.max_fling_velocity > 0.0) {
            return invalid("gesture thresholds must be positive");
        }
        if !self.animation.is_valid() {
            return invalid("animation constants and thresholds must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_zoom, 1.0);
        assert_eq!(config.max_zoom, 2.0);
        assert_eq!(config.margin_above, 0.5);
        assert_eq!(config.margin_below, 1.5);
        assert_eq!(config.oversample, 1.5);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = ViewerConfig::from_json(
            r#"{ "content_padding": { "top": 16.0 }, "gestures": { "touch_slop": 12.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.content_padding.top, 16.0);
        assert_eq!(config.content_padding.left, 4.0);
        assert_eq!(config.gestures.touch_slop, 12.0);
        assert_eq!(config.gestures.double_tap_timeout(), Duration::from_millis(300));
    }

    #[test]
    fn rejects_inverted_zoom_range() {
        let err = ViewerConfig::from_json(r#"{ "min_zoom": 3.0 }"#).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_undersampling_and_negative_padding() {
        let config = ViewerConfig {
            oversample: 0.5,
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ViewerConfig {
            content_padding: Padding {
                left: -1.0,
                ..Padding::ZERO
            },
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_animation_thresholds() {
        let err = ViewerConfig::from_json(r#"{ "animation": { "velocity_threshold": 0.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ViewerError::InvalidConfig(_)));

        let err = ViewerConfig::from_json(r#"{ "animation": { "settle_threshold": 0.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ViewerError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_finite_animation_constants() {
        for animation in [
            AnimationConfig {
                spring_stiffness: f32::INFINITY,
                ..AnimationConfig::default()
            },
            AnimationConfig {
                decay_friction: f32::NAN,
                ..AnimationConfig::default()
            },
            AnimationConfig {
                velocity_threshold: f32::INFINITY,
                ..AnimationConfig::default()
            },
            AnimationConfig {
                settle_threshold: -0.01,
                ..AnimationConfig::default()
            },
        ] {
            let config = ViewerConfig {
                animation,
                ..ViewerConfig::default()
            };
            assert!(config.validate().is_err(), "{animation:?} accepted");
        }
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ViewerConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ViewerError::InvalidConfig(_)));
    }
}
