//! A single animatable scalar with movable bounds.
//!
//! An [`AnimatedAxis`] holds one value and at most one running animation.
//! Starting a snap, tween or decay replaces whatever was running, which is
//! how a drag cancels an in-flight fling. Animations are driven by
//! [`AnimatedAxis::tick`] with a monotonic timestamp; the first tick after an
//! animation starts becomes its time origin, so starting one never blocks and
//! never needs a clock.
//!
//! Bounds are advisory for the stored value: moving them does not clamp it.
//! Snaps and animation targets are clamped, and a decay stops at the bound it
//! runs into.

use std::time::Duration;

use crate::config::AnimationConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    /// Critically damped spring towards `to`.
    Spring { from: f32, to: f32, velocity: f32 },
    /// Exponential velocity decay.
    Decay { from: f32, velocity: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Animation {
    motion: Motion,
    started: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct AnimatedAxis {
    value: f32,
    velocity: f32,
    lower: f32,
    upper: f32,
    animation: Option<Animation>,
    config: AnimationConfig,
}

impl AnimatedAxis {
    pub fn new(value: f32, lower: f32, upper: f32, config: AnimationConfig) -> Self {
        Self {
            value,
            velocity: 0.0,
            lower,
            upper: upper.max(lower),
            animation: None,
            config,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Current velocity in units per second.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.lower, self.upper)
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn is_out_of_bounds(&self) -> bool {
        self.value < self.lower || self.value > self.upper
    }

    /// Where the running animation will come to rest.
    pub fn target(&self) -> Option<f32> {
        let animation = self.animation?;
        Some(match animation.motion {
            Motion::Spring { to, .. } => to,
            Motion::Decay { from, velocity } => self.clamp(from + velocity / self.friction()),
        })
    }

    /// Replace the clamping range. An inverted range collapses onto `lower`.
    pub fn update_bounds(&mut self, lower: f32, upper: f32) {
        self.lower = lower;
        self.upper = upper.max(lower);
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.lower, self.upper)
    }

    /// Jump to `target` (clamped), cancelling any running animation.
    pub fn snap_to(&mut self, target: f32) {
        self.animation = None;
        self.velocity = 0.0;
        self.value = self.clamp(target);
    }

    /// Spring towards `target` (clamped), keeping the current velocity.
    pub fn animate_to(&mut self, target: f32) {
        let to = self.clamp(target);
        self.animation = Some(Animation {
            motion: Motion::Spring {
                from: self.value,
                to,
                velocity: self.velocity,
            },
            started: None,
        });
    }

    /// Coast with `velocity` (units per second) until friction stops it or a
    /// bound is reached.
    pub fn animate_decay(&mut self, velocity: f32) {
        self.value = self.clamp(self.value);
        self.velocity = velocity;
        self.animation = Some(Animation {
            motion: Motion::Decay {
                from: self.value,
                velocity,
            },
            started: None,
        });
    }

    pub fn stop(&mut self) {
        self.animation = None;
        self.velocity = 0.0;
    }

    /// Advance the running animation to `now`. Returns whether it is still
    /// running afterwards.
    pub fn tick(&mut self, now: Duration) -> bool {
        let Some(animation) = self.animation.as_mut() else {
            return false;
        };
        let started = *animation.started.get_or_insert(now);
        let t = now.saturating_sub(started).as_secs_f32();

        let finished = match animation.motion {
            Motion::Spring { from, to, velocity } => self.step_spring(from, to, velocity, t),
            Motion::Decay { from, velocity } => self.step_decay(from, velocity, t),
        };

        if finished {
            self.animation = None;
            self.velocity = 0.0;
        }
        !finished
    }

    fn friction(&self) -> f32 {
        self.config.decay_friction
    }

    fn step_spring(&mut self, from: f32, to: f32, v0: f32, t: f32) -> bool {
        let omega = self.config.spring_stiffness.sqrt();
        let c1 = from - to;
        let c2 = v0 + omega * c1;
        let envelope = (-omega * t).exp();

        let displacement = (c1 + c2 * t) * envelope;
        let velocity = (c2 - omega * (c1 + c2 * t)) * envelope;

        if displacement.abs() < self.config.settle_threshold
            && velocity.abs() < self.config.velocity_threshold.max(self.config.settle_threshold)
        {
            self.value = to;
            return true;
        }

        self.value = to + displacement;
        self.velocity = velocity;
        false
    }

    fn step_decay(&mut self, from: f32, v0: f32, t: f32) -> bool {
        let friction = self.friction();
        let threshold = self.config.velocity_threshold;

        // Time at which the speed drops below the threshold.
        let duration = if v0.abs() > threshold {
            (v0.abs() / threshold).ln() / friction
        } else {
            0.0
        };
        let t = t.min(duration);

        let value = from + v0 / friction * (1.0 - (-friction * t).exp());
        let velocity = v0 * (-friction * t).exp();

        if (v0 < 0.0 && value <= self.lower) || (v0 > 0.0 && value >= self.upper) {
            self.value = self.clamp(value);
            return true;
        }

        self.value = value;
        self.velocity = velocity;
        t >= duration
    }
}
