//! Release velocity estimation.
//!
//! Positions are fitted with a straight line per axis (least squares) over
//! the most recent samples. A pause longer than [`ASSUME_STOPPED`] discards
//! the history, so a finger that stops before lifting does not fling.

use std::collections::VecDeque;
use std::time::Duration;

use crate::geometry::Point;

const HORIZON: Duration = Duration::from_millis(100);
const ASSUME_STOPPED: Duration = Duration::from_millis(40);
const HISTORY: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct VelocityTracker {
    samples: VecDeque<(Duration, Point)>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, time: Duration, position: Point) {
        if let Some(&(last, _)) = self.samples.back() {
            if time.saturating_sub(last) > ASSUME_STOPPED || time < last {
                self.samples.clear();
            }
        }

        self.samples.push_back((time, position));
        while self.samples.len() > HISTORY {
            self.samples.pop_front();
        }
        while let Some(&(oldest, _)) = self.samples.front() {
            if time.saturating_sub(oldest) > HORIZON {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Estimated velocity in pixels per second; zero with fewer than two
    /// samples.
    pub fn velocity(&self) -> Point {
        let Some(&(newest, _)) = self.samples.back() else {
            return Point::ZERO;
        };
        if self.samples.len() < 2 {
            return Point::ZERO;
        }

        // Times relative to the newest sample, in seconds (all <= 0).
        let n = self.samples.len() as f32;
        let times: Vec<f32> = self
            .samples
            .iter()
            .map(|(t, _)| -(newest - *t).as_secs_f32())
            .collect();
        let mean_t = times.iter().sum::<f32>() / n;
        let mean = self
            .samples
            .iter()
            .fold(Point::ZERO, |acc, (_, p)| acc + *p)
            * (1.0 / n);

        let mut var_t = 0.0;
        let mut cov = Point::ZERO;
        for (t, (_, p)) in times.iter().zip(&self.samples) {
            let dt = t - mean_t;
            var_t += dt * dt;
            cov = cov + (*p - mean) * dt;
        }

        if var_t <= f32::EPSILON {
            return Point::ZERO;
        }
        cov * (1.0 / var_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn constant_motion_is_recovered() {
        let mut tracker = VelocityTracker::new();
        for step in 0..8 {
            tracker.add(ms(step * 10), Point::new(0.0, step as f32 * 20.0));
        }
        let v = tracker.velocity();
        assert!(v.x.abs() < 1e-3);
        assert!((v.y - 2000.0).abs() < 1.0, "vy = {}", v.y);
    }

    #[test]
    fn single_sample_has_no_velocity() {
        let mut tracker = VelocityTracker::new();
        tracker.add(ms(0), Point::new(5.0, 5.0));
        assert_eq!(tracker.velocity(), Point::ZERO);
    }

    #[test]
    fn pause_resets_history() {
        let mut tracker = VelocityTracker::new();
        for step in 0..5 {
            tracker.add(ms(step * 10), Point::new(0.0, step as f32 * 30.0));
        }
        tracker.add(ms(200), Point::new(0.0, 120.0));
        assert_eq!(tracker.velocity(), Point::ZERO);
    }

    #[test]
    fn only_recent_samples_count() {
        let mut tracker = VelocityTracker::new();
        // Slow start, then fast for the final 100ms.
        for step in 0..10 {
            tracker.add(ms(step * 20), Point::new(step as f32, 0.0));
        }
        let base = 9.0;
        for step in 1..=6 {
            tracker.add(ms(180 + step * 20), Point::new(base + step as f32 * 40.0, 0.0));
        }
        let v = tracker.velocity();
        assert!((v.x - 2000.0).abs() < 1.0, "vx = {}", v.x);
    }
}
