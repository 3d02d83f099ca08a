// wristhub — Twist Detector
//
// Edge-triggered on the Y delta: a rising edge above +threshold arms the
// timer, a falling edge below -threshold inside the window fires. After a
// fire the timer is pinned at TIMER_MAX until the next rising edge.

use crate::accel::AccelSample;
use crate::config::{TwistConfig, TIMER_MAX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwistDetector {
    timer_ms: u32,
}

impl Default for TwistDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TwistDetector {
    pub fn new() -> Self {
        Self { timer_ms: TIMER_MAX }
    }

    pub fn timer_ms(&self) -> u32 {
        self.timer_ms
    }

    /// Returns true on the tick a twist completes.
    pub fn update(&mut self, cfg: &TwistConfig, sample: &AccelSample, interval_ms: u32) -> bool {
        self.timer_ms = self.timer_ms.saturating_add(interval_ms).min(TIMER_MAX);

        // A negative threshold mirrors the gesture for the other wrist.
        let (threshold, dy) = if cfg.threshold < 0 {
            (-cfg.threshold, -sample.delta.y)
        } else {
            (cfg.threshold, sample.delta.y)
        };

        if dy > threshold {
            self.timer_ms = 0;
            return false;
        }

        if dy < -threshold && self.timer_ms < cfg.timeout_ms && sample.xyz.y < cfg.max_y {
            self.timer_ms = TIMER_MAX;
            return true;
        }
        false
    }
}
