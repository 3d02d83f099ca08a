// wristhub — Gesture Detector
//
// Start/stop recorder over the squared delta magnitude. Recording starts when
// the delta exceeds the start threshold and finishes after `inactive_count`
// consecutive quiet samples. Brief dips shorter than that are forgiven.

use crate::config::{GestureConfig, ACCEL_HISTORY_LEN};

/// A finished gesture, located relative to the newest history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureDone {
    /// Active samples, trailing quiet samples excluded.
    pub len: usize,
    /// Quiet samples recorded after the active part.
    pub tail: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GestureDetector {
    count: u8,
    idle_count: u8,
}

impl GestureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.count > 0
    }

    /// Feed one squared delta. Returns a gesture only when one finishes with
    /// a length in `[min_length, history capacity)`.
    pub fn update(&mut self, cfg: &GestureConfig, diff_squared: u32) -> Option<GestureDone> {
        if self.count == 0 {
            if diff_squared > cfg.start_thresh {
                self.count = 1;
                self.idle_count = 0;
            }
            return None;
        }

        self.count = self.count.saturating_add(1);
        if diff_squared < cfg.end_thresh {
            self.idle_count = self.idle_count.saturating_add(1);
        } else if self.idle_count < cfg.inactive_count {
            self.idle_count = 0;
        }

        if self.idle_count < cfg.inactive_count {
            return None;
        }

        let tail = self.idle_count as usize;
        let len = (self.count as usize).saturating_sub(tail);
        *self = Self::default();

        if len >= cfg.min_length as usize && len < ACCEL_HISTORY_LEN {
            Some(GestureDone { len, tail })
        } else {
            log::debug!("gesture of {} samples discarded", len);
            None
        }
    }
}
