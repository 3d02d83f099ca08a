// wristhub — Inactivity & Lock Timeout Manager
//
// Every timeout is a counter advanced by the poll interval and compared to a
// threshold; cancelling is resetting to zero. The poll tick only queues the
// transitions, the consumer applies them.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::config::*;
use crate::flags::{DeviceFlag, DeviceFlags, Task, TaskSet};

/// Milliseconds since the last qualifying input, saturating at TIMER_MAX.
#[derive(Debug, Default)]
pub struct InactivityTimer(AtomicU32);

impl InactivityTimer {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn advance(&self, ms: u32) -> u32 {
        let prev = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                Some(t.saturating_add(ms).min(TIMER_MAX))
            })
            .unwrap_or(TIMER_MAX);
        prev.saturating_add(ms).min(TIMER_MAX)
    }
}

/// Transitions due at the given inactivity level. A domain with a zero
/// threshold never times out.
pub fn due_transitions(cfg: &TimeoutConfig, flags: &DeviceFlags, inactivity_ms: u32) -> TaskSet {
    let mut due = TaskSet::EMPTY;
    if cfg.lcd_power_ms > 0 && flags.contains(DeviceFlag::LcdOn) && inactivity_ms >= cfg.lcd_power_ms
    {
        due.insert(Task::LcdOff);
    }
    if cfg.backlight_ms > 0
        && flags.contains(DeviceFlag::BacklightOn)
        && inactivity_ms >= cfg.backlight_ms
    {
        due.insert(Task::BacklightOff);
    }
    if cfg.lock_ms > 0 && !flags.contains(DeviceFlag::Locked) && inactivity_ms >= cfg.lock_ms {
        due.insert(Task::Lock);
    }
    due
}

/// Backlight-off also locks when the lock timeout is no longer than the
/// backlight one.
pub fn backlight_off_locks(cfg: &TimeoutConfig) -> bool {
    cfg.lock_ms > 0 && cfg.lock_ms <= cfg.backlight_ms
}

// ---------------------------------------------------------------------------
// Wake sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeReason {
    Button = 0,
    Twist,
    FaceUp,
    Touch,
    DoubleTap,
    Api,
    Timeout,
    Backlight,
}

impl WakeReason {
    const ALL: [WakeReason; 8] = [
        WakeReason::Button,
        WakeReason::Twist,
        WakeReason::FaceUp,
        WakeReason::Touch,
        WakeReason::DoubleTap,
        WakeReason::Api,
        WakeReason::Timeout,
        WakeReason::Backlight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Twist => "twist",
            Self::FaceUp => "faceUp",
            Self::Touch => "touch",
            Self::DoubleTap => "doubleTap",
            Self::Api => "js",
            Self::Timeout => "timeout",
            Self::Backlight => "backlight",
        }
    }
}

/// Last wake or lock reason, readable from both contexts.
#[derive(Debug)]
pub struct WakeReasonCell(AtomicU8);

impl Default for WakeReasonCell {
    fn default() -> Self {
        Self(AtomicU8::new(WakeReason::Api as u8))
    }
}

impl WakeReasonCell {
    pub fn store(&self, reason: WakeReason) {
        self.0.store(reason as u8, Ordering::Release);
    }

    pub fn load(&self) -> WakeReason {
        let raw = self.0.load(Ordering::Acquire);
        WakeReason::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(WakeReason::Api)
    }
}

// ---------------------------------------------------------------------------
// Per-tick hold timers (poll context only)
// ---------------------------------------------------------------------------

/// Home button held long enough → one reload request per press.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldTimer {
    held_ms: u32,
    fired: bool,
}

impl HoldTimer {
    pub fn update(&mut self, pressed: bool, interval_ms: u32, threshold_ms: u32) -> bool {
        if !pressed {
            *self = Self::default();
            return false;
        }
        self.held_ms = self.held_ms.saturating_add(interval_ms).min(TIMER_MAX);
        if threshold_ms > 0 && !self.fired && self.held_ms >= threshold_ms {
            self.fired = true;
            return true;
        }
        false
    }
}

/// Charger input debounced over CHARGE_SETTLE_MS.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChargeMonitor {
    reported: bool,
    settle_ms: u32,
}

impl ChargeMonitor {
    pub fn is_charging(&self) -> bool {
        self.reported
    }

    /// Returns the new state once a change has settled.
    pub fn update(&mut self, raw: bool, interval_ms: u32) -> Option<bool> {
        if raw == self.reported {
            self.settle_ms = 0;
            return None;
        }
        self.settle_ms = self.settle_ms.saturating_add(interval_ms);
        if self.settle_ms < CHARGE_SETTLE_MS {
            return None;
        }
        self.settle_ms = 0;
        self.reported = raw;
        Some(raw)
    }
}
