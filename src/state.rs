// wristhub — State Shared Between Poll and Idle Contexts
//
// Producers only OR task bits, bump atomics, or write slots through
// `try_lock`. The consumer locks the slots before taking the task mask so a
// payload is never read without its bit or vice versa.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::accel::AccelSample;
use crate::bus::SharedBus;
use crate::config::*;
use crate::detect::TapEvent;
use crate::drivers::{Drivers, HrmReading, PressureReading, Vector3};
use crate::flags::{DeviceFlag, DeviceFlags, PendingTasks, Task, TaskSet, DEFAULT_FLAGS};
use crate::gps::GpsLine;
use crate::health::HealthAggregator;
use crate::timeout::{InactivityTimer, WakeReason, WakeReasonCell};
use crate::touch::TouchZone;

pub const GESTURE_PAYLOAD_LEN: usize = 3 * ACCEL_HISTORY_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchReport {
    pub zone: TouchZone,
    pub x: i32,
    pub y: i32,
}

/// Fixed-size payloads written by producers and read by the dispatcher.
#[derive(Debug, Default)]
pub struct EventSlots {
    pub accel: AccelSample,
    pub tap: Option<TapEvent>,
    pub gesture: heapless::Vec<i8, GESTURE_PAYLOAD_LEN>,
    pub gps: Option<GpsLine>,
    pub pressure: Option<PressureReading>,
    pub mag: Vector3,
    pub hrm: Option<HrmReading>,
    pub swipe: i8,
    pub touch: Option<TouchReport>,
    pub face_up: bool,
    pub charging: bool,
    pub health: HealthAggregator,
}

pub struct Shared {
    pub flags: DeviceFlags,
    pub pending: PendingTasks,
    pub inactivity: InactivityTimer,
    pub wake_reason: WakeReasonCell,
    pub bus: SharedBus<Drivers>,
    slots: Mutex<EventSlots>,
    poll_interval_ms: AtomicU32,
    buttons: AtomicU8,
    config: Mutex<HubConfig>,
    config_epoch: AtomicU32,
}

impl Shared {
    pub fn new(drivers: Drivers) -> Self {
        Self {
            flags: DeviceFlags::with(DEFAULT_FLAGS),
            pending: PendingTasks::default(),
            inactivity: InactivityTimer::default(),
            wake_reason: WakeReasonCell::default(),
            bus: SharedBus::new(drivers),
            slots: Mutex::new(EventSlots::default()),
            poll_interval_ms: AtomicU32::new(DEFAULT_POLL_INTERVAL_MS),
            buttons: AtomicU8::new(0),
            config: Mutex::new(HubConfig::default()),
            config_epoch: AtomicU32::new(0),
        }
    }

    // ---- poll interval ----------------------------------------------------

    pub fn poll_interval_ms(&self) -> u32 {
        self.poll_interval_ms.load(Ordering::Acquire)
    }

    pub(crate) fn set_poll_interval_ms(&self, ms: u32) {
        self.poll_interval_ms.store(ms, Ordering::Release);
    }

    // ---- buttons ----------------------------------------------------------

    pub fn button_pressed(&self, n: u8) -> bool {
        (1..=BUTTON_COUNT).contains(&n) && self.buttons.load(Ordering::Acquire) & (1 << (n - 1)) != 0
    }

    pub(crate) fn set_button(&self, n: u8, pressed: bool) {
        if !(1..=BUTTON_COUNT).contains(&n) {
            return;
        }
        let bit = 1 << (n - 1);
        if pressed {
            self.buttons.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.buttons.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    // ---- slots ------------------------------------------------------------

    /// Producer access. `None` while the consumer holds the slots.
    pub(crate) fn try_slots(&self) -> Option<MutexGuard<'_, EventSlots>> {
        match self.slots.try_lock() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Consumer access.
    pub(crate) fn slots(&self) -> MutexGuard<'_, EventSlots> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    // ---- config -----------------------------------------------------------

    pub fn config(&self) -> HubConfig {
        *self.config.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn update_config(&self, f: impl FnOnce(&mut HubConfig)) {
        let mut cfg = self.config.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut cfg);
        self.config_epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Copy the config into `cached` if it changed since `seen_epoch`.
    pub(crate) fn refresh_config(&self, cached: &mut HubConfig, seen_epoch: &mut u32) {
        let epoch = self.config_epoch.load(Ordering::Acquire);
        if epoch == *seen_epoch {
            return;
        }
        if let Ok(cfg) = self.config.try_lock() {
            *cached = *cfg;
            *seen_epoch = self.config_epoch.load(Ordering::Acquire);
        }
    }

    // ---- wake -------------------------------------------------------------

    /// Queue whatever is needed to bring the display fully awake.
    pub fn wake(&self, reason: WakeReason) {
        self.inactivity.reset();
        if self.flags.is_awake() {
            return;
        }

        let mut tasks = TaskSet::EMPTY;
        if !self.flags.contains(DeviceFlag::LcdOn) {
            tasks.insert(Task::LcdOn);
        }
        if !self.flags.contains(DeviceFlag::BacklightOn) {
            tasks.insert(Task::BacklightOn);
        }
        if self.flags.contains(DeviceFlag::Locked) {
            tasks.insert(Task::Unlock);
        }
        self.wake_reason.store(reason);
        self.pending.set_all(tasks);
    }
}
