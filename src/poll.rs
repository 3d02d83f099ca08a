// wristhub — Poll Scheduler
//
// One `tick` per poll interval, in producer context. Order per tick:
//   1. pick up config changes and kick the watchdog
//   2. advance inactivity, home-button and charger timers, queue timeouts
//   3. if the bus is free: accelerometer pipeline and detectors, then any
//      powered compass / barometer / HRM
// Nothing here blocks. A busy bus skips the sensor phase; busy slots hold
// accel results until the next tick.

use std::sync::Arc;

use crate::accel::AccelPipeline;
use crate::config::*;
use crate::detect::{tap, FaceUpDetector, GestureDetector, TapEvent, TwistDetector};
use crate::drivers::{Board, Clock, Drivers, SensorDriver};
use crate::flags::{DeviceFlag, Task, TaskSet};
use crate::health::StepCounter;
use crate::state::{EventSlots, Shared, GESTURE_PAYLOAD_LEN};
use crate::timeout::{self, ChargeMonitor, HoldTimer, WakeReason};

/// Power-save idle tracking. Interval changes are only requested here; the
/// consumer applies them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerSaveTimer {
    still_ms: u32,
}

impl PowerSaveTimer {
    pub fn update(&mut self, diff: u32, interval_ms: u32) -> Option<Task> {
        if diff > POWER_SAVE_MIN_DIFF {
            self.still_ms = 0;
            return (interval_ms == POWER_SAVE_POLL_INTERVAL_MS).then_some(Task::IntervalDefault);
        }
        self.still_ms = self.still_ms.saturating_add(interval_ms).min(TIMER_MAX);
        (self.still_ms >= POWER_SAVE_TIMEOUT_MS && interval_ms == DEFAULT_POLL_INTERVAL_MS)
            .then_some(Task::IntervalPowerSave)
    }
}

pub struct Poller {
    shared: Arc<Shared>,
    board: Option<Box<dyn Board>>,
    clock: Box<dyn Clock>,
    steps: Box<dyn StepCounter>,

    config: HubConfig,
    config_epoch: u32,

    pipeline: AccelPipeline,
    gesture: GestureDetector,
    twist: TwistDetector,
    face_up: FaceUpDetector,
    power_save: PowerSaveTimer,
    home: HoldTimer,
    charge: ChargeMonitor,
    carry: CarryOver,
}

impl Poller {
    pub(crate) fn new(
        shared: Arc<Shared>,
        board: Option<Box<dyn Board>>,
        clock: Box<dyn Clock>,
        steps: Box<dyn StepCounter>,
    ) -> Self {
        let config = shared.config();
        Self {
            shared,
            board,
            clock,
            steps,
            config,
            config_epoch: 0,
            pipeline: AccelPipeline::new(),
            gesture: GestureDetector::new(),
            twist: TwistDetector::new(),
            face_up: FaceUpDetector::new(),
            power_save: PowerSaveTimer::default(),
            home: HoldTimer::default(),
            charge: ChargeMonitor::default(),
            carry: CarryOver::default(),
        }
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Current interval, for the timer driving `tick`.
    pub fn interval_ms(&self) -> u32 {
        self.shared.poll_interval_ms()
    }

    /// Run one scheduler tick. Returns false when the bus was busy and the
    /// sensor phase was skipped.
    pub fn tick(&mut self) -> bool {
        self.shared.refresh_config(&mut self.config, &mut self.config_epoch);
        let interval = self.shared.poll_interval_ms();

        // BTN1+BTN2 held is the reset gesture: let the watchdog bite.
        let reset_held = self.shared.button_pressed(1) && self.shared.button_pressed(2);
        if let Some(board) = self.board.as_deref_mut() {
            if !reset_held {
                board.kick_watchdog();
            }
        }

        self.advance_timers(interval);

        let shared = Arc::clone(&self.shared);
        let Some(mut drivers) = shared.bus.try_acquire() else {
            log::trace!("bus busy, sensor phase skipped");
            return false;
        };
        self.poll_accel(&mut drivers, interval);
        self.poll_secondary(&mut drivers);
        true
    }

    fn advance_timers(&mut self, interval: u32) {
        let shared = &self.shared;
        let inactivity = shared.inactivity.advance(interval);

        let home = shared.button_pressed(HOME_BUTTON);
        if self.home.update(home, interval, self.config.timeouts.btn_load_ms) {
            log::info!("home button held, reload requested");
            shared.pending.set(Task::Reload);
        }

        let raw_charging = self.board.as_deref().is_some_and(|b| b.is_charging());
        if let Some(charging) = self.charge.update(raw_charging, interval) {
            if let Some(mut slots) = shared.try_slots() {
                slots.charging = charging;
                shared.pending.set(Task::Charging);
            }
        }

        let due = timeout::due_transitions(&self.config.timeouts, &shared.flags, inactivity);
        if due.contains(Task::Lock) {
            shared.wake_reason.store(WakeReason::Timeout);
        }
        shared.pending.set_all(due);
    }

    fn poll_accel(&mut self, drivers: &mut Drivers, interval: u32) {
        let tap_table = drivers.tap_table;
        let Some(accel) = drivers.accel.as_deref_mut() else {
            return;
        };
        let Some(reading) = read_fresh(accel, "accelerometer") else {
            return;
        };

        let sample = self.pipeline.push(reading.xyz);
        let shared = &self.shared;
        let flags = &shared.flags;
        let mut queued = TaskSet::EMPTY;

        if flags.contains(DeviceFlag::PowerSave) {
            if let Some(task) = self.power_save.update(sample.diff, interval) {
                queued.insert(task);
            }
        }

        if self.twist.update(&self.config.twist, &sample, interval) {
            log::debug!("twist");
            queued.insert(Task::Twist);
            shared.inactivity.reset();
            if flags.contains(DeviceFlag::WakeOnTwist) {
                shared.wake(WakeReason::Twist);
            }
        }

        let face_up = self.face_up.update(sample.xyz, interval);
        if face_up == Some(true) && flags.contains(DeviceFlag::WakeOnFaceUp) {
            shared.wake(WakeReason::FaceUp);
        }

        let double_tap = reading.tap.is_some_and(|t| t.double);
        if double_tap && flags.contains(DeviceFlag::WakeOnDoubleTap) {
            shared.wake(WakeReason::DoubleTap);
        }

        if let Some(done) = self.gesture.update(&self.config.gesture, sample.diff_squared) {
            // Copy now: the history ring moves on while the slots are busy.
            let mut payload = heapless::Vec::new();
            self.pipeline.copy_window(done.len, done.tail, &mut payload);
            self.carry.gesture = Some(payload);
        }
        if let Some(raw) = reading.tap {
            self.carry.tap = Some(tap::classify(tap_table, raw, sample.xyz));
        }
        if face_up.is_some() {
            self.carry.face_up = face_up;
        }
        let steps = self.steps.push(sample.mag_squared);
        self.carry.add_sample(sample.diff, steps);

        // Payload-carrying tasks are only queued once their slot is written.
        if let Some(mut slots) = shared.try_slots() {
            let slots: &mut EventSlots = &mut slots;
            self.carry
                .flush(slots, &mut queued, self.clock.now_ms(), self.clock.utc_offset_minutes());
            if flags.contains(DeviceFlag::AccelListener) {
                slots.accel = sample;
                queued.insert(Task::AccelData);
            }
        } else {
            log::trace!("slots busy, accel results held for next tick");
        }
        shared.pending.set_all(queued);
    }

    fn poll_secondary(&mut self, drivers: &mut Drivers) {
        let shared = &self.shared;
        let flags = &shared.flags;

        if flags.contains(DeviceFlag::CompassOn) {
            if let Some(mag) = drivers.compass.as_deref_mut().and_then(|d| read_fresh(d, "compass")) {
                if let Some(mut slots) = shared.try_slots() {
                    slots.mag = mag;
                    shared.pending.set(Task::MagData);
                }
            }
        }

        if flags.contains(DeviceFlag::BarometerOn) {
            if let Some(p) = drivers.barometer.as_deref_mut().and_then(|d| read_fresh(d, "barometer")) {
                if let Some(mut slots) = shared.try_slots() {
                    slots.pressure = Some(p);
                    shared.pending.set(Task::PressureData);
                }
            }
        }

        if flags.contains(DeviceFlag::HrmOn) {
            if let Some(hrm) = drivers.hrm.as_deref_mut().and_then(|d| read_fresh(d, "HRM")) {
                if let Some(mut slots) = shared.try_slots() {
                    slots.health.merge_hrm(hrm.bpm, hrm.confidence);
                    slots.hrm = Some(hrm);
                    shared.pending.set(Task::HrmData);
                }
            }
        }
    }
}

/// Detector output and health deltas waiting for the slots. Detectors
/// report once, so nothing here may be dropped when `try_slots` fails.
#[derive(Debug, Default)]
struct CarryOver {
    tap: Option<TapEvent>,
    gesture: Option<heapless::Vec<i8, GESTURE_PAYLOAD_LEN>>,
    face_up: Option<bool>,
    steps: u32,
    movement: u32,
    movement_samples: u32,
}

impl CarryOver {
    fn add_sample(&mut self, diff: u32, steps: u32) {
        self.movement = self.movement.saturating_add(diff);
        self.movement_samples = self.movement_samples.saturating_add(1);
        self.steps = self.steps.saturating_add(steps);
    }

    fn flush(&mut self, slots: &mut EventSlots, queued: &mut TaskSet, now_ms: i64, utc_offset: i32) {
        if let Some(tap) = self.tap.take() {
            slots.tap = Some(tap);
            queued.insert(Task::AccelTapped);
        }
        if let Some(gesture) = self.gesture.take() {
            slots.gesture = gesture;
            queued.insert(Task::GestureData);
        }
        if let Some(up) = self.face_up.take() {
            slots.face_up = up;
            queued.insert(Task::FaceUp);
        }

        let rollover = slots.health.rotate(now_ms, utc_offset);
        if rollover.bucket {
            queued.insert(Task::Health);
        }
        if rollover.day {
            log::info!("day rollover");
            queued.insert(Task::Midnight);
        }
        slots
            .health
            .add_movement_batch(self.movement, self.movement_samples);
        if self.steps > 0 {
            slots.health.add_steps(self.steps);
            queued.insert(Task::Step);
        }
        self.movement = 0;
        self.movement_samples = 0;
        self.steps = 0;
    }
}

/// Poll a driver and read its sample if one is ready. Failures are logged
/// and treated as "no data this tick".
fn read_fresh<D>(driver: &mut D, what: &str) -> Option<D::Sample>
where
    D: SensorDriver + ?Sized,
{
    match driver.poll_for_new_data() {
        Ok(true) => {}
        Ok(false) => return None,
        Err(e) => {
            log::warn!("{} poll failed: {:#}", what, e);
            return None;
        }
    }
    match driver.read_sample() {
        Ok(sample) => Some(sample),
        Err(e) => {
            log::warn!("{} read failed: {:#}", what, e);
            None
        }
    }
}
