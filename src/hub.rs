// wristhub — Sensor Hub (consumer-side API)
//
// Everything the host runtime calls lives here. These methods run in the
// consumer context: they may block on the bus, allocate and call drivers.
// The poll side is `Poller`, the interrupt side `InputManager`.

use std::sync::Arc;

use serde_json::Value;

use crate::battery::battery_percent;
use crate::config::*;
use crate::drivers::{with_retries, BatterySense, Board, Clock, DisplayPanel, Drivers, SystemClock};
use crate::error::HubError;
use crate::flags::{DeviceFlag, Task};
use crate::health::{HealthRange, HealthState, StepCounter, ThresholdStepCounter};
use crate::input::InputManager;
use crate::poll::Poller;
use crate::power::{Peripheral, PowerArbiter, Requester};
use crate::state::Shared;
use crate::timeout::{self, WakeReason};

/// Requester id held while a one-shot pressure read is outstanding.
pub const PRESSURE_REQUESTER: &str = "getPressure";

/// Barometer reading as delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureEvent {
    pub pressure_hpa: f64,
    pub temperature_c: f64,
    pub altitude_m: f64,
}

impl PressureEvent {
    pub fn from_reading(pressure_hpa: f64, temperature_c: f64) -> Self {
        let altitude_m = 44330.0 * (1.0 - (pressure_hpa / SEA_LEVEL_HPA).powf(1.0 / 5.255));
        Self { pressure_hpa, temperature_c, altitude_m }
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "pressure": self.pressure_hpa,
            "temperature": self.temperature_c,
            "altitude": self.altitude_m,
        })
    }
}

pub type PressureCallback = Box<dyn FnOnce(PressureEvent) + Send>;

pub struct SensorHub {
    pub(crate) shared: Arc<Shared>,
    pub(crate) arbiter: PowerArbiter,
    pub(crate) panel: Option<Box<dyn DisplayPanel>>,
    battery: Option<Box<dyn BatterySense>>,
    pub(crate) settings: Settings,
    pub(crate) pressure_waiters: Vec<PressureCallback>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct HubBuilder {
    drivers: Drivers,
    panel: Option<Box<dyn DisplayPanel>>,
    board: Option<Box<dyn Board>>,
    clock: Option<Box<dyn Clock>>,
    battery: Option<Box<dyn BatterySense>>,
    steps: Option<Box<dyn StepCounter>>,
    settings: Settings,
}

impl HubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drivers(mut self, drivers: Drivers) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn panel(mut self, panel: impl DisplayPanel + 'static) -> Self {
        self.panel = Some(Box::new(panel));
        self
    }

    pub fn board(mut self, board: impl Board + 'static) -> Self {
        self.board = Some(Box::new(board));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn battery(mut self, battery: impl BatterySense + 'static) -> Self {
        self.battery = Some(Box::new(battery));
        self
    }

    pub fn step_counter(mut self, steps: impl StepCounter + 'static) -> Self {
        self.steps = Some(Box::new(steps));
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Bring up the accelerometer and split the hub into its three contexts.
    pub fn build(mut self) -> (SensorHub, Poller, InputManager) {
        if let Some(accel) = self.drivers.accel.as_deref_mut() {
            if let Err(e) = accel.init(true) {
                log::error!("accelerometer init failed: {:#}", e);
            }
        }

        let shared = Arc::new(Shared::new(self.drivers));
        shared.flags.set(DeviceFlag::EnableBeep, self.settings.beep);
        shared.flags.set(DeviceFlag::EnableBuzz, self.settings.buzz);

        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(SystemClock { utc_offset_minutes: 0 }));
        let steps = self
            .steps
            .unwrap_or_else(|| Box::new(ThresholdStepCounter::new()));
        let poller = Poller::new(shared.clone(), self.board, clock, steps);
        let input = InputManager::new(shared.clone(), self.settings.touch);

        let hub = SensorHub {
            shared,
            arbiter: PowerArbiter::new(),
            panel: self.panel,
            battery: self.battery,
            settings: self.settings,
            pressure_waiters: Vec::new(),
        };
        log::info!("sensor hub ready, poll interval {} ms", DEFAULT_POLL_INTERVAL_MS);
        (hub, poller, input)
    }
}

impl SensorHub {
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Device power
    // -----------------------------------------------------------------------

    /// Ask for `device` on or off on behalf of `requester`. Returns whether
    /// the device is now on. Absent hardware always answers `false`.
    pub fn set_power(
        &mut self,
        device: Peripheral,
        requester: &Requester,
        on: bool,
    ) -> Result<bool, HubError> {
        let mut drivers = self.shared.bus.acquire();
        if !drivers.is_fitted(device) {
            return Ok(false);
        }

        let want = self.arbiter.request_power(device.name(), requester, on);
        let flag = device.power_flag();
        if want == self.shared.flags.contains(flag) {
            return Ok(want);
        }

        log::info!("{} power {}", device, if want { "on" } else { "off" });
        let result = with_retries(device, DEVICE_RETRY_COUNT, || {
            drivers.switch(device, want).unwrap_or(Ok(()))
        });
        // The commanded state stands even when the driver gave up.
        self.shared.flags.set(flag, want);
        result.map(|()| want)
    }

    /// Name-keyed form of `set_power` for host bindings.
    pub fn request_power(
        &mut self,
        device: &str,
        requester: &Requester,
        on: bool,
    ) -> Result<bool, HubError> {
        match Peripheral::from_name(device) {
            Some(p) => self.set_power(p, requester, on),
            None => Ok(false),
        }
    }

    pub fn query_power(&self, device: &str) -> bool {
        self.arbiter.query_power(device)
    }

    pub fn is_on(&self, device: Peripheral) -> bool {
        self.shared.flags.contains(device.power_flag())
    }

    /// Force every peripheral off and forget all requesters.
    pub fn teardown(&mut self) {
        for device in Peripheral::ALL {
            if self.is_on(device) {
                if let Err(e) = self.set_power(device, &Requester::Force, false) {
                    log::warn!("teardown: {}", e);
                }
            }
        }
        self.arbiter.clear();
        self.pressure_waiters.clear();
        self.shared.flags.remove(DeviceFlag::AccelListener);
        log::info!("sensor hub torn down");
    }

    // -----------------------------------------------------------------------
    // Options
    // -----------------------------------------------------------------------

    /// Apply a partial option object. Invalid input changes nothing.
    pub fn set_options(&mut self, value: Value) -> Result<(), HubError> {
        let opts = HubOptions::from_value(value)?;
        if let Some(ms) = opts.poll_interval {
            validate_poll_interval(ms)?;
        }

        self.shared.update_config(|cfg| opts.merge_into(cfg));

        let flags = &self.shared.flags;
        let wake_opts = [
            (opts.wake_on_btn1, DeviceFlag::WakeOnBtn1),
            (opts.wake_on_btn2, DeviceFlag::WakeOnBtn2),
            (opts.wake_on_btn3, DeviceFlag::WakeOnBtn3),
            (opts.wake_on_face_up, DeviceFlag::WakeOnFaceUp),
            (opts.wake_on_touch, DeviceFlag::WakeOnTouch),
            (opts.wake_on_double_tap, DeviceFlag::WakeOnDoubleTap),
            (opts.wake_on_twist, DeviceFlag::WakeOnTwist),
        ];
        for (value, flag) in wake_opts {
            if let Some(on) = value {
                flags.set(flag, on);
            }
        }

        if let Some(on) = opts.power_save {
            flags.set(DeviceFlag::PowerSave, on);
            if !on && self.shared.poll_interval_ms() == POWER_SAVE_POLL_INTERVAL_MS {
                self.shared.pending.set(Task::IntervalDefault);
            }
        }
        if let Some(ms) = opts.poll_interval {
            self.set_poll_interval(ms)?;
        }
        Ok(())
    }

    /// Every option with its current value.
    pub fn options(&self) -> HubOptions {
        let cfg = self.shared.config();
        let flags = &self.shared.flags;
        HubOptions {
            lock_timeout: Some(cfg.timeouts.lock_ms),
            lcd_power_timeout: Some(cfg.timeouts.lcd_power_ms),
            backlight_timeout: Some(cfg.timeouts.backlight_ms),
            btn_load_timeout: Some(cfg.timeouts.btn_load_ms),
            wake_on_btn1: Some(flags.contains(DeviceFlag::WakeOnBtn1)),
            wake_on_btn2: Some(flags.contains(DeviceFlag::WakeOnBtn2)),
            wake_on_btn3: Some(flags.contains(DeviceFlag::WakeOnBtn3)),
            wake_on_face_up: Some(flags.contains(DeviceFlag::WakeOnFaceUp)),
            wake_on_touch: Some(flags.contains(DeviceFlag::WakeOnTouch)),
            wake_on_double_tap: Some(flags.contains(DeviceFlag::WakeOnDoubleTap)),
            wake_on_twist: Some(flags.contains(DeviceFlag::WakeOnTwist)),
            twist_threshold: Some(cfg.twist.threshold),
            twist_max_y: Some(cfg.twist.max_y),
            twist_timeout: Some(cfg.twist.timeout_ms),
            gesture_start_thresh: Some(cfg.gesture.start_thresh),
            gesture_end_thresh: Some(cfg.gesture.end_thresh),
            gesture_inactive_count: Some(cfg.gesture.inactive_count),
            gesture_min_length: Some(cfg.gesture.min_length),
            power_save: Some(flags.contains(DeviceFlag::PowerSave)),
            poll_interval: Some(self.shared.poll_interval_ms()),
        }
    }

    /// Fixed poll interval. Turns power save off so it sticks.
    pub fn set_poll_interval(&mut self, ms: u32) -> Result<(), HubError> {
        validate_poll_interval(ms)?;
        self.shared.flags.remove(DeviceFlag::PowerSave);
        self.shared.set_poll_interval_ms(ms);
        log::info!("poll interval set to {} ms", ms);
        Ok(())
    }

    pub fn poll_interval_ms(&self) -> u32 {
        self.shared.poll_interval_ms()
    }

    /// One timeout for display, backlight and lock. Zero disables all three.
    pub fn set_lcd_timeout(&mut self, ms: u32) {
        self.shared.update_config(|cfg| {
            cfg.timeouts.lcd_power_ms = ms;
            cfg.timeouts.backlight_ms = ms;
            cfg.timeouts.lock_ms = ms;
        });
    }

    // -----------------------------------------------------------------------
    // Display & lock
    // -----------------------------------------------------------------------

    pub fn set_lcd_power(&mut self, on: bool) {
        if on {
            self.shared.wake(WakeReason::Api);
        }
        self.apply_lcd_power(on);
        self.shared.pending.set(if on { Task::LcdOn } else { Task::LcdOff });
    }

    pub fn set_backlight(&mut self, on: bool) {
        if on {
            self.shared.inactivity.reset();
        }
        self.apply_backlight(on, false);
        self.shared.pending.set(if on { Task::BacklightOn } else { Task::BacklightOff });
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.shared.wake_reason.store(WakeReason::Api);
        self.shared.flags.set(DeviceFlag::Locked, locked);
        self.shared.pending.set(if locked { Task::Lock } else { Task::Unlock });
    }

    pub fn is_lcd_on(&self) -> bool {
        self.shared.flags.contains(DeviceFlag::LcdOn)
    }

    pub fn is_backlight_on(&self) -> bool {
        self.shared.flags.contains(DeviceFlag::BacklightOn)
    }

    pub fn is_locked(&self) -> bool {
        self.shared.flags.contains(DeviceFlag::Locked)
    }

    pub(crate) fn apply_lcd_power(&mut self, on: bool) {
        self.shared.flags.set(DeviceFlag::LcdOn, on);
        if let Some(panel) = self.panel.as_deref_mut() {
            if let Err(e) = panel.set_lcd_power(on) {
                log::warn!("LCD power {}: {:#}", on, e);
            }
        }
    }

    /// `lock_queued` is set when a Lock is already on its way, so turning the
    /// backlight off must not queue a second one.
    pub(crate) fn apply_backlight(&mut self, on: bool, lock_queued: bool) {
        self.shared.flags.set(DeviceFlag::BacklightOn, on);
        if let Some(panel) = self.panel.as_deref_mut() {
            if let Err(e) = panel.set_backlight(on) {
                log::warn!("backlight {}: {:#}", on, e);
            }
        }
        if !on
            && !lock_queued
            && !self.is_locked()
            && timeout::backlight_off_locks(&self.shared.config().timeouts)
        {
            self.shared.wake_reason.store(WakeReason::Backlight);
            self.shared.pending.set(Task::Lock);
        }
    }

    // -----------------------------------------------------------------------
    // Sensors
    // -----------------------------------------------------------------------

    pub fn set_accel_listener(&mut self, on: bool) {
        self.shared.flags.set(DeviceFlag::AccelListener, on);
    }

    /// One-shot pressure read. Powers the barometer until the next reading
    /// arrives, then calls `callback`. Returns false without a barometer.
    pub fn get_pressure(&mut self, callback: PressureCallback) -> Result<bool, HubError> {
        if !self.set_power(Peripheral::Barometer, &Requester::from(PRESSURE_REQUESTER), true)? {
            return Ok(false);
        }
        self.pressure_waiters.push(callback);
        Ok(true)
    }

    pub fn step_count(&self) -> u32 {
        self.shared.slots().health.step_count()
    }

    pub fn set_step_count(&mut self, steps: u32) {
        self.shared.slots().health.set_step_count(steps);
    }

    pub fn health_status(&self, range: HealthRange) -> HealthState {
        self.shared.slots().health.status(range)
    }

    /// Battery level in percent; `None` without a battery monitor.
    pub fn battery_percent(&mut self) -> Option<u8> {
        let sense = self.battery.as_deref_mut()?;
        match sense.voltage() {
            Ok(v) => Some(battery_percent(v, self.settings.battery_full_voltage)),
            Err(e) => {
                log::warn!("battery read failed: {:#}", e);
                None
            }
        }
    }

    pub fn is_charging(&self) -> bool {
        self.shared.slots().charging
    }
}

fn validate_poll_interval(ms: u32) -> Result<(), HubError> {
    if (MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&ms) {
        Ok(())
    } else {
        Err(HubError::InvalidPollInterval(ms))
    }
}
