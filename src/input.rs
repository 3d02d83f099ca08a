// wristhub — Interrupt-Side Input Manager
//
// Debounced buttons, touch zones and GPS UART bytes. Everything here runs in
// producer context: it may only touch atomics, queue task bits and write
// slots through `try_lock`.

use std::sync::Arc;

use crate::config::*;
use crate::flags::{DeviceFlag, Task};
use crate::gps::{self, LineAssembler};
use crate::state::{Shared, TouchReport};
use crate::timeout::WakeReason;
use crate::touch::{self, TouchGesture, TouchZone, TouchZones};

/// Rejects edges closer than DEBOUNCE_MS to the previous accepted one.
#[derive(Debug, Clone, Copy, Default)]
struct Debouncer {
    pressed: bool,
    last_edge_ms: Option<u64>,
}

impl Debouncer {
    fn accept(&mut self, pressed: bool, now_ms: u64) -> bool {
        if pressed == self.pressed {
            return false;
        }
        if let Some(last) = self.last_edge_ms {
            if now_ms.saturating_sub(last) < DEBOUNCE_MS {
                return false;
            }
        }
        self.pressed = pressed;
        self.last_edge_ms = Some(now_ms);
        true
    }
}

pub struct InputManager {
    shared: Arc<Shared>,
    buttons: [Debouncer; BUTTON_COUNT as usize],
    zones: TouchZones,
    touch_cal: TouchCalibration,
    last_point: (i32, i32),
    /// Gesture that found the slots busy, with the point it ended at.
    pending_touch: Option<(TouchGesture, (i32, i32))>,
    gps: LineAssembler,
    /// A finished line was dropped since the last one stored.
    gps_lost: bool,
}

impl InputManager {
    pub fn new(shared: Arc<Shared>, touch_cal: TouchCalibration) -> Self {
        Self {
            shared,
            buttons: [Debouncer::default(); BUTTON_COUNT as usize],
            zones: TouchZones::new(),
            touch_cal,
            last_point: (0, 0),
            pending_touch: None,
            gps: LineAssembler::new(),
            gps_lost: false,
        }
    }

    /// Button edge from its GPIO interrupt. Returns true when the press was
    /// consumed by waking the display.
    pub fn button(&mut self, n: u8, pressed: bool, now_ms: u64) -> bool {
        let Some(state) = n
            .checked_sub(1)
            .and_then(|i| self.buttons.get_mut(i as usize))
        else {
            return false;
        };
        if !state.accept(pressed, now_ms) {
            return false;
        }

        self.shared.set_button(n, pressed);
        if !pressed {
            return false;
        }

        let flags = &self.shared.flags;
        let wake_flag = match n {
            1 => DeviceFlag::WakeOnBtn1,
            2 => DeviceFlag::WakeOnBtn2,
            _ => DeviceFlag::WakeOnBtn3,
        };
        if !flags.is_awake() && flags.contains(wake_flag) {
            self.shared.wake(WakeReason::Button);
            return true;
        }
        if !flags.contains(DeviceFlag::Locked) {
            self.shared.inactivity.reset();
        }
        false
    }

    /// Two-pad touch controller state.
    pub fn touch_pads(&mut self, left: bool, right: bool) {
        let zone = TouchZone::from_pads(left, right);
        let point = match zone {
            TouchZone::Left => (LCD_WIDTH / 4, LCD_HEIGHT / 2),
            TouchZone::Right => (LCD_WIDTH * 3 / 4, LCD_HEIGHT / 2),
            _ => (LCD_WIDTH / 2, LCD_HEIGHT / 2),
        };
        self.touch(zone, point);
    }

    /// Touchscreen report in raw controller coordinates.
    pub fn touch_point(&mut self, raw_x: i32, raw_y: i32, pressed: bool) {
        let point = touch::calibrate(&self.touch_cal, raw_x, raw_y);
        let zone = if pressed { TouchZone::from_x(point.0) } else { TouchZone::None };
        self.touch(zone, point);
    }

    fn touch(&mut self, zone: TouchZone, point: (i32, i32)) {
        self.flush_touch();
        let flags = &self.shared.flags;
        if zone != TouchZone::None {
            self.last_point = point;
            if !flags.is_awake() && flags.contains(DeviceFlag::WakeOnTouch) {
                self.shared.wake(WakeReason::Touch);
                // Swallow the rest of this contact.
                self.zones = TouchZones::new();
                return;
            }
        }
        if flags.contains(DeviceFlag::Locked) {
            self.zones = TouchZones::new();
            return;
        }

        let Some(gesture) = self.zones.update(zone) else {
            return;
        };
        self.shared.inactivity.reset();
        self.pending_touch = Some((gesture, self.last_point));
        self.flush_touch();
    }

    /// Store the waiting gesture if the slots are free; otherwise keep it
    /// for the next touch report.
    fn flush_touch(&mut self) {
        let Some((gesture, (x, y))) = self.pending_touch else {
            return;
        };
        let Some(mut slots) = self.shared.try_slots() else {
            log::trace!("touch held, slots busy");
            return;
        };
        match gesture {
            TouchGesture::Swipe(dir) => {
                slots.swipe = dir;
                self.shared.pending.set(Task::Swipe);
            }
            TouchGesture::Touch(zone) => {
                slots.touch = Some(TouchReport { zone, x, y });
                self.shared.pending.set(Task::Touch);
            }
        }
        drop(slots);
        self.pending_touch = None;
    }

    /// One byte from the GPS UART.
    pub fn gps_byte(&mut self, byte: u8) {
        if !self.shared.flags.contains(DeviceFlag::GpsOn) {
            return;
        }
        let Some(mut line) = self.gps.push(byte) else {
            return;
        };
        match self.shared.try_slots() {
            Some(mut slots) => {
                line.lost |= std::mem::take(&mut self.gps_lost);
                gps::store_line(&mut slots.gps, line);
                self.shared.pending.set(Task::GpsLine);
            }
            None => {
                log::trace!("GPS line dropped, slots busy");
                self.gps_lost = true;
            }
        }
    }
}
