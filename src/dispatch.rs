// wristhub — Task Dispatcher
//
// Once per idle pass: lock the slots, take the whole task mask, copy out the
// payloads those bits refer to, release the slots, then run each task's
// consumer-side action and emit exactly one event per bit in priority order.

use serde_json::{json, Value};

use crate::accel::{isqrt, AccelSample};
use crate::config::*;
use crate::detect::TapEvent;
use crate::drivers::{HrmReading, PressureReading, Vector3};
use crate::events::EventSink;
use crate::flags::{DeviceFlag, Task, TaskSet};
use crate::gps::GpsLine;
use crate::health::{HealthRange, HealthState};
use crate::hub::{PressureEvent, SensorHub, PRESSURE_REQUESTER};
use crate::power::{Peripheral, Requester};
use crate::state::{EventSlots, TouchReport};

/// Payloads copied out under the slot lock.
#[derive(Debug, Default)]
struct Snapshot {
    accel: AccelSample,
    tap: Option<TapEvent>,
    gesture: Vec<i8>,
    gps: Option<GpsLine>,
    pressure: Option<PressureReading>,
    mag: Vector3,
    hrm: Option<HrmReading>,
    swipe: i8,
    touch: Option<TouchReport>,
    face_up: bool,
    charging: bool,
    last_bucket: HealthState,
    previous_day: HealthState,
    step_count: u32,
}

impl Snapshot {
    fn take(slots: &mut EventSlots, tasks: TaskSet) -> Self {
        let mut snap = Snapshot {
            accel: slots.accel,
            mag: slots.mag,
            swipe: slots.swipe,
            face_up: slots.face_up,
            charging: slots.charging,
            last_bucket: slots.health.status(HealthRange::Last),
            previous_day: slots.health.previous_day(),
            step_count: slots.health.step_count(),
            ..Snapshot::default()
        };
        if tasks.contains(Task::AccelTapped) {
            snap.tap = slots.tap.take();
        }
        if tasks.contains(Task::GestureData) {
            snap.gesture = slots.gesture.to_vec();
        }
        if tasks.contains(Task::GpsLine) {
            snap.gps = slots.gps.take();
        }
        if tasks.contains(Task::PressureData) {
            snap.pressure = slots.pressure.take();
        }
        if tasks.contains(Task::HrmData) {
            snap.hrm = slots.hrm.take();
        }
        if tasks.contains(Task::Touch) {
            snap.touch = slots.touch.take();
        }
        snap
    }
}

impl SensorHub {
    /// Drain pending tasks into `sink`. Returns the number of events emitted.
    pub fn idle(&mut self, sink: &mut dyn EventSink) -> usize {
        let (tasks, snap) = {
            let mut slots = self.shared.slots();
            let tasks = self.shared.pending.take();
            if tasks.is_empty() {
                return 0;
            }
            let snap = Snapshot::take(&mut slots, tasks);
            (tasks, snap)
        };

        for task in tasks.iter() {
            let payload = self.run_task(task, tasks, &snap);
            sink.emit(task.event_name(), payload);
        }
        log::trace!("dispatched {} events", tasks.len());
        tasks.len()
    }

    fn run_task(&mut self, task: Task, batch: TaskSet, snap: &Snapshot) -> Value {
        let flags = &self.shared.flags;
        match task {
            Task::Reload => {
                self.shared.inactivity.reset();
                Value::Null
            }
            Task::LcdOn | Task::LcdOff => {
                let on = task == Task::LcdOn;
                self.apply_lcd_power(on);
                json!(on)
            }
            Task::BacklightOn | Task::BacklightOff => {
                let on = task == Task::BacklightOn;
                self.apply_backlight(on, batch.contains(Task::Lock));
                json!(on)
            }
            Task::Lock | Task::Unlock => {
                let locked = task == Task::Lock;
                flags.set(DeviceFlag::Locked, locked);
                json!({ "locked": locked, "reason": self.shared.wake_reason.load().as_str() })
            }
            Task::AccelData => accel_json(&snap.accel),
            Task::AccelTapped => match snap.tap {
                Some(tap) => json!({
                    "dir": tap.dir,
                    "double": tap.double,
                    "x": tap.xyz.x,
                    "y": tap.xyz.y,
                    "z": tap.xyz.z,
                }),
                None => Value::Null,
            },
            Task::GpsLine => match &snap.gps {
                Some(gps) => json!({ "line": gps.line.as_str(), "lost": gps.lost }),
                None => Value::Null,
            },
            Task::PressureData => match snap.pressure {
                Some(p) => {
                    let ev = PressureEvent::from_reading(p.pressure_hpa, p.temperature_c);
                    self.resolve_pressure_waiters(ev);
                    ev.to_json()
                }
                None => Value::Null,
            },
            Task::MagData => json!({ "x": snap.mag.x, "y": snap.mag.y, "z": snap.mag.z }),
            Task::GestureData => json!(snap.gesture),
            Task::HrmData => match snap.hrm {
                Some(h) => json!({ "bpm": h.bpm, "confidence": h.confidence }),
                None => Value::Null,
            },
            Task::Charging => json!(snap.charging),
            Task::Step => json!(snap.step_count),
            Task::Swipe => json!(snap.swipe),
            Task::Touch => match snap.touch {
                Some(t) => json!({ "button": t.zone as u8, "x": t.x, "y": t.y }),
                None => Value::Null,
            },
            Task::Twist => Value::Null,
            Task::FaceUp => json!(snap.face_up),
            Task::IntervalDefault => {
                self.shared.set_poll_interval_ms(DEFAULT_POLL_INTERVAL_MS);
                json!(DEFAULT_POLL_INTERVAL_MS)
            }
            Task::IntervalPowerSave => {
                // Power save may have been switched off since the request.
                if flags.contains(DeviceFlag::PowerSave) {
                    self.shared.set_poll_interval_ms(POWER_SAVE_POLL_INTERVAL_MS);
                    log::info!("no movement, entering power save");
                }
                json!(self.shared.poll_interval_ms())
            }
            Task::Health => snap.last_bucket.to_json(),
            Task::Midnight => snap.previous_day.to_json(),
        }
    }

    fn resolve_pressure_waiters(&mut self, ev: PressureEvent) {
        if self.pressure_waiters.is_empty() {
            return;
        }
        for callback in self.pressure_waiters.drain(..) {
            callback(ev);
        }
        let requester = Requester::from(PRESSURE_REQUESTER);
        if let Err(e) = self.set_power(Peripheral::Barometer, &requester, false) {
            log::warn!("releasing barometer: {}", e);
        }
    }
}

fn accel_json(s: &AccelSample) -> Value {
    let (x, y, z) = s.in_g();
    json!({
        "x": x,
        "y": y,
        "z": z,
        "diff": s.diff as f32 / ACCEL_LSB_PER_G,
        "mag": isqrt(s.mag_squared) as f32 / ACCEL_LSB_PER_G,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::RecordingSink;
    use crate::drivers::Drivers;

    #[test]
    fn empty_mask_emits_nothing() {
        let (mut hub, _poller, _input) = SensorHub::builder().drivers(Drivers::default()).build();
        let mut sink = RecordingSink::new();
        assert_eq!(hub.idle(&mut sink), 0);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn one_event_per_bit_in_priority_order() {
        let (mut hub, _poller, _input) = SensorHub::builder().build();
        let shared = hub.shared().clone();
        shared.pending.set(Task::Twist);
        shared.pending.set(Task::LcdOff);
        shared.pending.set(Task::Reload);

        let mut sink = RecordingSink::new();
        assert_eq!(hub.idle(&mut sink), 3);
        assert_eq!(sink.names(), vec!["reload", "lcdPower", "twist"]);
        assert!(shared.pending.peek().is_empty());
        assert!(!hub.is_lcd_on());
    }

    #[test]
    fn power_save_request_is_dropped_if_disabled_meanwhile() {
        let (mut hub, _poller, _input) = SensorHub::builder().build();
        hub.shared().pending.set(Task::IntervalPowerSave);
        hub.set_options(serde_json::json!({ "powerSave": false })).unwrap();

        let mut sink = RecordingSink::new();
        hub.idle(&mut sink);
        assert_eq!(hub.poll_interval_ms(), DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(sink.events()[0].1, json!(DEFAULT_POLL_INTERVAL_MS));
    }

    #[test]
    fn lock_event_carries_reason() {
        let (mut hub, _poller, _input) = SensorHub::builder().build();
        hub.set_locked(true);
        let mut sink = RecordingSink::new();
        hub.idle(&mut sink);
        assert_eq!(sink.events()[0], ("lock".to_owned(), json!({ "locked": true, "reason": "js" })));
        assert!(hub.is_locked());
    }
}
