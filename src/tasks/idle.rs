// wristhub — Idle Loop
//
// Consumer side: drain the task mask into the host sink, then yield. Runs on
// whichever thread owns the host runtime (the main thread on the firmware).

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::IDLE_LOOP_PERIOD_MS;
use crate::events::EventSink;
use crate::hub::SensorHub;

/// `between` runs after every drain; the firmware samples its buttons there.
pub fn run_idle_loop(
    hub: &mut SensorHub,
    sink: &mut dyn EventSink,
    running: &AtomicBool,
    mut between: impl FnMut(&mut SensorHub),
) {
    log::info!("Idle loop started");
    let period = Duration::from_millis(IDLE_LOOP_PERIOD_MS);
    while running.load(Ordering::Acquire) {
        hub.idle(sink);
        between(hub);
        thread::sleep(period);
    }
    // Last drain so nothing queued before the stop is lost.
    hub.idle(sink);
    log::info!("Idle loop stopped");
}
