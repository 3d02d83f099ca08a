// wristhub — Poll Task
//
// Producer thread: runs `Poller::tick` once per poll interval. The interval is
// re-read every tick, so a switch into or out of power save takes effect on
// the next sleep.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::*;
use crate::poll::Poller;

pub fn spawn_poll_task(
    mut poller: Poller,
    running: Arc<AtomicBool>,
) -> io::Result<JoinHandle<Poller>> {
    thread::Builder::new()
        .name("poll".into())
        .stack_size(STACK_POLL)
        .spawn(move || {
            log::info!("Poll task started");
            while running.load(Ordering::Acquire) {
                let tick_start = Instant::now();
                poller.tick();

                // Sleep for the remainder of the interval.
                let interval = Duration::from_millis(poller.interval_ms() as u64);
                let elapsed = tick_start.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }
            log::info!("Poll task stopped");
            poller
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimBoard;
    use crate::hub::SensorHub;

    #[test]
    fn thread_ticks_until_stopped() {
        let board = SimBoard::new();
        let (mut hub, poller, _input) = SensorHub::builder().board(board.clone()).build();
        hub.set_poll_interval(10).unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_poll_task(poller, running.clone()).unwrap();
        thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::Release);
        handle.join().unwrap();

        assert!(board.watchdog_kicks() >= 2);
    }
}
