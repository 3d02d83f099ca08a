// wristhub — Shared Bus Guard
//
// One I2C bus feeds every sensor. The busy flag is the gate: the poll tick
// only ever tries it and skips its sensor phase when it is held, while the
// consumer side may wait for it.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;

pub struct SharedBus<T> {
    busy: AtomicBool,
    inner: Mutex<T>,
}

impl<T> SharedBus<T> {
    pub fn new(inner: T) -> Self {
        Self {
            busy: AtomicBool::new(false),
            inner: Mutex::new(inner),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Non-blocking claim. `None` means another context holds the bus.
    pub fn try_acquire(&self) -> Option<BusGuard<'_, T>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let guard = match self.inner.try_lock() {
            Ok(g) => g,
            // A panicking holder leaves the drivers usable; the next tick retries.
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.busy.store(false, Ordering::Release);
                return None;
            }
        };
        Some(BusGuard { busy: &self.busy, guard })
    }

    /// Blocking claim for the consumer context.
    pub fn acquire(&self) -> BusGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_acquire() {
                return guard;
            }
            thread::yield_now();
        }
    }
}

pub struct BusGuard<'a, T> {
    busy: &'a AtomicBool,
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for BusGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for BusGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for BusGuard<'_, T> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
