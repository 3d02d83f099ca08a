// wristhub — Simulated Collaborators
//
// Scripted stand-ins for every hardware seam, so the hub can run on a host.
// Each handle is cheap to clone; the clone kept by a test observes the one
// moved into the hub.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use serde_json::Value;

use super::{BatterySense, Board, Clock, DisplayPanel, PowerControl, SensorDriver};
use crate::events::EventSink;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

struct Script<T> {
    queue: VecDeque<T>,
    fail_inits: u32,
    init_attempts: u32,
    inits: u32,
    offs: u32,
    powered: bool,
}

/// Sensor that hands out queued samples, one per poll.
pub struct ScriptedSensor<T> {
    script: Arc<Mutex<Script<T>>>,
}

impl<T> Clone for ScriptedSensor<T> {
    fn clone(&self) -> Self {
        Self { script: Arc::clone(&self.script) }
    }
}

impl<T> Default for ScriptedSensor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ScriptedSensor<T> {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                queue: VecDeque::new(),
                fail_inits: 0,
                init_attempts: 0,
                inits: 0,
                offs: 0,
                powered: false,
            })),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script<T>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, sample: T) {
        self.script().queue.push_back(sample);
    }

    pub fn extend(&self, samples: impl IntoIterator<Item = T>) {
        self.script().queue.extend(samples);
    }

    pub fn queued(&self) -> usize {
        self.script().queue.len()
    }

    /// Make the next `n` init calls fail.
    pub fn fail_next_inits(&self, n: u32) {
        self.script().fail_inits = n;
    }

    pub fn init_attempts(&self) -> u32 {
        self.script().init_attempts
    }

    pub fn inits(&self) -> u32 {
        self.script().inits
    }

    pub fn offs(&self) -> u32 {
        self.script().offs
    }

    pub fn is_powered(&self) -> bool {
        self.script().powered
    }
}

impl<T: Send> PowerControl for ScriptedSensor<T> {
    fn init(&mut self, _first_run: bool) -> anyhow::Result<()> {
        let mut s = self.script();
        s.init_attempts += 1;
        if s.fail_inits > 0 {
            s.fail_inits -= 1;
            return Err(anyhow!("simulated init failure"));
        }
        s.inits += 1;
        s.powered = true;
        Ok(())
    }

    fn off(&mut self) -> anyhow::Result<()> {
        let mut s = self.script();
        s.offs += 1;
        s.powered = false;
        Ok(())
    }
}

impl<T: Send> SensorDriver for ScriptedSensor<T> {
    type Sample = T;

    fn poll_for_new_data(&mut self) -> anyhow::Result<bool> {
        Ok(!self.script().queue.is_empty())
    }

    fn read_sample(&mut self) -> anyhow::Result<T> {
        self.script()
            .queue
            .pop_front()
            .ok_or_else(|| anyhow!("no sample queued"))
    }
}

/// Power-only device (the GPS receiver) counting its switch calls.
#[derive(Debug, Clone, Default)]
pub struct SimPower {
    inits: Arc<AtomicU32>,
    offs: Arc<AtomicU32>,
}

impl SimPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inits(&self) -> u32 {
        self.inits.load(Ordering::Acquire)
    }

    pub fn offs(&self) -> u32 {
        self.offs.load(Ordering::Acquire)
    }
}

impl PowerControl for SimPower {
    fn init(&mut self, _first_run: bool) -> anyhow::Result<()> {
        self.inits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn off(&mut self) -> anyhow::Result<()> {
        self.offs.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Board, clock, panel, battery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    kicks: Arc<AtomicU32>,
    charging: Arc<AtomicBool>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watchdog_kicks(&self) -> u32 {
        self.kicks.load(Ordering::Acquire)
    }

    pub fn set_charging(&self, on: bool) {
        self.charging.store(on, Ordering::Release);
    }
}

impl Board for SimBoard {
    fn kick_watchdog(&mut self) {
        self.kicks.fetch_add(1, Ordering::AcqRel);
    }

    fn is_charging(&self) -> bool {
        self.charging.load(Ordering::Acquire)
    }
}

/// Manually advanced wall clock.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ms: Arc<AtomicI64>,
    offset_min: Arc<AtomicI32>,
}

impl SimClock {
    pub fn at(now_ms: i64) -> Self {
        let clock = Self::default();
        clock.set(now_ms);
        clock
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::Release);
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::AcqRel);
    }

    pub fn set_utc_offset_minutes(&self, minutes: i32) {
        self.offset_min.store(minutes, Ordering::Release);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn utc_offset_minutes(&self) -> i32 {
        self.offset_min.load(Ordering::Acquire)
    }
}

/// Panel recording every power call as `("lcd" | "backlight", on)`.
#[derive(Debug, Clone, Default)]
pub struct SimPanel {
    calls: Arc<Mutex<Vec<(&'static str, bool)>>>,
}

impl SimPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(&'static str, bool)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, what: &'static str, on: bool) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((what, on));
    }
}

impl DisplayPanel for SimPanel {
    fn set_lcd_power(&mut self, on: bool) -> anyhow::Result<()> {
        self.record("lcd", on);
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> anyhow::Result<()> {
        self.record("backlight", on);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedBattery(pub f32);

impl BatterySense for FixedBattery {
    fn voltage(&mut self) -> anyhow::Result<f32> {
        Ok(self.0)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<(String, Value)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[(String, Value)] {
        &self.events
    }

    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Payloads of every event called `name`.
    pub fn payloads(&self, name: &str) -> Vec<&Value> {
        self.events
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, name: &str, payload: Value) {
        self.events.push((name.to_owned(), payload));
    }
}
