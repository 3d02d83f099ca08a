// wristhub — Health & Step Aggregator
//
// Ten-minute buckets of movement, steps and best heart rate, plus a daily
// rollup. Rotation is driven by wall-clock time; the day boundary uses the
// local calendar date rather than the bucket index.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::accel::isqrt;
use crate::config::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    /// Bucket index (`wall_ms / HEALTH_INTERVAL_MS`) when this state started.
    pub index: i64,
    pub movement: u32,
    pub movement_samples: u32,
    pub steps: u32,
    /// Best heart rate seen, in tenths of a bpm.
    pub bpm_x10: u16,
    pub bpm_confidence: u8,
}

impl HealthState {
    fn starting_at(index: i64) -> Self {
        Self { index, ..Self::default() }
    }

    pub fn movement_avg(&self) -> u32 {
        if self.movement_samples == 0 {
            0
        } else {
            self.movement / self.movement_samples
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm_x10 as f32 / 10.0
    }

    fn add_movement(&mut self, sum: u32, samples: u32) {
        self.movement = self.movement.saturating_add(sum);
        self.movement_samples = self.movement_samples.saturating_add(samples);
    }

    fn merge_hrm(&mut self, bpm: f32, confidence: u8) {
        if confidence >= self.bpm_confidence {
            self.bpm_x10 = (bpm * 10.0).round().clamp(0.0, u16::MAX as f32) as u16;
            self.bpm_confidence = confidence;
        }
    }

    /// Event payload; movement is reported as the per-sample average.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "movement": self.movement_avg(),
            "steps": self.steps,
            "bpm": self.bpm(),
            "bpmConfidence": self.bpm_confidence,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthRange {
    Current,
    Last,
    Day,
}

/// What a rotation check found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rollover {
    pub bucket: bool,
    pub day: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HealthAggregator {
    current: HealthState,
    last: HealthState,
    daily: HealthState,
    previous_day: HealthState,
    day: Option<NaiveDate>,
    step_count: u32,
}

pub fn local_date(wall_ms: i64, utc_offset_minutes: i32) -> Option<NaiveDate> {
    let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))?;
    let utc = DateTime::from_timestamp_millis(wall_ms)?;
    Some(utc.with_timezone(&offset).date_naive())
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate buckets if `wall_ms` falls in a new one. The first call only
    /// stamps the current indices.
    pub fn rotate(&mut self, wall_ms: i64, utc_offset_minutes: i32) -> Rollover {
        let index = wall_ms.div_euclid(HEALTH_INTERVAL_MS);
        let date = local_date(wall_ms, utc_offset_minutes);

        let Some(day) = self.day else {
            self.current = HealthState::starting_at(index);
            self.daily = HealthState::starting_at(index);
            self.day = date;
            return Rollover::default();
        };

        if index == self.current.index {
            return Rollover::default();
        }

        self.last = self.current;
        self.current = HealthState::starting_at(index);

        let day_changed = date.is_some_and(|d| d != day);
        if day_changed {
            self.previous_day = self.daily;
            self.daily = HealthState::starting_at(index);
            self.day = date;
        }
        Rollover { bucket: true, day: day_changed }
    }

    pub fn add_movement(&mut self, diff: u32) {
        self.add_movement_batch(diff, 1);
    }

    /// Movement from several samples at once, summed.
    pub fn add_movement_batch(&mut self, sum: u32, samples: u32) {
        self.current.add_movement(sum, samples);
        self.daily.add_movement(sum, samples);
    }

    pub fn add_steps(&mut self, steps: u32) {
        self.current.steps = self.current.steps.saturating_add(steps);
        self.daily.steps = self.daily.steps.saturating_add(steps);
        self.step_count = self.step_count.saturating_add(steps);
    }

    pub fn merge_hrm(&mut self, bpm: f32, confidence: u8) {
        self.current.merge_hrm(bpm, confidence);
        self.daily.merge_hrm(bpm, confidence);
    }

    pub fn status(&self, range: HealthRange) -> HealthState {
        match range {
            HealthRange::Current => self.current,
            HealthRange::Last => self.last,
            HealthRange::Day => self.daily,
        }
    }

    /// The daily rollup that was closed by the most recent day change.
    pub fn previous_day(&self) -> HealthState {
        self.previous_day
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn set_step_count(&mut self, steps: u32) {
        self.step_count = steps;
    }
}

// ---------------------------------------------------------------------------
// Step counting
// ---------------------------------------------------------------------------

/// Pluggable step algorithm fed once per accelerometer sample.
pub trait StepCounter: Send {
    /// Returns the number of new steps found in this sample.
    fn push(&mut self, mag_squared: u32) -> u32;
}

/// Peak detector on the acceleration magnitude around a slow gravity
/// baseline, with a re-arm dip and a minimum spacing between steps.
#[derive(Debug, Clone, Default)]
pub struct ThresholdStepCounter {
    baseline: Option<i32>,
    armed: bool,
    since_step: u32,
}

impl ThresholdStepCounter {
    pub fn new() -> Self {
        Self { baseline: None, armed: false, since_step: u32::MAX }
    }
}

impl StepCounter for ThresholdStepCounter {
    fn push(&mut self, mag_squared: u32) -> u32 {
        let mag = isqrt(mag_squared) as i32;
        let baseline = self.baseline.get_or_insert(mag);
        let dev = mag - *baseline;
        *baseline += (mag - *baseline) >> STEP_BASELINE_SHIFT;
        self.since_step = self.since_step.saturating_add(1);

        if self.armed && dev > STEP_PEAK_LSB && self.since_step >= STEP_MIN_SAMPLES {
            self.armed = false;
            self.since_step = 0;
            return 1;
        }
        if dev < STEP_REARM_LSB {
            self.armed = true;
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01T23:40:00Z, on a bucket boundary.
    const T0: i64 = 1_709_336_400_000;

    #[test]
    fn bucket_rotation_keeps_exact_sums() {
        let mut h = HealthAggregator::new();
        assert_eq!(h.rotate(T0, 0), Rollover::default());
        for d in [100, 200, 300] {
            h.add_movement(d);
        }
        h.add_steps(4);

        let r = h.rotate(T0 + HEALTH_INTERVAL_MS, 0);
        assert_eq!(r, Rollover { bucket: true, day: false });

        let last = h.status(HealthRange::Last);
        assert_eq!(last.movement, 600);
        assert_eq!(last.movement_samples, 3);
        assert_eq!(last.movement_avg(), 200);
        assert_eq!(last.steps, 4);
        assert_eq!(h.status(HealthRange::Current).movement, 0);
        assert_eq!(h.status(HealthRange::Day).movement, 600);
    }

    #[test]
    fn same_bucket_does_not_rotate() {
        let mut h = HealthAggregator::new();
        h.rotate(T0, 0);
        h.add_movement(5);
        assert_eq!(h.rotate(T0 + HEALTH_INTERVAL_MS - 1, 0), Rollover::default());
        assert_eq!(h.status(HealthRange::Current).movement, 5);
    }

    #[test]
    fn day_change_resets_daily_once() {
        let mut h = HealthAggregator::new();
        h.rotate(T0, 0);
        h.add_steps(10);

        // 23:50 same day, then 00:00 next day.
        assert!(!h.rotate(T0 + HEALTH_INTERVAL_MS, 0).day);
        h.add_steps(5);
        let r = h.rotate(T0 + 2 * HEALTH_INTERVAL_MS, 0);
        assert_eq!(r, Rollover { bucket: true, day: true });
        assert_eq!(h.previous_day().steps, 15);
        assert_eq!(h.status(HealthRange::Day).steps, 0);
        assert_eq!(h.step_count(), 15);

        assert!(!h.rotate(T0 + 3 * HEALTH_INTERVAL_MS, 0).day);
    }

    #[test]
    fn utc_offset_moves_midnight() {
        let mut h = HealthAggregator::new();
        // One hour east: T0 is already 00:40 on the next day locally.
        h.rotate(T0, 60);
        assert!(!h.rotate(T0 + 2 * HEALTH_INTERVAL_MS, 60).day);
    }

    #[test]
    fn heart_rate_keeps_most_confident() {
        let mut h = HealthAggregator::new();
        h.rotate(T0, 0);
        h.merge_hrm(72.0, 50);
        h.merge_hrm(90.0, 40);
        assert_eq!(h.status(HealthRange::Current).bpm_x10, 720);
        h.merge_hrm(65.5, 50);
        assert_eq!(h.status(HealthRange::Current).bpm_x10, 655);
        assert_eq!(h.status(HealthRange::Day).bpm_confidence, 50);
    }

    #[test]
    fn step_counter_counts_peaks() {
        let mut sc = ThresholdStepCounter::new();
        let g = 8192u32;
        let mut steps = 0;
        for _ in 0..20 {
            steps += sc.push(g * g);
        }
        assert_eq!(steps, 0);

        for _ in 0..5 {
            for v in [g - 1500, g, g + 2000, g] {
                steps += sc.push(v * v);
            }
        }
        assert_eq!(steps, 5);
    }
}
