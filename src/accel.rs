// wristhub — Accelerometer Signal Pipeline
//
// Pure transform: raw sample in, derived values out, plus a short ring of
// quantized history for gesture payloads. No thresholds live here.

use crate::config::*;
use crate::drivers::Vector3;

/// Everything the detectors need from one accelerometer reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelSample {
    pub xyz: Vector3,
    pub delta: Vector3,
    /// Integer Euclidean norm of `delta`.
    pub diff: u32,
    /// Squared norm of the delta, what the gesture thresholds compare against.
    pub diff_squared: u32,
    /// Squared norm of the raw vector, fed to the step counter.
    pub mag_squared: u32,
}

impl AccelSample {
    /// Raw vector in g.
    pub fn in_g(&self) -> (f32, f32, f32) {
        (
            self.xyz.x as f32 / ACCEL_LSB_PER_G,
            self.xyz.y as f32 / ACCEL_LSB_PER_G,
            self.xyz.z as f32 / ACCEL_LSB_PER_G,
        )
    }
}

pub struct AccelPipeline {
    last: Option<Vector3>,
    history: [[i8; 3]; ACCEL_HISTORY_LEN],
    history_idx: usize,
    latest: AccelSample,
}

impl Default for AccelPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelPipeline {
    pub fn new() -> Self {
        Self {
            last: None,
            history: [[0; 3]; ACCEL_HISTORY_LEN],
            history_idx: 0,
            latest: AccelSample::default(),
        }
    }

    /// Feed one raw reading. The first reading after reset has a zero delta.
    pub fn push(&mut self, xyz: Vector3) -> AccelSample {
        let delta = match self.last {
            Some(prev) => xyz.sub(prev),
            None => Vector3::default(),
        };
        self.last = Some(xyz);

        let diff_squared = delta.norm_squared();
        let sample = AccelSample {
            xyz,
            delta,
            diff: isqrt(diff_squared),
            diff_squared,
            mag_squared: xyz.norm_squared(),
        };

        self.history[self.history_idx] = [quantize(xyz.x), quantize(xyz.y), quantize(xyz.z)];
        self.history_idx = (self.history_idx + 1) % ACCEL_HISTORY_LEN;
        self.latest = sample;
        sample
    }

    pub fn latest(&self) -> AccelSample {
        self.latest
    }

    /// Copy `len` history entries ending `skip_newest` entries before the
    /// newest one, oldest first, flattened as x,y,z triples.
    pub fn copy_window<const N: usize>(
        &self,
        len: usize,
        skip_newest: usize,
        out: &mut heapless::Vec<i8, N>,
    ) {
        out.clear();
        let len = len.min(ACCEL_HISTORY_LEN.saturating_sub(skip_newest));
        // history_idx points one past the newest entry.
        let end = self.history_idx + ACCEL_HISTORY_LEN - skip_newest % ACCEL_HISTORY_LEN;
        let start = end + ACCEL_HISTORY_LEN - len;
        for i in 0..len {
            let entry = self.history[(start + i) % ACCEL_HISTORY_LEN];
            if out.extend_from_slice(&entry).is_err() {
                return;
            }
        }
    }
}

fn quantize(v: i32) -> i8 {
    (v >> ACCEL_HISTORY_SHIFT).clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Floor of the square root.
pub fn isqrt(n: u32) -> u32 {
    if n < 2 {
        return n;
    }
    let mut x = (n as f64).sqrt() as u32;
    // Float rounding can land one off either way near perfect squares.
    while (x as u64) * (x as u64) > n as u64 {
        x -= 1;
    }
    while ((x + 1) as u64) * ((x + 1) as u64) <= n as u64 {
        x += 1;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_floors() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(u32::MAX), 65535);
    }

    #[test]
    fn delta_and_magnitudes() {
        let mut p = AccelPipeline::new();
        let first = p.push(Vector3::new(0, 0, -8192));
        assert_eq!(first.diff, 0);
        assert_eq!(first.mag_squared, 8192 * 8192);

        let s = p.push(Vector3::new(300, 400, -8192));
        assert_eq!(s.delta, Vector3::new(300, 400, 0));
        assert_eq!(s.diff, 500);
        assert_eq!(s.diff_squared, 250_000);
        assert_eq!(p.latest(), s);
        assert_eq!(s.in_g().2, -1.0);
    }

    #[test]
    fn history_quantizes_and_clips() {
        let mut p = AccelPipeline::new();
        p.push(Vector3::new(128, -256, 1 << 20));
        let mut out = heapless::Vec::<i8, 3>::new();
        p.copy_window(1, 0, &mut out);
        assert_eq!(out.as_slice(), &[1, -2, 127]);
    }

    #[test]
    fn window_skips_the_newest_entries_and_wraps() {
        let mut p = AccelPipeline::new();
        for i in 0..(ACCEL_HISTORY_LEN as i32 + 5) {
            p.push(Vector3::new(i << 7, 0, 0));
        }
        // Newest x is 54; skip two, take three: 50, 51, 52.
        let mut out = heapless::Vec::<i8, 150>::new();
        p.copy_window(3, 2, &mut out);
        let xs: Vec<i8> = out.chunks(3).map(|c| c[0]).collect();
        assert_eq!(xs, vec![50, 51, 52]);
    }
}
