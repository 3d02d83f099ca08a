// wristhub — Face-Up Detector
//
// Window test on the raw vector: Z inside a negative band, X and Y near zero.
// A change of state must hold for FACE_UP_SETTLE_MS before it is reported.

use crate::config::*;
use crate::drivers::Vector3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceUpDetector {
    reported: bool,
    candidate: bool,
    held_ms: u32,
}

pub fn is_face_up(xyz: Vector3) -> bool {
    xyz.z > FACE_UP_Z_MIN
        && xyz.z < FACE_UP_Z_MAX
        && xyz.x.abs() < FACE_UP_XY_MAX
        && xyz.y.abs() < FACE_UP_XY_MAX
}

impl FaceUpDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_face_up(&self) -> bool {
        self.reported
    }

    /// Returns the new state on the tick it becomes stable.
    pub fn update(&mut self, xyz: Vector3, interval_ms: u32) -> Option<bool> {
        let now = is_face_up(xyz);
        if now != self.candidate {
            self.candidate = now;
            self.held_ms = 0;
            return None;
        }

        self.held_ms = self.held_ms.saturating_add(interval_ms).min(TIMER_MAX);
        if self.candidate != self.reported && self.held_ms >= FACE_UP_SETTLE_MS {
            self.reported = self.candidate;
            return Some(self.reported);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT: Vector3 = Vector3::new(100, -200, -8192);
    const ON_EDGE: Vector3 = Vector3::new(8192, 0, 0);

    #[test]
    fn window_bounds() {
        assert!(is_face_up(FLAT));
        assert!(!is_face_up(Vector3::new(0, 0, -9500)));
        assert!(!is_face_up(Vector3::new(0, 2048, -8192)));
        assert!(!is_face_up(ON_EDGE));
    }

    #[test]
    fn reports_once_after_settling() {
        let mut det = FaceUpDetector::new();
        let events: Vec<bool> = (0..10).filter_map(|_| det.update(FLAT, 80)).collect();
        assert_eq!(events, vec![true]);
        assert!(det.is_face_up());
    }

    #[test]
    fn brief_wobble_is_ignored() {
        let mut det = FaceUpDetector::new();
        for _ in 0..6 {
            det.update(FLAT, 80);
        }
        assert!(det.update(ON_EDGE, 80).is_none());
        assert!(det.update(FLAT, 80).is_none());
        for _ in 0..4 {
            assert!(det.update(FLAT, 80).is_none());
        }
        assert!(det.is_face_up());

        let flips: Vec<bool> = (0..6).filter_map(|_| det.update(ON_EDGE, 80)).collect();
        assert_eq!(flips, vec![false]);
    }
}
