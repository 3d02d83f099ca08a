// wristhub — Touch Zones & Swipes
//
// Two touch zones (left/right half of the panel). Sliding across both reports
// a swipe; lifting off without a swipe reports a touch on the last zone.

use crate::config::{TouchCalibration, LCD_HEIGHT, LCD_WIDTH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum TouchZone {
    #[default]
    None = 0,
    Left = 1,
    Right = 2,
    Both = 3,
}

impl TouchZone {
    pub fn from_pads(left: bool, right: bool) -> Self {
        match (left, right) {
            (false, false) => Self::None,
            (true, false) => Self::Left,
            (false, true) => Self::Right,
            (true, true) => Self::Both,
        }
    }

    /// Zone of a panel coordinate.
    pub fn from_x(x: i32) -> Self {
        if x < LCD_WIDTH / 2 {
            Self::Left
        } else {
            Self::Right
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchGesture {
    Touch(TouchZone),
    /// +1 left→right, -1 right→left.
    Swipe(i8),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TouchZones {
    last: TouchZone,
    last2: TouchZone,
    swiped: bool,
}

impl TouchZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, zone: TouchZone) -> Option<TouchGesture> {
        if zone == self.last {
            return None;
        }

        let from = if self.last == TouchZone::Both { self.last2 } else { self.last };
        let mut out = None;
        if !self.swiped {
            match (from, zone) {
                (TouchZone::Left, TouchZone::Right) => out = Some(TouchGesture::Swipe(1)),
                (TouchZone::Right, TouchZone::Left) => out = Some(TouchGesture::Swipe(-1)),
                _ => {}
            }
            if out.is_some() {
                self.swiped = true;
            }
        }

        if zone == TouchZone::None {
            if !self.swiped {
                out = Some(TouchGesture::Touch(self.last));
            }
            self.swiped = false;
        }

        self.last2 = self.last;
        self.last = zone;
        out
    }
}

/// Map a raw touchscreen coordinate onto the panel.
pub fn calibrate(cal: &TouchCalibration, raw_x: i32, raw_y: i32) -> (i32, i32) {
    fn axis(raw: i32, min: i32, max: i32, size: i32) -> i32 {
        let span = (max - min).max(1);
        ((raw - min) * size / span).clamp(0, size - 1)
    }
    (
        axis(raw_x, cal.min_x, cal.max_x, LCD_WIDTH),
        axis(raw_y, cal.min_y, cal.max_y, LCD_HEIGHT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(zones: &[TouchZone]) -> Vec<TouchGesture> {
        let mut tz = TouchZones::new();
        zones.iter().filter_map(|z| tz.update(*z)).collect()
    }

    #[test]
    fn tap_reports_zone_on_release() {
        use TouchZone::*;
        assert_eq!(run(&[Left, None]), vec![TouchGesture::Touch(Left)]);
        assert_eq!(run(&[Right, Both, None]), vec![TouchGesture::Touch(Both)]);
    }

    #[test]
    fn crossing_zones_is_a_swipe_not_a_touch() {
        use TouchZone::*;
        assert_eq!(run(&[Left, Both, Right, None]), vec![TouchGesture::Swipe(1)]);
        assert_eq!(run(&[Right, Left, None]), vec![TouchGesture::Swipe(-1)]);
    }

    #[test]
    fn calibration_scales_and_clamps() {
        let cal = TouchCalibration { min_x: 10, min_y: 10, max_x: 170, max_y: 170 };
        assert_eq!(calibrate(&cal, 10, 10), (0, 0));
        assert_eq!(calibrate(&cal, 90, 170), (88, 175));
        assert_eq!(calibrate(&cal, -50, 400), (0, 175));
    }
}
