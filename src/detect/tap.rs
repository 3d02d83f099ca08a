// wristhub — Tap Classification
//
// The accelerometer decodes taps itself; this layer only names the direction
// bits. Each accelerometer variant numbers its bits differently, so the name
// lookup is a table chosen alongside the driver.

use crate::drivers::{RawTap, Vector3};

#[derive(Debug)]
pub struct TapDirectionTable {
    pub variant: &'static str,
    entries: [(u8, &'static str); 6],
}

impl TapDirectionTable {
    pub const fn new(variant: &'static str, entries: [(u8, &'static str); 6]) -> Self {
        Self { variant, entries }
    }

    /// Name of the lowest set direction bit, `None` for unknown bits.
    pub fn direction(&self, bits: u8) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(mask, _)| bits & mask != 0)
            .map(|(_, name)| *name)
    }
}

pub static KX023_TAP_TABLE: TapDirectionTable = TapDirectionTable::new(
    "KX023",
    [(1, "front"), (2, "back"), (4, "bottom"), (8, "top"), (16, "right"), (32, "left")],
);

pub static KX126_TAP_TABLE: TapDirectionTable = TapDirectionTable::new(
    "KX126",
    [(1, "back"), (2, "front"), (4, "top"), (8, "bottom"), (16, "left"), (32, "right")],
);

/// Tap as stored for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapEvent {
    pub dir: Option<&'static str>,
    pub double: bool,
    pub xyz: Vector3,
}

pub fn classify(table: &TapDirectionTable, raw: RawTap, xyz: Vector3) -> TapEvent {
    TapEvent {
        dir: table.direction(raw.direction_bits),
        double: raw.double,
        xyz,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_disagree_on_front() {
        assert_eq!(KX023_TAP_TABLE.direction(1), Some("front"));
        assert_eq!(KX126_TAP_TABLE.direction(1), Some("back"));
        assert_eq!(KX126_TAP_TABLE.direction(2), Some("front"));
    }

    #[test]
    fn unknown_bits_have_no_name() {
        assert_eq!(KX023_TAP_TABLE.direction(0), None);
        assert_eq!(KX023_TAP_TABLE.direction(64), None);
    }

    #[test]
    fn classify_keeps_double_flag() {
        let ev = classify(
            &KX023_TAP_TABLE,
            RawTap { direction_bits: 16, double: true },
            Vector3::new(1, 2, 3),
        );
        assert_eq!(ev.dir, Some("right"));
        assert!(ev.double);
    }
}
