// wristhub — Battery Level
//
// Linear LiPo mapping from cell voltage, 3.3 V = 0 %, full = 100 %.

use crate::config::{BATTERY_EMPTY_V, BATTERY_FULL_V};

/// `full_override` comes from the persisted settings when the cell tops out
/// below the nominal full voltage.
pub fn battery_percent(voltage: f32, full_override: Option<f32>) -> u8 {
    let full = full_override
        .filter(|v| *v > BATTERY_EMPTY_V)
        .unwrap_or(BATTERY_FULL_V);
    let level = (voltage - BATTERY_EMPTY_V) / (full - BATTERY_EMPTY_V) * 100.0;
    level.clamp(0.0, 100.0).round() as u8
}
