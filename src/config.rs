// wristhub — Timing, Threshold & Option Configuration
//
// Compile-time defaults live here as grouped constants; the runtime-tunable
// subset is carried in `HubConfig` and updated through `HubOptions`.

use serde::{Deserialize, Serialize};

use crate::error::HubError;

// ---------------------------------------------------------------------------
// Poll Scheduler (milliseconds)
// ---------------------------------------------------------------------------
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 80;        // 12.5 Hz, accelerometer native rate
pub const POWER_SAVE_POLL_INTERVAL_MS: u32 = 800;    // 10x fewer samples when stationary
pub const POWER_SAVE_TIMEOUT_MS: u32 = 60_000;       // stationary this long → power save
pub const POWER_SAVE_MIN_DIFF: u32 = 2500;           // diff above this counts as movement
pub const MIN_POLL_INTERVAL_MS: u32 = 10;
pub const MAX_POLL_INTERVAL_MS: u32 = 4000;

/// Saturation value for every per-tick timer.
pub const TIMER_MAX: u32 = 0x7FFF_FFFF;

// ---------------------------------------------------------------------------
// Accelerometer
// ---------------------------------------------------------------------------
pub const ACCEL_HISTORY_LEN: usize = 50;             // quantized samples kept for gestures
pub const ACCEL_HISTORY_SHIFT: u32 = 7;              // raw >> 7 fits an i8
pub const ACCEL_LSB_PER_G: f32 = 8192.0;

// ---------------------------------------------------------------------------
// Detector defaults
// ---------------------------------------------------------------------------
pub const DEFAULT_TWIST_THRESHOLD: i32 = 800;
pub const DEFAULT_TWIST_MAX_Y: i32 = -800;
pub const DEFAULT_TWIST_TIMEOUT_MS: u32 = 1000;
pub const DEFAULT_GESTURE_START_THRESH: u32 = 800 * 800;
pub const DEFAULT_GESTURE_END_THRESH: u32 = 2000 * 2000;
pub const DEFAULT_GESTURE_INACTIVE_COUNT: u8 = 4;
pub const DEFAULT_GESTURE_MIN_LENGTH: u8 = 10;

pub const FACE_UP_Z_MIN: i32 = -9000;
pub const FACE_UP_Z_MAX: i32 = -6700;
pub const FACE_UP_XY_MAX: i32 = 2048;
pub const FACE_UP_SETTLE_MS: u32 = 300;

// ---------------------------------------------------------------------------
// Timeouts (milliseconds, 0 disables)
// ---------------------------------------------------------------------------
pub const DEFAULT_LCD_POWER_TIMEOUT_MS: u32 = 10_000;
pub const DEFAULT_BACKLIGHT_TIMEOUT_MS: u32 = 10_000;
pub const DEFAULT_LOCK_TIMEOUT_MS: u32 = 10_000;
pub const DEFAULT_BTN_LOAD_TIMEOUT_MS: u32 = 1500;
pub const CHARGE_SETTLE_MS: u32 = 200;
pub const DEBOUNCE_MS: u64 = 50;
pub const HOME_BUTTON: u8 = 3;                       // held → reload
pub const BUTTON_COUNT: u8 = 3;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------
pub const HEALTH_INTERVAL_MS: i64 = 600_000;         // 10 minute buckets
pub const DEVICE_RETRY_COUNT: u32 = 3;

// Default step counter, in raw accelerometer LSB around the gravity baseline
pub const STEP_PEAK_LSB: i32 = 1000;
pub const STEP_REARM_LSB: i32 = 200;
pub const STEP_MIN_SAMPLES: u32 = 3;                 // ~4 steps/s at 80 ms
pub const STEP_BASELINE_SHIFT: u32 = 4;

// ---------------------------------------------------------------------------
// GPS / Barometer / Battery
// ---------------------------------------------------------------------------
pub const NMEA_MAX_LINE: usize = 82;
pub const SEA_LEVEL_HPA: f64 = 1013.25;
pub const BATTERY_EMPTY_V: f32 = 3.3;
pub const BATTERY_FULL_V: f32 = 4.2;

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------
pub const LCD_WIDTH: i32 = 176;
pub const LCD_HEIGHT: i32 = 176;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------
pub const STACK_POLL: usize = 8192;
pub const IDLE_LOOP_PERIOD_MS: u64 = 20;

// ---------------------------------------------------------------------------
// Firmware board (Xiao ESP32-C3)
// ---------------------------------------------------------------------------
pub const PIN_BUTTON: i32 = 3;      // D1/A1, active LOW, maps to BTN1
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks
pub const BATTERY_DIVIDER: f32 = 2.0;    // 1:2 resistor divider before the ADC pin
pub const BATTERY_CHECK_INTERVAL_MS: u64 = 30_000;
pub const I2C_BAUDRATE_HZ: u32 = 400_000;

/// Inactivity thresholds for each display domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub lcd_power_ms: u32,
    pub backlight_ms: u32,
    pub lock_ms: u32,
    pub btn_load_ms: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            lcd_power_ms: DEFAULT_LCD_POWER_TIMEOUT_MS,
            backlight_ms: DEFAULT_BACKLIGHT_TIMEOUT_MS,
            lock_ms: DEFAULT_LOCK_TIMEOUT_MS,
            btn_load_ms: DEFAULT_BTN_LOAD_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwistConfig {
    pub threshold: i32,
    pub max_y: i32,
    pub timeout_ms: u32,
}

impl Default for TwistConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_TWIST_THRESHOLD,
            max_y: DEFAULT_TWIST_MAX_Y,
            timeout_ms: DEFAULT_TWIST_TIMEOUT_MS,
        }
    }
}

/// Gesture thresholds are compared against the squared delta magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    pub start_thresh: u32,
    pub end_thresh: u32,
    pub inactive_count: u8,
    pub min_length: u8,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            start_thresh: DEFAULT_GESTURE_START_THRESH,
            end_thresh: DEFAULT_GESTURE_END_THRESH,
            inactive_count: DEFAULT_GESTURE_INACTIVE_COUNT,
            min_length: DEFAULT_GESTURE_MIN_LENGTH,
        }
    }
}

/// Runtime-tunable state shared from the consumer to the poll context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubConfig {
    pub timeouts: TimeoutConfig,
    pub twist: TwistConfig,
    pub gesture: GestureConfig,
}

/// Partial option update. Every field is optional; absent fields keep their
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcd_power_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backlight_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btn_load_timeout: Option<u32>,
    #[serde(rename = "wakeOnBTN1", skip_serializing_if = "Option::is_none")]
    pub wake_on_btn1: Option<bool>,
    #[serde(rename = "wakeOnBTN2", skip_serializing_if = "Option::is_none")]
    pub wake_on_btn2: Option<bool>,
    #[serde(rename = "wakeOnBTN3", skip_serializing_if = "Option::is_none")]
    pub wake_on_btn3: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_on_face_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_on_touch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_on_double_tap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_on_twist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twist_threshold: Option<i32>,
    #[serde(rename = "twistMaxY", skip_serializing_if = "Option::is_none")]
    pub twist_max_y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twist_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_start_thresh: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_end_thresh: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_inactive_count: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_min_length: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_save: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u32>,
}

impl HubOptions {
    /// Parse the host's structured option object. Unknown keys are ignored.
    pub fn from_value(value: serde_json::Value) -> Result<Self, HubError> {
        serde_json::from_value(value).map_err(|e| HubError::InvalidOption(e.to_string()))
    }

    /// Copy the numeric options into `config`, leaving unset fields alone.
    pub(crate) fn merge_into(&self, config: &mut HubConfig) {
        let t = &mut config.timeouts;
        if let Some(v) = self.lock_timeout {
            t.lock_ms = v;
        }
        if let Some(v) = self.lcd_power_timeout {
            t.lcd_power_ms = v;
        }
        if let Some(v) = self.backlight_timeout {
            t.backlight_ms = v;
        }
        if let Some(v) = self.btn_load_timeout {
            t.btn_load_ms = v;
        }

        let tw = &mut config.twist;
        if let Some(v) = self.twist_threshold {
            tw.threshold = v;
        }
        if let Some(v) = self.twist_max_y {
            tw.max_y = v;
        }
        if let Some(v) = self.twist_timeout {
            tw.timeout_ms = v;
        }

        let g = &mut config.gesture;
        if let Some(v) = self.gesture_start_thresh {
            g.start_thresh = v;
        }
        if let Some(v) = self.gesture_end_thresh {
            g.end_thresh = v;
        }
        if let Some(v) = self.gesture_inactive_count {
            g.inactive_count = v;
        }
        if let Some(v) = self.gesture_min_length {
            g.min_length = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted settings (read once at boot)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub fg: u16,
    pub bg: u16,
    pub fg2: u16,
    pub bg2: u16,
    #[serde(rename = "fgH")]
    pub fg_highlight: u16,
    #[serde(rename = "bgH")]
    pub bg_highlight: u16,
    pub dark: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: 0xFFFF,
            bg: 0x0000,
            fg2: 0xFFFF,
            bg2: 0x0007,
            fg_highlight: 0xFFFF,
            bg_highlight: 0x02F7,
            dark: true,
        }
    }
}

/// Raw touchscreen range that maps onto the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TouchCalibration {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Default for TouchCalibration {
    fn default() -> Self {
        Self { min_x: 0, min_y: 0, max_x: 160, max_y: 160 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub touch: TouchCalibration,
    pub beep: bool,
    pub buzz: bool,
    /// Overrides `BATTERY_FULL_V` when the cell tops out lower.
    pub battery_full_voltage: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            touch: TouchCalibration::default(),
            beep: true,
            buzz: true,
            battery_full_voltage: None,
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self, HubError> {
        serde_json::from_str(text).map_err(HubError::Settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_options_keep_prior_values() {
        let mut config = HubConfig::default();
        let opts = HubOptions::from_value(json!({ "lockTimeout": 5000, "twistMaxY": -400 }))
            .unwrap();
        opts.merge_into(&mut config);

        assert_eq!(config.timeouts.lock_ms, 5000);
        assert_eq!(config.twist.max_y, -400);
        assert_eq!(config.timeouts.lcd_power_ms, DEFAULT_LCD_POWER_TIMEOUT_MS);
        assert_eq!(config.gesture, GestureConfig::default());
    }

    #[test]
    fn option_keys_follow_host_spelling() {
        let opts = HubOptions::from_value(json!({ "wakeOnBTN1": false, "wakeOnFaceUp": true }))
            .unwrap();
        assert_eq!(opts.wake_on_btn1, Some(false));
        assert_eq!(opts.wake_on_face_up, Some(true));
        assert!(HubOptions::from_value(json!({ "lockTimeout": "soon" })).is_err());
    }

    #[test]
    fn settings_fill_missing_keys_with_defaults() {
        let s = Settings::from_json(r#"{"beep": false, "touch": {"maxX": 170}}"#).unwrap();
        assert!(!s.beep);
        assert!(s.buzz);
        assert_eq!(s.touch.max_x, 170);
        assert_eq!(s.touch.min_y, 0);
        assert_eq!(s.battery_full_voltage, None);
    }
}
