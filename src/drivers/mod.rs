// wristhub — Driver Collaborator Contracts
//
// The hub never touches chip registers. Each peripheral is reached through one
// of the narrow traits below; the concrete chip is picked once when `Drivers`
// is built, and a missing chip is simply `None`.

#[cfg(feature = "firmware")]
pub mod board;
#[cfg(feature = "firmware")]
pub mod imu;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

use anyhow::anyhow;

use crate::detect::tap::{TapDirectionTable, KX023_TAP_TABLE};
use crate::error::HubError;
use crate::power::Peripheral;

// ---------------------------------------------------------------------------
// Sample types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vector3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vector3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise difference, saturating at the `i32` range.
    pub fn sub(self, other: Self) -> Self {
        Self::new(
            self.x.saturating_sub(other.x),
            self.y.saturating_sub(other.y),
            self.z.saturating_sub(other.z),
        )
    }

    pub fn norm_squared(self) -> u32 {
        let sq = |v: i32| (v as i64 * v as i64) as u64;
        (sq(self.x) + sq(self.y) + sq(self.z)).min(u32::MAX as u64) as u32
    }
}

/// Tap as reported by the accelerometer: raw direction bits plus double flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTap {
    pub direction_bits: u8,
    pub double: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelReading {
    pub xyz: Vector3,
    pub tap: Option<RawTap>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReading {
    pub pressure_hpa: f64,
    pub temperature_c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrmReading {
    pub bpm: f32,
    pub confidence: u8,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

pub trait PowerControl: Send {
    fn init(&mut self, first_run: bool) -> anyhow::Result<()>;
    fn off(&mut self) -> anyhow::Result<()>;
}

pub trait SensorDriver: PowerControl {
    type Sample;

    /// True when a fresh sample is ready to read.
    fn poll_for_new_data(&mut self) -> anyhow::Result<bool>;
    fn read_sample(&mut self) -> anyhow::Result<Self::Sample>;
}

/// LCD controller and backlight, driven only from the consumer context.
pub trait DisplayPanel: Send {
    fn set_lcd_power(&mut self, on: bool) -> anyhow::Result<()>;
    fn set_backlight(&mut self, on: bool) -> anyhow::Result<()>;
}

/// Board-level signals the poll tick needs.
pub trait Board: Send {
    fn kick_watchdog(&mut self);
    fn is_charging(&self) -> bool;
}

pub trait BatterySense: Send {
    fn voltage(&mut self) -> anyhow::Result<f32>;
}

/// Wall clock in ms since the Unix epoch.
pub trait Clock: Send {
    fn now_ms(&self) -> i64;

    /// Local offset used to decide where a day starts.
    fn utc_offset_minutes(&self) -> i32 {
        0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock {
    pub utc_offset_minutes: i32,
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes
    }
}

// ---------------------------------------------------------------------------
// Driver set
// ---------------------------------------------------------------------------

pub type AccelDriver = Box<dyn SensorDriver<Sample = AccelReading>>;
pub type CompassDriver = Box<dyn SensorDriver<Sample = Vector3>>;
pub type BarometerDriver = Box<dyn SensorDriver<Sample = PressureReading>>;
pub type HrmDriver = Box<dyn SensorDriver<Sample = HrmReading>>;
pub type GpsDriver = Box<dyn PowerControl>;

pub struct Drivers {
    pub accel: Option<AccelDriver>,
    pub compass: Option<CompassDriver>,
    pub barometer: Option<BarometerDriver>,
    pub hrm: Option<HrmDriver>,
    pub gps: Option<GpsDriver>,
    pub tap_table: &'static TapDirectionTable,
}

impl Default for Drivers {
    fn default() -> Self {
        Self {
            accel: None,
            compass: None,
            barometer: None,
            hrm: None,
            gps: None,
            tap_table: &KX023_TAP_TABLE,
        }
    }
}

impl Drivers {
    pub fn is_fitted(&self, device: Peripheral) -> bool {
        match device {
            Peripheral::Gps => self.gps.is_some(),
            Peripheral::Compass => self.compass.is_some(),
            Peripheral::Hrm => self.hrm.is_some(),
            Peripheral::Barometer => self.barometer.is_some(),
        }
    }

    /// Switch a device through its driver. `None` when the chip is absent.
    pub fn switch(&mut self, device: Peripheral, on: bool) -> Option<anyhow::Result<()>> {
        fn apply<D: PowerControl + ?Sized>(d: &mut D, on: bool) -> anyhow::Result<()> {
            if on {
                d.init(true)
            } else {
                d.off()
            }
        }

        match device {
            Peripheral::Gps => self.gps.as_deref_mut().map(|d| apply(d, on)),
            Peripheral::Compass => self.compass.as_deref_mut().map(|d| apply(d, on)),
            Peripheral::Hrm => self.hrm.as_deref_mut().map(|d| apply(d, on)),
            Peripheral::Barometer => self.barometer.as_deref_mut().map(|d| apply(d, on)),
        }
    }
}

/// Run a multi-step driver operation up to `attempts` times.
pub fn with_retries<F>(device: Peripheral, attempts: u32, mut op: F) -> Result<(), HubError>
where
    F: FnMut() -> anyhow::Result<()>,
{
    let attempts = attempts.max(1);
    let mut last_err = anyhow!("no attempt made");
    for attempt in 1..=attempts {
        match op() {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::warn!("{} attempt {}/{} failed: {:#}", device, attempt, attempts, e);
                last_err = e;
            }
        }
    }
    Err(HubError::Driver { device, source: last_err.into() })
}
