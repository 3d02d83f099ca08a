// wristhub — Wearable Sensor Hub Core
//
// Always-on sensor hub for a wrist device: polls the accelerometer and any
// powered peripherals, derives gestures, twists, taps, steps and face-up,
// arbitrates peripheral power between apps, runs the display/lock timeouts
// and hands everything to the host as named events.
//
// Three contexts, split by `HubBuilder::build`:
//   Poller:        periodic tick, producer
//   InputManager:  button / touch / GPS UART interrupts, producer
//   SensorHub:     host API and the idle-loop drain, single consumer

pub mod accel;
pub mod battery;
pub mod bus;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod drivers;
pub mod error;
pub mod events;
pub mod flags;
pub mod gps;
pub mod health;
pub mod hub;
pub mod input;
pub mod poll;
pub mod power;
pub mod state;
pub mod tasks;
pub mod timeout;
pub mod touch;

pub use config::{HubConfig, HubOptions, Settings};
pub use error::HubError;
pub use events::{EventSink, LogSink};
pub use flags::{DeviceFlag, Task};
pub use health::{HealthRange, HealthState};
pub use hub::{HubBuilder, PressureEvent, SensorHub};
pub use input::InputManager;
pub use poll::Poller;
pub use power::{Peripheral, PowerArbiter, Requester};
pub use timeout::WakeReason;
