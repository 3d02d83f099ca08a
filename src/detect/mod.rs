// wristhub — Accelerometer Detectors
//
// Threshold and hysteresis state machines fed by `accel::AccelPipeline`.
// Each one is plain data advanced once per sample; none of them touch shared
// state directly.

pub mod face_up;
pub mod gesture;
pub mod tap;
pub mod twist;

pub use face_up::FaceUpDetector;
pub use gesture::{GestureDetector, GestureDone};
pub use tap::{TapDirectionTable, TapEvent};
pub use twist::TwistDetector;
