// wristhub — Host Events
//
// Every drained task becomes one named event with a JSON payload. The host
// runtime receives them through `EventSink`, always from the consumer context.

use serde_json::Value;

use crate::flags::Task;

/// Host event-emission collaborator.
pub trait EventSink {
    fn emit(&mut self, name: &str, payload: Value);
}

impl<F> EventSink for F
where
    F: FnMut(&str, Value),
{
    fn emit(&mut self, name: &str, payload: Value) {
        self(name, payload)
    }
}

/// Sink that only logs. Used when no host runtime is attached.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, name: &str, payload: Value) {
        log::info!("event {}: {}", name, payload);
    }
}

impl Task {
    /// Host-visible event name.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::LcdOn | Self::LcdOff => "lcdPower",
            Self::BacklightOn | Self::BacklightOff => "backlight",
            Self::Lock | Self::Unlock => "lock",
            Self::AccelData => "accel",
            Self::AccelTapped => "tap",
            Self::GpsLine => "GPS-raw",
            Self::PressureData => "pressure",
            Self::MagData => "mag",
            Self::GestureData => "gesture",
            Self::HrmData => "HRM",
            Self::Charging => "charging",
            Self::Step => "step",
            Self::Swipe => "swipe",
            Self::Touch => "touch",
            Self::Twist => "twist",
            Self::FaceUp => "faceUp",
            Self::IntervalDefault | Self::IntervalPowerSave => "pollInterval",
            Self::Health => "health",
            Self::Midnight => "midnight",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |name: &str, payload: Value| seen.push((name.to_owned(), payload));
            sink.emit("twist", Value::Null);
            sink.emit("step", json!(3));
        }
        assert_eq!(seen[1], ("step".to_owned(), json!(3)));
    }

    #[test]
    fn paired_tasks_share_a_name() {
        assert_eq!(Task::LcdOn.event_name(), Task::LcdOff.event_name());
        assert_eq!(Task::GpsLine.event_name(), "GPS-raw");
    }
}
