// wristhub — Device Power Arbitrator
//
// Several apps may want the same peripheral at once. Each device keeps the set
// of requesters asking for it; the device is on while that set is non-empty.
// No I/O happens here: callers turn the answer into driver calls.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::flags::DeviceFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peripheral {
    Gps,
    Compass,
    Hrm,
    Barometer,
}

impl Peripheral {
    pub const ALL: [Peripheral; 4] = [
        Peripheral::Gps,
        Peripheral::Compass,
        Peripheral::Hrm,
        Peripheral::Barometer,
    ];

    /// Name used as the ownership key.
    pub fn name(self) -> &'static str {
        match self {
            Self::Gps => "GPS",
            Self::Compass => "Compass",
            Self::Hrm => "HRM",
            Self::Barometer => "Barom",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn power_flag(self) -> DeviceFlag {
        match self {
            Self::Gps => DeviceFlag::GpsOn,
            Self::Compass => DeviceFlag::CompassOn,
            Self::Hrm => DeviceFlag::HrmOn,
            Self::Barometer => DeviceFlag::BarometerOn,
        }
    }
}

impl fmt::Display for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who is asking for power. `Force` skips the requester sets entirely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Requester {
    App(String),
    Force,
}

impl Requester {
    pub fn app(id: impl Into<String>) -> Self {
        Self::App(id.into())
    }
}

impl From<&str> for Requester {
    fn from(id: &str) -> Self {
        Self::App(id.to_owned())
    }
}

#[derive(Debug, Default)]
pub struct PowerArbiter {
    owners: HashMap<String, BTreeSet<String>>,
}

impl PowerArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request and return whether the device should now be on.
    pub fn request_power(&mut self, device: &str, requester: &Requester, want_on: bool) -> bool {
        let id = match requester {
            Requester::Force => return want_on,
            Requester::App(id) => id,
        };

        if want_on {
            self.owners
                .entry(device.to_owned())
                .or_default()
                .insert(id.clone());
            return true;
        }

        let Some(set) = self.owners.get_mut(device) else {
            return false;
        };
        set.remove(id);
        if set.is_empty() {
            self.owners.remove(device);
            return false;
        }
        true
    }

    pub fn query_power(&self, device: &str) -> bool {
        self.owners.get(device).is_some_and(|set| !set.is_empty())
    }

    pub fn requesters(&self, device: &str) -> Vec<&str> {
        self.owners
            .get(device)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn tracked_devices(&self) -> usize {
        self.owners.len()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_apps_share_gps() {
        let mut arb = PowerArbiter::new();
        let a = Requester::app("A");
        let b = Requester::app("B");

        assert!(arb.request_power("GPS", &a, true));
        assert!(arb.request_power("GPS", &b, true));
        assert!(arb.request_power("GPS", &a, false));
        assert!(arb.query_power("GPS"));
        assert!(!arb.request_power("GPS", &b, false));
        assert!(!arb.query_power("GPS"));
    }

    #[test]
    fn repeated_requests_from_one_id_are_idempotent() {
        let mut arb = PowerArbiter::new();
        let app = Requester::app("clock");

        arb.request_power("HRM", &app, true);
        arb.request_power("HRM", &app, true);
        arb.request_power("HRM", &app, true);
        assert!(!arb.request_power("HRM", &app, false));
        assert!(!arb.query_power("HRM"));

        // Off with no outstanding request stays off.
        assert!(!arb.request_power("HRM", &app, false));
    }

    #[test]
    fn empty_sets_are_collected() {
        let mut arb = PowerArbiter::new();
        let app = Requester::app("x");
        arb.request_power("Barom", &app, true);
        arb.request_power("Compass", &app, true);
        assert_eq!(arb.tracked_devices(), 2);

        arb.request_power("Barom", &app, false);
        assert_eq!(arb.tracked_devices(), 1);
        assert!(arb.requesters("Barom").is_empty());
        assert_eq!(arb.requesters("Compass"), vec!["x"]);
    }

    #[test]
    fn force_bypasses_the_sets() {
        let mut arb = PowerArbiter::new();
        arb.request_power("GPS", &Requester::app("A"), true);

        assert!(!arb.request_power("GPS", &Requester::Force, false));
        // Ownership untouched by a forced command.
        assert!(arb.query_power("GPS"));
        assert!(arb.request_power("Compass", &Requester::Force, true));
        assert!(!arb.query_power("Compass"));
    }
}
