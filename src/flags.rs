// wristhub — Device Flags & Pending Task Mask
//
// Both sets are atomic words so interrupt-side producers can OR bits in
// without locking. Call sites only ever see the typed enums below.

use std::sync::atomic::{AtomicU32, Ordering};

// ---------------------------------------------------------------------------
// DeviceFlags: persistent state, reset only at boot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceFlag {
    WakeOnFaceUp = 0,
    WakeOnBtn1,
    WakeOnBtn2,
    WakeOnBtn3,
    WakeOnTouch,
    WakeOnDoubleTap,
    WakeOnTwist,
    EnableBeep,
    EnableBuzz,
    AccelListener,
    PowerSave,
    HrmOn,
    GpsOn,
    CompassOn,
    BarometerOn,
    LcdOn,
    BacklightOn,
    Locked,
}

impl DeviceFlag {
    const fn bit(self) -> u32 {
        1 << self as u8
    }
}

/// Flags set at power-on.
pub const DEFAULT_FLAGS: &[DeviceFlag] = &[
    DeviceFlag::WakeOnTwist,
    DeviceFlag::WakeOnBtn1,
    DeviceFlag::WakeOnBtn2,
    DeviceFlag::WakeOnBtn3,
    DeviceFlag::PowerSave,
    DeviceFlag::LcdOn,
    DeviceFlag::BacklightOn,
];

#[derive(Debug, Default)]
pub struct DeviceFlags(AtomicU32);

impl DeviceFlags {
    pub fn with(initial: &[DeviceFlag]) -> Self {
        let bits = initial.iter().fold(0, |acc, f| acc | f.bit());
        Self(AtomicU32::new(bits))
    }

    pub fn contains(&self, flag: DeviceFlag) -> bool {
        self.0.load(Ordering::Acquire) & flag.bit() != 0
    }

    pub fn insert(&self, flag: DeviceFlag) {
        self.0.fetch_or(flag.bit(), Ordering::AcqRel);
    }

    pub fn remove(&self, flag: DeviceFlag) {
        self.0.fetch_and(!flag.bit(), Ordering::AcqRel);
    }

    pub fn set(&self, flag: DeviceFlag, on: bool) {
        if on {
            self.insert(flag);
        } else {
            self.remove(flag);
        }
    }

    /// Display is fully awake and accepting input.
    pub fn is_awake(&self) -> bool {
        self.contains(DeviceFlag::LcdOn)
            && self.contains(DeviceFlag::BacklightOn)
            && !self.contains(DeviceFlag::Locked)
    }
}

// ---------------------------------------------------------------------------
// Tasks: one bit per event kind, declaration order is dispatch order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Task {
    Reload = 0,
    LcdOn,
    LcdOff,
    BacklightOn,
    BacklightOff,
    Lock,
    Unlock,
    AccelData,
    AccelTapped,
    GpsLine,
    PressureData,
    MagData,
    GestureData,
    HrmData,
    Charging,
    Step,
    Swipe,
    Touch,
    Twist,
    FaceUp,
    IntervalDefault,
    IntervalPowerSave,
    Health,
    Midnight,
}

impl Task {
    pub const ALL: [Task; 24] = [
        Task::Reload,
        Task::LcdOn,
        Task::LcdOff,
        Task::BacklightOn,
        Task::BacklightOff,
        Task::Lock,
        Task::Unlock,
        Task::AccelData,
        Task::AccelTapped,
        Task::GpsLine,
        Task::PressureData,
        Task::MagData,
        Task::GestureData,
        Task::HrmData,
        Task::Charging,
        Task::Step,
        Task::Swipe,
        Task::Touch,
        Task::Twist,
        Task::FaceUp,
        Task::IntervalDefault,
        Task::IntervalPowerSave,
        Task::Health,
        Task::Midnight,
    ];

    const fn bit(self) -> u32 {
        1 << self as u8
    }
}

/// Snapshot of drained tasks. Iterates in priority order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSet(u32);

impl TaskSet {
    pub const EMPTY: Self = Self(0);

    pub fn contains(self, task: Task) -> bool {
        self.0 & task.bit() != 0
    }

    pub fn insert(&mut self, task: Task) {
        self.0 |= task.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Task> {
        Task::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl FromIterator<Task> for TaskSet {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut set = TaskSet::EMPTY;
        for t in iter {
            set.insert(t);
        }
        set
    }
}

/// Producer side only ORs bits in; the consumer takes the whole word.
#[derive(Debug, Default)]
pub struct PendingTasks(AtomicU32);

impl PendingTasks {
    pub fn set(&self, task: Task) {
        self.0.fetch_or(task.bit(), Ordering::AcqRel);
    }

    pub fn set_all(&self, tasks: TaskSet) {
        if !tasks.is_empty() {
            self.0.fetch_or(tasks.0, Ordering::AcqRel);
        }
    }

    pub fn peek(&self) -> TaskSet {
        TaskSet(self.0.load(Ordering::Acquire))
    }

    /// Read and clear in one step. Bits ORed in afterwards belong to the next drain.
    pub fn take(&self) -> TaskSet {
        TaskSet(self.0.swap(0, Ordering::AcqRel))
    }
}
