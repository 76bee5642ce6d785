use chrono::{Duration, Local, NaiveDateTime, SubsecRound};
use std::sync::{Mutex, MutexGuard};

/// Source of snapshot timestamps: local wall-clock time at second precision.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock that never goes backwards.
///
/// If the system clock steps back (DST fall-back, NTP correction) the last
/// returned value is repeated until the wall clock catches up, which keeps
/// log rows non-decreasing.
#[derive(Debug, Default)]
pub struct LocalClock {
    last: Mutex<Option<NaiveDateTime>>,
}

impl LocalClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_last(&self) -> MutexGuard<'_, Option<NaiveDateTime>> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clamp(&self, wall: NaiveDateTime) -> NaiveDateTime {
        let mut last = self.lock_last();
        let now = match *last {
            Some(prev) if prev > wall => prev,
            _ => wall,
        };
        *last = Some(now);
        now
    }
}

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        self.clamp(Local::now().naive_local().trunc_subsecs(0))
    }
}

/// Clock that only moves when told to. Used to drive sampler cycles in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    fn lock_now(&self) -> MutexGuard<'_, NaiveDateTime> {
        self.now
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, to: NaiveDateTime) {
        *self.lock_now() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock_now();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock_now()
    }
}
