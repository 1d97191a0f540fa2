use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

/// Source of "now" for everything that renders relative times.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: OffsetDateTime) {
        *self.now.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock()
    }
}

/// Holds the "now" a view renders against and re-samples the clock once per
/// interval. Dropping the ticker stops the refresh.
#[derive(Debug, Clone)]
pub struct NowTicker {
    interval: Duration,
    now: OffsetDateTime,
}

impl NowTicker {
    pub fn start(clock: &dyn Clock, interval: Duration) -> Self {
        Self {
            interval,
            now: clock.now(),
        }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.now
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true when "now" changed. A clock that stepped backwards is
    /// followed immediately.
    pub fn poll(&mut self, clock: &dyn Clock) -> bool {
        let current = clock.now();
        let elapsed = current - self.now;
        if !elapsed.is_negative() && elapsed < self.interval {
            return false;
        }
        self.now = current;
        true
    }
}
