//! Wall-clock source for session timing and record timestamps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use rte_kernel::dialect::centis_from_duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now += delta;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Whole centiseconds from `start` to `end`; zero if the clock went back.
pub fn elapsed_centis(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start)
        .to_std()
        .map(centis_from_duration)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_measures() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_millis(930_000));
        assert_eq!(elapsed_centis(start, clock.now()), 93_000);

        clock.set(start - chrono::Duration::seconds(5));
        assert_eq!(elapsed_centis(start, clock.now()), 0);
    }
}
