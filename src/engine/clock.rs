use std::time::Duration;

use chrono::{DateTime, Local, LocalResult, NaiveDate, TimeZone, Utc};

/// Source of "now" for the coordinator. Rollover and midnight scheduling
/// are driven entirely through this seam so day-boundary behavior is
/// deterministic under test.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Wall time until the next local midnight, floored at one second so a
    /// wakeup right on the boundary cannot busy-loop.
    fn until_midnight(&self) -> Duration {
        let now = self.now();
        let tomorrow = now.date_naive() + chrono::Duration::days(1);
        let midnight_naive = match tomorrow.and_hms_opt(0, 0, 0) {
            Some(naive) => naive,
            None => return Duration::from_secs(60),
        };
        let midnight = match Local.from_local_datetime(&midnight_naive) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            // Midnight skipped by a DST jump; fall back to a day from now.
            LocalResult::None => now + chrono::Duration::days(1),
        };
        (midnight - now)
            .to_std()
            .map(|d| d.max(Duration::from_secs(1)))
            .unwrap_or(Duration::from_secs(1))
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[cfg(test)]
pub struct ManualClock(std::sync::Mutex<DateTime<Local>>);

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self(std::sync::Mutex::new(start))
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard += duration;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_midnight_counts_down_to_the_boundary() {
        let now = Local.with_ymd_and_hms(2026, 8, 28, 23, 59, 30).unwrap();
        let clock = ManualClock::new(now);
        let remaining = clock.until_midnight();
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining >= Duration::from_secs(1));
    }

    #[test]
    fn until_midnight_spans_most_of_a_day_just_after_midnight() {
        let now = Local.with_ymd_and_hms(2026, 8, 28, 0, 0, 5).unwrap();
        let clock = ManualClock::new(now);
        let remaining = clock.until_midnight();
        assert!(remaining > Duration::from_secs(23 * 3600));
        assert!(remaining <= Duration::from_secs(24 * 3600));
    }
}
