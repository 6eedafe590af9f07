use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// Midnight (UTC) of the day containing `at`.
#[must_use]
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Midnight (UTC) of the Sunday that starts the week containing `at`.
#[must_use]
pub fn start_of_week(at: DateTime<Utc>) -> DateTime<Utc> {
    let day = start_of_day(at);
    let since_sunday = i64::from(day.weekday().num_days_from_sunday());
    day - Duration::days(since_sunday)
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn start_of_day_truncates_time() {
        let day = start_of_day(fixed_now());
        assert_eq!(day.to_rfc3339(), "2023-11-14T00:00:00+00:00");
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2023-11-14 is a Tuesday.
        let week = start_of_week(fixed_now());
        assert_eq!(week.weekday(), Weekday::Sun);
        assert_eq!(week.to_rfc3339(), "2023-11-12T00:00:00+00:00");
        assert_eq!(start_of_week(week), week);
    }

    #[test]
    fn fixed_clock_is_stable() {
        let clock = fixed_clock();
        assert_eq!(clock.now(), clock.now());
    }
}
