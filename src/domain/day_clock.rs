use crate::domain::models::DayKey;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

pub const DEFAULT_BOUNDARY_HOUR: u32 = 3;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_now() -> NowProvider {
    Arc::new(Utc::now)
}

/// Maps wall-clock instants onto tracked days that start at `boundary_hour`
/// local time instead of midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    timezone: Tz,
    boundary_hour: u32,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            boundary_hour: DEFAULT_BOUNDARY_HOUR,
        }
    }
}

impl DayBoundary {
    pub fn new(timezone: Tz, boundary_hour: u32) -> Result<Self, String> {
        if boundary_hour > 23 {
            return Err(format!("day boundary hour must be 0..=23, got {boundary_hour}"));
        }
        Ok(Self {
            timezone,
            boundary_hour,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn boundary_hour(&self) -> u32 {
        self.boundary_hour
    }

    pub fn day_key_of(&self, instant: DateTime<Utc>) -> DayKey {
        let local = instant.with_timezone(&self.timezone).naive_local();
        let shifted = local - Duration::hours(i64::from(self.boundary_hour));
        DayKey::new(shifted.date())
    }

    pub fn day_start(&self, day_key: DayKey) -> DateTime<Utc> {
        let boundary = NaiveTime::from_hms_opt(self.boundary_hour, 0, 0).unwrap_or(NaiveTime::MIN);
        self.resolve_local(day_key.date().and_time(boundary))
    }

    /// Minutes since the day's boundary, not wrapped. Negative before the
    /// boundary, above 1440 after the next one.
    pub fn minutes_since_start(&self, day_key: DayKey, instant: DateTime<Utc>) -> f64 {
        let elapsed = instant - self.day_start(day_key);
        elapsed.num_milliseconds() as f64 / 60_000.0
    }

    fn resolve_local(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(value) => value.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // DST gap: the boundary does not exist locally, take the first instant after it
            LocalResult::None => self
                .timezone
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .map(|value| value.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DAY_MINUTES;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn day(value: &str) -> DayKey {
        DayKey::parse(value).expect("valid day key")
    }

    #[test]
    fn day_key_rolls_over_at_three_am() {
        let clock = DayBoundary::default();
        assert_eq!(clock.day_key_of(fixed_time("2026-03-09T02:59:59Z")), day("2026-03-08"));
        assert_eq!(clock.day_key_of(fixed_time("2026-03-09T03:00:00Z")), day("2026-03-09"));
        assert_eq!(clock.day_key_of(fixed_time("2026-03-09T23:30:00Z")), day("2026-03-09"));
    }

    #[test]
    fn minutes_count_from_boundary() {
        let clock = DayBoundary::default();
        let key = day("2026-03-09");
        assert_eq!(clock.minutes_since_start(key, fixed_time("2026-03-09T04:40:00Z")), 100.0);
        assert_eq!(clock.minutes_since_start(key, fixed_time("2026-03-10T02:00:00Z")), 1380.0);
        assert_eq!(clock.minutes_since_start(key, fixed_time("2026-03-10T04:00:00Z")), 1500.0);
        assert_eq!(clock.minutes_since_start(key, fixed_time("2026-03-09T02:00:00Z")), -60.0);
    }

    #[test]
    fn day_boundary_follows_configured_timezone() {
        let clock = DayBoundary::new(chrono_tz::Asia::Seoul, 3).expect("boundary");
        let boundary = fixed_time("2026-03-08T18:00:00Z");
        assert_eq!(clock.day_key_of(boundary), day("2026-03-09"));
        assert_eq!(clock.day_start(day("2026-03-09")), boundary);
        assert_eq!(clock.minutes_since_start(day("2026-03-09"), boundary), 0.0);
    }

    #[test]
    fn day_start_survives_dst_gap() {
        // 2026-03-08 02:00 does not exist in New York
        let clock = DayBoundary::new(chrono_tz::America::New_York, 2).expect("boundary");
        let start = clock.day_start(day("2026-03-08"));
        assert_eq!(start, fixed_time("2026-03-08T07:00:00Z"));
    }

    #[test]
    fn boundary_hour_is_validated() {
        assert!(DayBoundary::new(Tz::UTC, 24).is_err());
    }

    proptest! {
        #[test]
        fn instants_fall_within_their_own_day(seconds in 0i64..4_000_000_000i64) {
            let clock = DayBoundary::default();
            let instant = Utc.timestamp_opt(seconds, 0).single().expect("valid timestamp");
            let key = clock.day_key_of(instant);
            let offset = clock.minutes_since_start(key, instant);
            prop_assert!((0.0..DAY_MINUTES).contains(&offset));
        }
    }
}
