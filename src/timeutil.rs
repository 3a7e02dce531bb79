//! Pure time arithmetic: slot ends, wall-clock time of day, weekly series.

use std::num::NonZeroU32;

use chrono::{Datelike, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::model::Timestamp;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Four-digit calendar years only. chrono parses signed six-digit years that
/// sit next to the end of its representable range.
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// `None` when the end falls outside chrono's representable range.
pub fn end_from_start(start: Timestamp, duration_minutes: u32) -> Option<Timestamp> {
    start.checked_add_signed(Duration::minutes(i64::from(duration_minutes)))
}

/// Minute-of-day on the venue's wall clock, seconds zeroed ("HH:MM:00").
pub fn time_of_day(at: Timestamp, venue: FixedOffset) -> NaiveTime {
    let local = at.with_timezone(&venue).time();
    NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or(local)
}

/// `count` starts spaced exactly 7 days apart, the first being `start`.
/// `None` if any of them is out of range.
pub fn weekly_occurrences(start: Timestamp, count: NonZeroU32) -> Option<Vec<Timestamp>> {
    (0..count.get())
        .map(|week| start.checked_add_signed(Duration::weeks(i64::from(week))))
        .collect()
}

/// Parse a client-supplied start. RFC 3339 strings keep their own offset;
/// naive `YYYY-MM-DDTHH:MM[:SS]` strings are read on the venue's wall clock.
pub fn parse_start(input: &str, venue: FixedOffset) -> Option<Timestamp> {
    let input = input.trim();
    let parsed = match chrono::DateTime::parse_from_rfc3339(input) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
            .and_then(|naive| venue.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc)),
    };
    parsed.filter(|dt| YEARS.contains(&dt.year()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::at;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn end_adds_slot_duration() {
        let start = at(2025, 6, 1, 19, 0);
        assert_eq!(end_from_start(start, 60), Some(at(2025, 6, 1, 20, 0)));
        assert_eq!(end_from_start(start, 90), Some(at(2025, 6, 1, 20, 30)));
        // Crosses midnight
        assert_eq!(end_from_start(at(2025, 6, 1, 23, 30), 60), Some(at(2025, 6, 2, 0, 30)));
    }

    #[test]
    fn arithmetic_near_the_end_of_time_is_none() {
        let last = chrono::DateTime::<Utc>::MAX_UTC;
        assert_eq!(end_from_start(last, 60), None);
        assert_eq!(weekly_occurrences(last, NonZeroU32::new(4).unwrap()), None);
        // A single occurrence never moves
        assert_eq!(weekly_occurrences(last, NonZeroU32::MIN), Some(vec![last]));
    }

    #[test]
    fn time_of_day_truncates_seconds() {
        let start = at(2025, 6, 1, 19, 5) + Duration::seconds(42);
        let t = time_of_day(start, utc());
        assert_eq!(t, NaiveTime::from_hms_opt(19, 5, 0).unwrap());
        assert_eq!(t.format("%H:%M:%S").to_string(), "19:05:00");
    }

    #[test]
    fn time_of_day_uses_venue_clock() {
        let venue = FixedOffset::east_opt(7 * 3600).unwrap();
        // 12:00 UTC is 19:00 in UTC+7
        let t = time_of_day(at(2025, 6, 1, 12, 0), venue);
        assert_eq!(t, NaiveTime::from_hms_opt(19, 0, 0).unwrap());
    }

    #[test]
    fn weekly_occurrences_are_seven_days_apart() {
        let start = at(2025, 6, 2, 8, 0);
        let dates = weekly_occurrences(start, NonZeroU32::new(3).unwrap());
        assert_eq!(
            dates,
            Some(vec![at(2025, 6, 2, 8, 0), at(2025, 6, 9, 8, 0), at(2025, 6, 16, 8, 0)])
        );
    }

    #[test]
    fn single_occurrence_is_degenerate_series() {
        let start = at(2025, 6, 2, 8, 0);
        assert_eq!(weekly_occurrences(start, NonZeroU32::MIN), Some(vec![start]));
    }

    #[test]
    fn parse_start_accepts_offset_and_naive_forms() {
        let venue = FixedOffset::east_opt(7 * 3600).unwrap();
        assert_eq!(
            parse_start("2025-06-01T19:00:00Z", venue),
            Some(at(2025, 6, 1, 19, 0))
        );
        assert_eq!(
            parse_start("2025-06-01T19:00:00+07:00", venue),
            Some(at(2025, 6, 1, 12, 0))
        );
        assert_eq!(parse_start("2025-06-01T19:00", venue), Some(at(2025, 6, 1, 12, 0)));
        assert_eq!(parse_start("2025-06-01T19:00:00", utc()), Some(at(2025, 6, 1, 19, 0)));
        assert_eq!(parse_start("next tuesday", venue), None);
    }

    #[test]
    fn parse_start_rejects_extended_years() {
        let venue = FixedOffset::east_opt(7 * 3600).unwrap();
        assert_eq!(parse_start("+262142-12-25T08:00", venue), None);
        assert_eq!(parse_start("+262142-12-25T08:00:00Z", venue), None);
        assert_eq!(parse_start("-0001-01-01T08:00", venue), None);
        assert_eq!(parse_start("9999-12-25T08:00", utc()), Some(at(9999, 12, 25, 8, 0)));
    }
}
