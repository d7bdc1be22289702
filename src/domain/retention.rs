//! Retention age arithmetic.
//!
//! The external policy deletes threads 365 days after their last message. A
//! thread is refreshed when its reference message is exactly
//! [`REFRESH_AGE_DAYS`] old, two days ahead of deletion.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// Age, in days, at which a thread is refreshed.
pub const REFRESH_AGE_DAYS: i64 = 363;

const MILLIS_PER_DAY: i64 = 24 * 3600 * 1000;

/// Midnight of `now`'s calendar day as seen from `offset`.
///
/// Ages are measured from this instant, so the count for a message does not
/// depend on what time of day the sweep happens to run.
pub fn start_of_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    now.with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Whole days elapsed between `sent_at` and `today`, rounded up.
///
/// Computed on epoch milliseconds and rounded with `ceil`, so every message
/// sent within the same 24 hour window relative to `today` gets the same
/// count. A message sent after `today` yields zero or a negative count.
pub fn days_elapsed(sent_at: DateTime<Utc>, today: DateTime<Utc>) -> i64 {
    let diff = today.timestamp_millis() - sent_at.timestamp_millis();
    let days = diff / MILLIS_PER_DAY;
    if diff % MILLIS_PER_DAY > 0 {
        days + 1
    } else {
        days
    }
}

/// Returns true when a thread of the given age must be refreshed today.
///
/// Equality, not `>=`: each thread qualifies on exactly one daily run. A run
/// missed on that day is not made up later.
pub fn is_refresh_due(days_elapsed: i64) -> bool {
    days_elapsed == REFRESH_AGE_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn exact_multiple_of_a_day_is_not_rounded_up() {
        let today = at(2024, 6, 1, 2, 30);
        assert_eq!(days_elapsed(today - Duration::days(363), today), 363);
    }

    #[test]
    fn partial_day_rounds_up() {
        let today = at(2024, 6, 1, 2, 30);
        let sent = today - Duration::days(362) - Duration::milliseconds(1);
        assert_eq!(days_elapsed(sent, today), 363);
    }

    #[test]
    fn same_calendar_day_yields_same_count_for_midnight_run() {
        let today = at(2024, 6, 1, 0, 0);
        let early = at(2023, 6, 4, 0, 1);
        let late = at(2023, 6, 4, 23, 59);
        assert_eq!(days_elapsed(early, today), days_elapsed(late, today));
        assert_eq!(days_elapsed(early, today), 363);
    }

    #[test]
    fn window_is_the_24_hours_ending_at_today() {
        let today = at(2024, 6, 1, 2, 30);
        let window_start = today - Duration::days(363) + Duration::minutes(1);
        let window_end = today - Duration::days(362) - Duration::minutes(1);
        assert_eq!(days_elapsed(window_start, today), 363);
        assert_eq!(days_elapsed(window_end, today), 363);
        assert_eq!(days_elapsed(window_end + Duration::minutes(2), today), 362);
        assert_eq!(days_elapsed(window_start - Duration::minutes(2), today), 364);
    }

    #[test]
    fn future_message_is_never_due() {
        let today = at(2024, 6, 1, 2, 30);
        let sent = today + Duration::hours(3);
        assert_eq!(days_elapsed(sent, today), 0);
        assert!(!is_refresh_due(days_elapsed(sent, today)));
    }

    #[test]
    fn only_exact_threshold_is_due() {
        assert!(!is_refresh_due(362));
        assert!(is_refresh_due(363));
        assert!(!is_refresh_due(364));
        assert!(!is_refresh_due(365));
    }

    #[test]
    fn run_time_of_day_does_not_change_the_count() {
        let run = at(2025, 6, 1, 2, 30);
        let today = start_of_day(run, FixedOffset::east_opt(0).unwrap());
        let early = at(2024, 6, 3, 0, 1);
        let late = at(2024, 6, 3, 23, 59);
        assert_eq!(days_elapsed(early, today), 363);
        assert_eq!(days_elapsed(late, today), 363);
    }

    #[test]
    fn start_of_day_in_utc() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(start_of_day(at(2025, 6, 1, 2, 30), offset), at(2025, 6, 1, 0, 0));
        assert_eq!(start_of_day(at(2025, 6, 1, 0, 0), offset), at(2025, 6, 1, 0, 0));
    }

    #[test]
    fn start_of_day_follows_offset() {
        // 02:30 UTC is still the previous evening five hours west.
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(start_of_day(at(2025, 6, 1, 2, 30), west), at(2025, 5, 31, 5, 0));

        let east = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(start_of_day(at(2025, 6, 1, 10, 0), east), at(2025, 5, 31, 15, 0));
    }
}
