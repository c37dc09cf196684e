use chrono_tz::Tz;

use crate::debug_log;
use crate::types::{DailyMinutes, TrainingSession};

/// Bucket finished sessions into minutes per UTC calendar date.
pub fn aggregate(sessions: &[TrainingSession]) -> DailyMinutes {
    aggregate_in(sessions, chrono_tz::UTC)
}

/// Bucket finished sessions into minutes per calendar date in `tz`.
///
/// A session is attributed entirely to the date on which it started, even when
/// it runs past midnight. In-progress sessions are skipped. A session whose end
/// precedes its start contributes zero minutes but still marks its date.
pub fn aggregate_in(sessions: &[TrainingSession], tz: Tz) -> DailyMinutes {
    let mut daily = DailyMinutes::new();

    for session in sessions {
        let Some(minutes) = session.duration_minutes() else {
            continue;
        };

        if minutes < 0 {
            debug_log::log(
                "AGGREGATE",
                "clamp",
                &format!("session {} ends before it starts", session.id),
            );
        }

        let date = session.start_time.with_timezone(&tz).date_naive();
        let minutes = u32::try_from(minutes.max(0)).unwrap_or(u32::MAX);
        daily.add(date, minutes);
    }

    daily
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::build_grid;
    use crate::types::{Intensity, SessionId, UserId, YearMonth};
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn session(id: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> TrainingSession {
        TrainingSession {
            id: SessionId(id.to_string()),
            user_id: UserId::new("runner"),
            start_time: start,
            end_time: end,
            created_at: start,
            updated_at: end.unwrap_or(start),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_input_yields_empty_mapping() {
        let daily = aggregate(&[]);
        assert!(daily.is_empty());

        let grid = build_grid(YearMonth::new(2025, 3).unwrap(), &daily);
        assert!(
            grid.cells()
                .all(|c| c.minutes == 0 && c.intensity == Intensity::None)
        );
    }

    #[test]
    fn sessions_on_same_date_are_summed() {
        let sessions = vec![
            session("a", at(2025, 3, 4, 10, 0), Some(at(2025, 3, 4, 10, 25))),
            session("b", at(2025, 3, 4, 14, 0), Some(at(2025, 3, 4, 14, 50))),
        ];

        let daily = aggregate(&sessions);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily.minutes_on(day(2025, 3, 4)), 75);
        assert_eq!(
            Intensity::from_minutes(daily.minutes_on(day(2025, 3, 4))),
            Intensity::Medium
        );
    }

    #[test]
    fn in_progress_sessions_do_not_contribute() {
        let sessions = vec![
            session("open", at(2025, 3, 5, 9, 0), None),
            session("done", at(2025, 3, 6, 9, 0), Some(at(2025, 3, 6, 9, 30))),
        ];

        let daily = aggregate(&sessions);
        assert!(!daily.contains(day(2025, 3, 5)));
        assert_eq!(daily.minutes_on(day(2025, 3, 5)), 0);
        assert_eq!(daily.minutes_on(day(2025, 3, 6)), 30);
    }

    #[test]
    fn cross_midnight_session_counts_on_start_date() {
        let sessions = vec![session(
            "late",
            at(2025, 3, 7, 23, 50),
            Some(at(2025, 3, 8, 0, 10)),
        )];

        let daily = aggregate(&sessions);
        assert_eq!(daily.minutes_on(day(2025, 3, 7)), 20);
        assert!(!daily.contains(day(2025, 3, 8)));
    }

    #[test]
    fn negative_duration_is_clamped_to_zero() {
        let sessions = vec![
            session("backwards", at(2025, 3, 9, 12, 0), Some(at(2025, 3, 9, 11, 0))),
            session("fine", at(2025, 3, 10, 12, 0), Some(at(2025, 3, 10, 12, 45))),
        ];

        let daily = aggregate(&sessions);
        assert!(daily.contains(day(2025, 3, 9)));
        assert_eq!(daily.minutes_on(day(2025, 3, 9)), 0);
        assert_eq!(daily.minutes_on(day(2025, 3, 10)), 45);
        assert_eq!(daily.total_minutes(), 45);
    }

    #[test]
    fn durations_round_to_nearest_minute() {
        let start = at(2025, 4, 1, 8, 0);
        let sessions = vec![
            session("a", start, Some(start + Duration::seconds(29))),
            session("b", start + Duration::hours(1), Some(start + Duration::hours(1) + Duration::seconds(30))),
        ];

        // 29s rounds down to 0, 30s rounds up to 1.
        let daily = aggregate(&sessions);
        assert_eq!(daily.minutes_on(day(2025, 4, 1)), 1);
    }

    #[test]
    fn date_key_uses_reference_timezone() {
        // 2025-03-04 23:30 UTC is already 2025-03-05 in Tokyo.
        let sessions = vec![session(
            "tz",
            at(2025, 3, 4, 23, 30),
            Some(at(2025, 3, 5, 0, 30)),
        )];

        let utc = aggregate(&sessions);
        assert_eq!(utc.minutes_on(day(2025, 3, 4)), 60);

        let tokyo = aggregate_in(&sessions, chrono_tz::Asia::Tokyo);
        assert_eq!(tokyo.minutes_on(day(2025, 3, 5)), 60);
        assert!(!tokyo.contains(day(2025, 3, 4)));
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut sessions = vec![
            session("a", at(2025, 5, 1, 7, 0), Some(at(2025, 5, 1, 8, 0))),
            session("b", at(2025, 5, 2, 7, 0), Some(at(2025, 5, 2, 7, 15))),
            session("c", at(2025, 5, 1, 18, 0), Some(at(2025, 5, 1, 18, 40))),
        ];
        let forward = aggregate(&sessions);
        sessions.reverse();
        let backward = aggregate(&sessions);

        assert_eq!(forward, backward);
        assert_eq!(forward.minutes_on(day(2025, 5, 1)), 100);
        assert_eq!(aggregate(&sessions), backward);
    }
}
