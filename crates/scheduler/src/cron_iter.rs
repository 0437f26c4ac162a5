//! IANA-timezone and DST-aware cron iteration.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;

use crate::error::SchedulerError;

/// The `cron` crate parses the 6-field (seconds-first) dialect; schedules
/// are authored in standard 5-field Unix cron. Prepend a `0` seconds field
/// when the caller's expression has exactly 5 whitespace-separated fields.
fn normalize_cron_expr(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

pub fn parse_cron(expr: &str) -> Result<CronSchedule, SchedulerError> {
    CronSchedule::from_str(&normalize_cron_expr(expr))
        .map_err(|e| SchedulerError::CronInvalid(expr.to_string(), e.to_string()))
}

pub fn parse_timezone(tz: &str) -> Result<Tz, SchedulerError> {
    tz.parse::<Tz>().map_err(|_| SchedulerError::TzInvalid(tz.to_string()))
}

/// The prefix of `cron_iter(schedule)` starting at the first time
/// `>= max(now, floor)` and ending at `now + lookahead`, inclusive.
///
/// `floor` is the schedule's `last_scheduled_for` (or `None` for a
/// never-fired schedule, in which case iteration starts from `now`).
pub fn enumerate_due_times(
    cron_expr: &str,
    timezone: &str,
    now: DateTime<Utc>,
    floor: Option<DateTime<Utc>>,
    lookahead: chrono::Duration,
) -> Result<Vec<DateTime<Utc>>, SchedulerError> {
    let schedule = parse_cron(cron_expr)?;
    let tz = parse_timezone(timezone)?;

    let start = match floor {
        Some(floor) if floor > now => floor,
        _ => now,
    };
    let end = now + lookahead;
    let start_local = start.with_timezone(&tz);

    let times = schedule
        .after(&start_local)
        .take_while(|t| t.with_timezone(&Utc) <= end)
        .map(|t| t.with_timezone(&Utc))
        .collect();
    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn enumerates_hourly_fires_within_lookahead() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap();
        let times = enumerate_due_times("0 0 * * * *", "UTC", now, None, chrono::Duration::hours(3)).unwrap();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap());
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let err = parse_cron("not a cron expression").unwrap_err();
        assert!(matches!(err, SchedulerError::CronInvalid(_, _)));
    }

    #[test]
    fn floor_after_now_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap();
        let floor = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        let times = enumerate_due_times("0 0 * * * *", "UTC", now, Some(floor), chrono::Duration::hours(3)).unwrap();
        assert_eq!(times[0], Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap());
    }
}
