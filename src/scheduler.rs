//! Task scheduling for the daemon.
//!
//! Each recurring piece of work is a named job with a [`Cadence`]: a
//! fixed interval, or the next occurrence of a weekday + time of day.
//! A job coordinator computes the next fire time, sleeps until it, and
//! dispatches; a failed run is logged and the job simply waits for its
//! next slot, so one bad cycle never takes the schedule down.

use chrono::{DateTime, Datelike, Days, NaiveTime, Utc, Weekday};
use std::future::Future;
use std::time::Duration;

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every fixed interval, measured from the previous fire.
    Every(Duration),
    /// The next occurrence of `weekday` at `at` (UTC).
    Weekly { weekday: Weekday, at: NaiveTime },
}

impl Cadence {
    /// Compute the first fire time strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Every(interval) => {
                after + chrono::Duration::seconds(interval.as_secs() as i64)
            }
            Cadence::Weekly { weekday, at } => {
                let date = after.date_naive();
                for offset in 0..=7u64 {
                    let Some(candidate_date) = date.checked_add_days(Days::new(offset)) else {
                        continue;
                    };
                    if candidate_date.weekday() != *weekday {
                        continue;
                    }
                    let candidate = candidate_date.and_time(*at).and_utc();
                    if candidate > after {
                        return candidate;
                    }
                }
                // A strictly later occurrence always exists within 8 days.
                date.and_time(*at).and_utc() + chrono::Duration::weeks(1)
            }
        }
    }
}

/// Drive one named job forever.
///
/// Sleeps until the cadence's next fire time, runs the task, logs the
/// outcome, repeats. Never returns.
pub async fn run_job<F, Fut>(name: &'static str, cadence: Cadence, mut task: F)
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    loop {
        let now = Utc::now();
        let next = cadence.next_fire(now);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tracing::info!(job = name, next = %next, "job scheduled");
        tokio::time::sleep(wait).await;

        match task().await {
            Ok(()) => tracing::info!(job = name, "job run completed"),
            Err(err) => tracing::error!(job = name, error = %err, "job run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn interval_cadence_advances_by_the_interval() {
        let cadence = Cadence::Every(Duration::from_secs(4 * 3600));
        let after = Utc.with_ymd_and_hms(2025, 6, 4, 12, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(after),
            Utc.with_ymd_and_hms(2025, 6, 4, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn weekly_cadence_finds_the_next_weekday() {
        // 2025-06-04 is a Wednesday; next Sunday 10:00 is 2025-06-08.
        let cadence = Cadence::Weekly {
            weekday: Weekday::Sun,
            at: at(10, 0),
        };
        let after = Utc.with_ymd_and_hms(2025, 6, 4, 12, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(after),
            Utc.with_ymd_and_hms(2025, 6, 8, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn weekly_cadence_fires_later_the_same_day() {
        // 2025-06-08 is a Sunday; 08:00 is before the 10:00 slot.
        let cadence = Cadence::Weekly {
            weekday: Weekday::Sun,
            at: at(10, 0),
        };
        let after = Utc.with_ymd_and_hms(2025, 6, 8, 8, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(after),
            Utc.with_ymd_and_hms(2025, 6, 8, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn weekly_cadence_is_strictly_after() {
        // Exactly at the slot: the next fire is a week out.
        let cadence = Cadence::Weekly {
            weekday: Weekday::Sun,
            at: at(10, 0),
        };
        let after = Utc.with_ymd_and_hms(2025, 6, 8, 10, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(after),
            Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap()
        );
    }
}
