//! Weekly rollover scheduling.
//!
//! The deployed tracker resets totals at Saturday 00:00 local time
//! (Friday day-end).  The next firing instant is computed by the pure
//! [`next_rollover_after`], so tests exercise the cadence — and trigger
//! rollovers through [`crate::store::AggregateStore::rollover`] directly —
//! without ever waiting on the wall clock.  The spawned task is plain
//! `tokio::spawn` glue around it and can be aborted through its handle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::notify::Notifier;
use crate::store::AggregateStore;

/// The first Saturday 00:00 local strictly after `now`.
pub fn next_rollover_after(now: DateTime<Local>) -> DateTime<Local> {
    let mut date = now.date_naive();
    loop {
        date = match date.succ_opt() {
            Some(d) => d,
            None => return now, // calendar overflow, unreachable in practice
        };
        if date.weekday() != Weekday::Sat {
            continue;
        }
        if let Some(at) = local_midnight(date) {
            if at > now {
                return at;
            }
        }
    }
}

/// Midnight of `date` in local time.  A DST gap swallowing midnight shifts
/// the instant to 01:00 rather than skipping the week.
fn local_midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(midnight + chrono::Duration::hours(1)))
                .earliest()
        })
}

/// Run the weekly rollover loop until aborted.
pub fn spawn_weekly_rollover(
    store: Arc<AggregateStore>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let fire_at = next_rollover_after(now);
            let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            info!("Next weekly rollover scheduled for {fire_at}");
            tokio::time::sleep(wait).await;

            match store.rollover().await {
                Ok(snapshot) => {
                    info!(
                        "Weekly rollover executed; {} account(s) archived",
                        snapshot.len()
                    );
                    // Best-effort: the rollover has already committed, a
                    // failed summary is logged inside the notifier and
                    // never retried or rolled back.
                    notifier.post_rollover_summary().await;
                }
                Err(e) => {
                    // State is fully unchanged; the next trigger retries.
                    error!("Weekly rollover failed, state unchanged: {e}");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    // 2024-01-01 was a Monday, 2024-01-06 a Saturday.

    #[test]
    fn fires_on_the_coming_saturday_midnight() {
        let next = next_rollover_after(local(2024, 1, 1, 12, 0));
        assert_eq!(next, local(2024, 1, 6, 0, 0));
    }

    #[test]
    fn friday_day_end_rolls_into_saturday() {
        let next = next_rollover_after(local(2024, 1, 5, 23, 59));
        assert_eq!(next, local(2024, 1, 6, 0, 0));
    }

    #[test]
    fn saturday_midnight_itself_waits_a_full_week() {
        let next = next_rollover_after(local(2024, 1, 6, 0, 0));
        assert_eq!(next, local(2024, 1, 13, 0, 0));
    }

    #[test]
    fn mid_saturday_waits_for_the_next_one() {
        let next = next_rollover_after(local(2024, 1, 6, 15, 30));
        assert_eq!(next, local(2024, 1, 13, 0, 0));
    }

    #[test]
    fn always_strictly_in_the_future_and_within_a_week() {
        let now = Local::now();
        let next = next_rollover_after(now);
        assert!(next > now);
        assert!(next - now <= chrono::Duration::days(7));
        assert_eq!(next.weekday(), Weekday::Sat);
    }
}
