use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use tracing::warn;

use crate::models::{Reminder, ScheduleType};

/// Weekly schedules scan at most this many days ahead before falling back.
const WEEKLY_SCAN_DAYS: i64 = 14;

const DAILY_DEFAULT_INTERVAL_MINUTES: i64 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextOccurrence {
    pub next_trigger: Option<DateTime<Utc>>,
    pub active: bool,
}

impl NextOccurrence {
    fn finished() -> Self {
        Self { next_trigger: None, active: false }
    }

    fn at(next_trigger: DateTime<Utc>) -> Self {
        Self { next_trigger: Some(next_trigger), active: true }
    }
}

/// Computes a reminder's next trigger instant after a dispatch at `now`.
///
/// The result is always strictly in the future (catch-up stepping, not
/// drift-compounding), or `finished` for schedules with nothing left to
/// fire. All calendar math happens in UTC.
pub fn compute_next(reminder: &Reminder, now: DateTime<Utc>) -> NextOccurrence {
    match reminder.schedule_type {
        ScheduleType::Once => NextOccurrence::finished(),
        ScheduleType::Custom => match positive_interval(reminder) {
            Some(interval) => step_past(reminder, now, interval),
            None => {
                warn!(
                    reminder_id = %reminder.id,
                    "custom reminder has no positive recurrence interval, deactivating"
                );
                NextOccurrence::finished()
            }
        },
        ScheduleType::Daily => {
            let interval = positive_interval(reminder).unwrap_or(DAILY_DEFAULT_INTERVAL_MINUTES);
            step_past(reminder, now, interval)
        }
        ScheduleType::Weekly => next_weekly(reminder, now),
    }
}

fn positive_interval(reminder: &Reminder) -> Option<i64> {
    reminder.recurrence_interval_minutes.filter(|minutes| *minutes > 0)
}

/// Steps from the current trigger (or the start instant) in whole intervals
/// until the result passes `now`. Keeps successive triggers congruent to the
/// start instant modulo the interval no matter how late the cycle ran.
fn step_past(reminder: &Reminder, now: DateTime<Utc>, interval_minutes: i64) -> NextOccurrence {
    let mut next = reminder.next_trigger_at.unwrap_or(reminder.start_time);
    while next <= now {
        next += Duration::minutes(interval_minutes);
    }
    NextOccurrence::at(next)
}

/// Weekly triggers preserve the start instant's UTC time-of-day and fire on
/// the configured weekdays (0 = Sunday .. 6 = Saturday), defaulting to the
/// start instant's weekday when no days were configured.
fn next_weekly(reminder: &Reminder, now: DateTime<Utc>) -> NextOccurrence {
    let start = reminder.start_time;

    let days: Vec<u32> = match reminder.days_of_week.as_ref().filter(|days| !days.is_empty()) {
        Some(days) => days.clone(),
        None => vec![start.weekday().num_days_from_sunday()],
    };

    let anchor = now
        .date_naive()
        .and_hms_opt(start.hour(), start.minute(), start.second())
        .unwrap()
        .and_utc();

    for offset in 0..=WEEKLY_SCAN_DAYS {
        let candidate = anchor + Duration::days(offset);
        if candidate > now && days.contains(&candidate.weekday().num_days_from_sunday()) {
            return NextOccurrence::at(candidate);
        }
    }

    // Unreachable with a valid non-empty day set; guards a pathological
    // configuration by pushing the schedule a week out.
    NextOccurrence::at(anchor + Duration::days(7))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn utc(value: &str) -> DateTime<Utc> {
        value.parse().unwrap()
    }

    fn test_reminder(schedule_type: ScheduleType) -> Reminder {
        Reminder {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            title: Some("Losartan 50mg".to_string()),
            message: None,
            content: None,
            body: None,
            schedule_type,
            start_time: utc("2024-01-01T09:00:00Z"),
            recurrence_interval_minutes: None,
            days_of_week: None,
            timezone: "UTC".to_string(),
            active: true,
            next_trigger_at: None,
            last_triggered_at: None,
            channels: None,
            notify_email: true,
            notify_push: false,
            created_at: utc("2024-01-01T00:00:00Z"),
            updated_at: utc("2024-01-01T00:00:00Z"),
        }
    }

    #[test]
    fn once_deactivates_regardless_of_lateness() {
        let mut reminder = test_reminder(ScheduleType::Once);
        reminder.next_trigger_at = Some(utc("2024-01-01T09:00:00Z"));

        let next = compute_next(&reminder, utc("2024-03-01T00:00:00Z"));

        assert_eq!(next, NextOccurrence { next_trigger: None, active: false });
    }

    #[test]
    fn custom_steps_strictly_past_now() {
        let mut reminder = test_reminder(ScheduleType::Custom);
        reminder.recurrence_interval_minutes = Some(90);
        reminder.next_trigger_at = Some(utc("2024-01-01T09:00:00Z"));

        let now = utc("2024-01-03T10:05:00Z");
        let next = compute_next(&reminder, now);

        let trigger = next.next_trigger.unwrap();
        assert!(next.active);
        assert!(trigger > now);
        // Catch-up keeps the new trigger on the original 90-minute grid.
        let elapsed = trigger - utc("2024-01-01T09:00:00Z");
        assert_eq!(elapsed.num_minutes() % 90, 0);
        assert!(trigger - now <= Duration::minutes(90));
    }

    #[test]
    fn custom_with_future_trigger_is_left_alone() {
        let mut reminder = test_reminder(ScheduleType::Custom);
        reminder.recurrence_interval_minutes = Some(60);
        reminder.next_trigger_at = Some(utc("2024-01-02T12:00:00Z"));

        let next = compute_next(&reminder, utc("2024-01-02T09:00:00Z"));

        assert_eq!(next.next_trigger, Some(utc("2024-01-02T12:00:00Z")));
        assert!(next.active);
    }

    #[test]
    fn custom_without_positive_interval_deactivates() {
        let mut reminder = test_reminder(ScheduleType::Custom);
        reminder.recurrence_interval_minutes = Some(0);

        let next = compute_next(&reminder, utc("2024-01-02T09:00:00Z"));

        assert_eq!(next, NextOccurrence { next_trigger: None, active: false });
    }

    #[test]
    fn daily_defaults_to_one_day_interval() {
        let mut reminder = test_reminder(ScheduleType::Daily);
        reminder.next_trigger_at = Some(utc("2024-01-05T09:00:00Z"));

        let next = compute_next(&reminder, utc("2024-01-05T09:00:01Z"));

        assert_eq!(next.next_trigger, Some(utc("2024-01-06T09:00:00Z")));
        assert!(next.active);
    }

    #[test]
    fn daily_falls_back_to_start_time_without_current_trigger() {
        let reminder = test_reminder(ScheduleType::Daily);

        let next = compute_next(&reminder, utc("2024-01-03T10:00:00Z"));

        assert_eq!(next.next_trigger, Some(utc("2024-01-04T09:00:00Z")));
    }

    #[test]
    fn weekly_picks_next_configured_day_at_start_time_of_day() {
        let mut reminder = test_reminder(ScheduleType::Weekly);
        // Mon/Wed/Fri at 09:00 UTC.
        reminder.days_of_week = Some(vec![1, 3, 5]);

        // 2024-06-04 is a Tuesday.
        let next = compute_next(&reminder, utc("2024-06-04T10:00:00Z"));

        assert_eq!(next.next_trigger, Some(utc("2024-06-05T09:00:00Z")));
        assert!(next.active);
    }

    #[test]
    fn weekly_can_fire_later_the_same_day() {
        let mut reminder = test_reminder(ScheduleType::Weekly);
        reminder.days_of_week = Some(vec![2]);

        let next = compute_next(&reminder, utc("2024-06-04T08:00:00Z"));

        assert_eq!(next.next_trigger, Some(utc("2024-06-04T09:00:00Z")));
    }

    #[test]
    fn weekly_without_days_uses_start_weekday() {
        let reminder = test_reminder(ScheduleType::Weekly);
        // start_time 2024-01-01 is a Monday; next Monday after Tuesday the
        // 4th of June is the 10th.
        let next = compute_next(&reminder, utc("2024-06-04T10:00:00Z"));

        assert_eq!(next.next_trigger, Some(utc("2024-06-10T09:00:00Z")));
    }
}
