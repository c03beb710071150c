//! Deadline reminders.
//!
//! A reminder fires when the time left before a goal's deadline falls inside
//! one of the user's configured lead-interval windows. The windows are
//! contiguous and half-open (`lower < left <= upper`), so every remaining
//! duration up to seven days belongs to exactly one of them. A reminder for a
//! given user, goal and interval goes out at most once per calendar day; the
//! [`NotificationLog`] remembers the last day each one was sent.
use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{Goal, NovaError, Result};

/// How long before a deadline a reminder should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeadInterval {
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "3hours")]
    ThreeHours,
    #[serde(rename = "5hours")]
    FiveHours,
    #[serde(rename = "12hours")]
    TwelveHours,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "2days")]
    TwoDays,
    #[serde(rename = "3days")]
    ThreeDays,
    #[serde(rename = "7days")]
    SevenDays,
}

impl LeadInterval {
    /// Every interval, shortest first.
    pub const ALL: [LeadInterval; 8] = [
        LeadInterval::OneHour,
        LeadInterval::ThreeHours,
        LeadInterval::FiveHours,
        LeadInterval::TwelveHours,
        LeadInterval::OneDay,
        LeadInterval::TwoDays,
        LeadInterval::ThreeDays,
        LeadInterval::SevenDays,
    ];

    pub fn key(self) -> &'static str {
        match self {
            LeadInterval::OneHour => "1hour",
            LeadInterval::ThreeHours => "3hours",
            LeadInterval::FiveHours => "5hours",
            LeadInterval::TwelveHours => "12hours",
            LeadInterval::OneDay => "1day",
            LeadInterval::TwoDays => "2days",
            LeadInterval::ThreeDays => "3days",
            LeadInterval::SevenDays => "7days",
        }
    }

    /// Human wording used in reminder text.
    pub fn label(self) -> &'static str {
        match self {
            LeadInterval::OneHour => "1 hour",
            LeadInterval::ThreeHours => "3 hours",
            LeadInterval::FiveHours => "5 hours",
            LeadInterval::TwelveHours => "12 hours",
            LeadInterval::OneDay => "1 day",
            LeadInterval::TwoDays => "2 days",
            LeadInterval::ThreeDays => "3 days",
            LeadInterval::SevenDays => "7 days",
        }
    }

    fn hours(self) -> i64 {
        match self {
            LeadInterval::OneHour => 1,
            LeadInterval::ThreeHours => 3,
            LeadInterval::FiveHours => 5,
            LeadInterval::TwelveHours => 12,
            LeadInterval::OneDay => 24,
            LeadInterval::TwoDays => 48,
            LeadInterval::ThreeDays => 72,
            LeadInterval::SevenDays => 168,
        }
    }

    /// Inclusive upper edge of the window.
    pub fn upper_bound(self) -> TimeDelta {
        TimeDelta::hours(self.hours())
    }

    /// Exclusive lower edge of the window: the upper edge of the next shorter interval.
    pub fn lower_bound(self) -> TimeDelta {
        let position = Self::ALL.iter().position(|i| *i == self).unwrap_or(0);
        match position {
            0 => TimeDelta::zero(),
            p => Self::ALL[p - 1].upper_bound(),
        }
    }

    /// Whether `time_left` falls inside this interval's window.
    pub fn contains(self, time_left: TimeDelta) -> bool {
        time_left > self.lower_bound() && time_left <= self.upper_bound()
    }

    /// The single interval whose window holds `time_left`, if any.
    pub fn classify(time_left: TimeDelta) -> Option<LeadInterval> {
        Self::ALL.into_iter().find(|i| i.contains(time_left))
    }
}

impl fmt::Display for LeadInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LeadInterval {
    type Err = NovaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|i| i.key() == wanted)
            .ok_or_else(|| {
                NovaError::validation(format!(
                    "Unknown interval '{}': expected one of {}",
                    s,
                    Self::ALL.map(|i| i.key()).join(", ")
                ))
            })
    }
}

/// Per-user reminder preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub intervals: Vec<LeadInterval>,
    /// Push targets registered by the user's devices
    #[serde(default)]
    pub device_tokens: Vec<String>,
}

/// A user's goals together with their reminder settings, as scanned by the check.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    pub settings: NotificationSettings,
    pub goals: Vec<Goal>,
}

/// A reminder ready to be delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineNotification {
    pub user_id: String,
    pub goal_id: i64,
    pub interval: LeadInterval,
    pub title: String,
    pub body: String,
    pub deadline: DateTime<Utc>,
    pub device_tokens: Vec<String>,
}

impl DeadlineNotification {
    pub fn log_key(&self) -> String {
        NotificationLog::key(&self.user_id, self.goal_id, self.interval)
    }
}

/// Last day each `(user, goal, interval)` reminder was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationLog {
    entries: BTreeMap<String, NaiveDate>,
}

impl NotificationLog {
    pub fn key(user_id: &str, goal_id: i64, interval: LeadInterval) -> String {
        format!("{}_{}_{}", user_id, goal_id, interval.key())
    }

    pub fn sent_on(&self, key: &str, day: NaiveDate) -> bool {
        self.entries.get(key).is_some_and(|last| *last == day)
    }

    pub fn record(&mut self, key: String, day: NaiveDate) {
        self.entries.insert(key, day);
    }

    /// Drops entries older than `before`. Returns how many were removed.
    pub fn prune(&mut self, before: NaiveDate) -> usize {
        let len = self.entries.len();
        self.entries.retain(|_, day| *day >= before);
        len - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Delivers reminders to a user's devices.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &DeadlineNotification) -> Result<()>;
}

/// Dispatcher that writes reminders to the log instead of a push gateway.
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: &DeadlineNotification) -> Result<()> {
        if notification.device_tokens.is_empty() {
            info!(
                "[{}] {}: {} (no devices registered)",
                notification.user_id, notification.title, notification.body
            );
        } else {
            for token in &notification.device_tokens {
                info!(
                    "[{} -> {}] {}: {}",
                    notification.user_id, token, notification.title, notification.body
                );
            }
        }
        Ok(())
    }
}

/// Counters from one run of the deadline check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub users_scanned: usize,
    pub goals_scanned: usize,
    pub sent: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
}

/// Reminders due at `now` that have not gone out yet today.
///
/// Returns the pending reminders and how many qualifying ones were suppressed
/// because the log shows they were already sent today.
pub fn pending_notifications(
    users: &[UserRecord],
    now: DateTime<Utc>,
    log: &NotificationLog,
) -> (Vec<DeadlineNotification>, usize) {
    let today = now.date_naive();
    let mut pending = Vec::new();
    let mut duplicates = 0;

    for user in users {
        if !user.settings.enabled || user.settings.intervals.is_empty() {
            continue;
        }

        for goal in user.goals.iter().filter(|g| !g.completed) {
            let Some(deadline) = goal.deadline_at() else {
                continue;
            };
            let time_left = deadline - now;

            for interval in &user.settings.intervals {
                if !interval.contains(time_left) {
                    continue;
                }

                let key = NotificationLog::key(&user.user_id, goal.id, *interval);
                if log.sent_on(&key, today) {
                    debug!("Reminder {} already sent on {}", key, today);
                    duplicates += 1;
                    continue;
                }

                pending.push(DeadlineNotification {
                    user_id: user.user_id.clone(),
                    goal_id: goal.id,
                    interval: *interval,
                    title: "Goal deadline approaching".to_string(),
                    body: format!("\"{}\" is due in {}", goal.wish, interval.label()),
                    deadline,
                    device_tokens: user.settings.device_tokens.clone(),
                });
            }
        }
    }

    (pending, duplicates)
}

/// Runs one deadline check: finds due reminders, dispatches them and records
/// each delivered one in the log.
pub async fn run_deadline_check(
    users: &[UserRecord],
    now: DateTime<Utc>,
    log: &mut NotificationLog,
    dispatcher: Arc<dyn NotificationDispatcher>,
) -> CheckSummary {
    let today = now.date_naive();
    let (pending, skipped_duplicates) = pending_notifications(users, now, log);

    let mut summary = CheckSummary {
        users_scanned: users.iter().filter(|u| u.settings.enabled).count(),
        goals_scanned: users
            .iter()
            .filter(|u| u.settings.enabled)
            .map(|u| u.goals.len())
            .sum(),
        skipped_duplicates,
        ..Default::default()
    };

    for notification in pending {
        match dispatcher.dispatch(&notification).await {
            Ok(()) => {
                log.record(notification.log_key(), today);
                summary.sent += 1;
            }
            Err(e) => {
                warn!(
                    "Failed to send reminder for goal {} to {}: {}",
                    notification.goal_id, notification.user_id, e
                );
                summary.failed += 1;
            }
        }
    }

    info!(
        "Deadline check: {} users, {} goals, {} sent, {} already sent today, {} failed",
        summary.users_scanned,
        summary.goals_scanned,
        summary.sent,
        summary.skipped_duplicates,
        summary.failed
    );

    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::NewGoal;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn goal_due_in(id: i64, left: TimeDelta) -> Goal {
        let mut goal = Goal::new(
            NewGoal {
                wish: format!("Goal {}", id),
                deadline: Some((now() + left).to_rfc3339()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        goal.id = id;
        goal
    }

    fn user(intervals: Vec<LeadInterval>, goals: Vec<Goal>) -> UserRecord {
        UserRecord {
            user_id: "u1".to_string(),
            settings: NotificationSettings {
                enabled: true,
                intervals,
                device_tokens: vec!["device-a".to_string()],
            },
            goals,
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<DeadlineNotification>>,
    }

    #[async_trait]
    impl NotificationDispatcher for Recorder {
        async fn dispatch(&self, notification: &DeadlineNotification) -> Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl NotificationDispatcher for Failing {
        async fn dispatch(&self, _notification: &DeadlineNotification) -> Result<()> {
            Err(NovaError::RemoteService {
                message: "gateway down".to_string(),
            })
        }
    }

    #[test]
    fn windows_are_exclusive_at_boundaries() {
        assert_eq!(
            LeadInterval::classify(TimeDelta::hours(3)),
            Some(LeadInterval::ThreeHours)
        );
        assert_eq!(
            LeadInterval::classify(TimeDelta::hours(1)),
            Some(LeadInterval::OneHour)
        );
        assert_eq!(
            LeadInterval::classify(TimeDelta::hours(1) + TimeDelta::seconds(1)),
            Some(LeadInterval::ThreeHours)
        );
        assert_eq!(
            LeadInterval::classify(TimeDelta::hours(24)),
            Some(LeadInterval::OneDay)
        );
        assert_eq!(LeadInterval::classify(TimeDelta::zero()), None);
        assert_eq!(LeadInterval::classify(TimeDelta::hours(-2)), None);
        assert_eq!(LeadInterval::classify(TimeDelta::hours(169)), None);
    }

    #[test]
    fn windows_cover_every_minute_up_to_a_week() {
        for minutes in 1..=(7 * 24 * 60) {
            let left = TimeDelta::minutes(minutes);
            let matching = LeadInterval::ALL
                .iter()
                .filter(|i| i.contains(left))
                .count();
            assert_eq!(matching, 1, "{} minutes left", minutes);
        }
    }

    #[test]
    fn interval_keys_parse_and_serialize() {
        assert_eq!("12hours".parse::<LeadInterval>().unwrap(), LeadInterval::TwelveHours);
        assert!("4hours".parse::<LeadInterval>().is_err());
        assert_eq!(
            serde_json::to_string(&LeadInterval::TwoDays).unwrap(),
            "\"2days\""
        );
    }

    #[test]
    fn only_configured_intervals_fire() {
        let users = vec![user(
            vec![LeadInterval::OneDay],
            vec![goal_due_in(1, TimeDelta::hours(2))],
        )];
        let (pending, _) = pending_notifications(&users, now(), &NotificationLog::default());
        assert!(pending.is_empty());
    }

    #[test]
    fn completed_disabled_and_deadline_free_goals_are_skipped() {
        let mut done = goal_due_in(1, TimeDelta::hours(2));
        done.completed = true;
        let mut no_deadline = goal_due_in(2, TimeDelta::hours(2));
        no_deadline.deadline = Some(String::new());

        let mut disabled = user(
            vec![LeadInterval::ThreeHours],
            vec![goal_due_in(3, TimeDelta::hours(2))],
        );
        disabled.settings.enabled = false;

        let users = vec![
            user(vec![LeadInterval::ThreeHours], vec![done, no_deadline]),
            disabled,
        ];
        let (pending, _) = pending_notifications(&users, now(), &NotificationLog::default());
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn reminder_fires_once_per_day() {
        let users = vec![user(
            vec![LeadInterval::ThreeHours, LeadInterval::OneDay],
            vec![goal_due_in(7, TimeDelta::hours(2))],
        )];
        let recorder = Arc::new(Recorder::default());
        let mut log = NotificationLog::default();

        let first = run_deadline_check(&users, now(), &mut log, recorder.clone()).await;
        assert_eq!(first.sent, 1);
        {
            let sent = recorder.sent.lock().unwrap();
            assert_eq!(sent[0].interval, LeadInterval::ThreeHours);
            assert_eq!(sent[0].body, "\"Goal 7\" is due in 3 hours");
            assert_eq!(sent[0].device_tokens, vec!["device-a".to_string()]);
        }

        let later = now() + TimeDelta::minutes(30);
        let second = run_deadline_check(&users, later, &mut log, recorder.clone()).await;
        assert_eq!(second.sent, 0);
        assert_eq!(second.skipped_duplicates, 1);
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_dispatch_is_not_recorded() {
        let users = vec![user(
            vec![LeadInterval::ThreeHours],
            vec![goal_due_in(9, TimeDelta::hours(2))],
        )];
        let mut log = NotificationLog::default();

        let summary = run_deadline_check(&users, now(), &mut log, Arc::new(Failing)).await;
        assert_eq!(summary.failed, 1);
        assert!(log.is_empty());
    }

    #[test]
    fn log_prunes_old_days() {
        let mut log = NotificationLog::default();
        let day = now().date_naive();
        log.record("a".to_string(), day.pred_opt().unwrap());
        log.record("b".to_string(), day);
        assert_eq!(log.prune(day), 1);
        assert!(log.sent_on("b", day));
        assert!(!log.sent_on("a", day));
    }
}
