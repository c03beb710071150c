use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeDelta, TimeZone, Utc};
use nova_planner::{
    run_check_once, Config, DeadlineNotification, GoalStorage, LeadInterval, NewGoal,
    NotificationDispatcher, NotificationSettings, Result,
};

#[derive(Default)]
struct Inbox(Mutex<Vec<DeadlineNotification>>);

#[async_trait]
impl NotificationDispatcher for Inbox {
    async fn dispatch(&self, notification: &DeadlineNotification) -> Result<()> {
        self.0.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[tokio::test]
async fn two_hours_before_deadline_fires_three_hour_reminder_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        user_id: "user-1".to_string(),
        ..Config::default()
    };
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

    let mut storage = GoalStorage::new(config.clone()).unwrap();
    storage.initialize(now.date_naive()).unwrap();
    let goal = storage
        .create_goal(
            NewGoal {
                wish: "Send the invoice".to_string(),
                deadline: Some((now + TimeDelta::hours(2)).to_rfc3339()),
                ..Default::default()
            },
            now,
        )
        .unwrap();
    storage
        .set_notification_settings(&NotificationSettings {
            enabled: true,
            intervals: vec![LeadInterval::ThreeHours],
            device_tokens: vec!["phone".to_string()],
        })
        .unwrap();

    let inbox = Arc::new(Inbox::default());
    let first = run_check_once(&storage, inbox.clone(), now).await.unwrap();
    assert_eq!(first.sent, 1);

    // A fresh process on the same day reads the persisted log
    let mut reopened = GoalStorage::new(config).unwrap();
    reopened.initialize(now.date_naive()).unwrap();
    let later = now + TimeDelta::minutes(45);
    let second = run_check_once(&reopened, inbox.clone(), later).await.unwrap();
    assert_eq!(second.sent, 0);
    assert_eq!(second.skipped_duplicates, 1);

    let sent = inbox.0.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].goal_id, goal.id);
    assert_eq!(sent[0].interval, LeadInterval::ThreeHours);
    assert_eq!(sent[0].body, "\"Send the invoice\" is due in 3 hours");
}

#[tokio::test]
async fn completed_goals_get_no_reminder() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut storage = GoalStorage::new(config).unwrap();
    storage.initialize(now.date_naive()).unwrap();

    let goal = storage
        .create_goal(
            NewGoal {
                wish: "Already done".to_string(),
                deadline: Some((now + TimeDelta::minutes(30)).to_rfc3339()),
                ..Default::default()
            },
            now,
        )
        .unwrap();
    storage.toggle_goal(goal.id, now.date_naive()).unwrap();
    storage
        .set_notification_settings(&NotificationSettings {
            enabled: true,
            intervals: LeadInterval::ALL.to_vec(),
            device_tokens: Vec::new(),
        })
        .unwrap();

    let inbox = Arc::new(Inbox::default());
    let summary = run_check_once(&storage, inbox.clone(), now).await.unwrap();
    assert_eq!(summary.sent, 0);
    assert!(inbox.0.lock().unwrap().is_empty());
}
