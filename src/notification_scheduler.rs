// src/notification_scheduler.rs - Deadline check scheduler module
use std::sync::{Arc, Mutex as StdMutex, Weak};

use chrono::{DateTime, Days, Utc};
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use crate::{run_deadline_check, CheckSummary, GoalStorage, NotificationDispatcher, NovaError, Result};

#[derive(Debug, Clone, Default)]
pub struct NotificationSchedulerStatus {
    /// Whether the scheduler is running
    pub is_running: bool,
    /// When the last check finished
    pub last_run: Option<DateTime<Utc>>,
    /// Summary of the last check
    pub last_summary: Option<CheckSummary>,
    /// Reminders sent since the scheduler started
    pub total_sent: usize,
}

#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a check immediately and report its summary
    RunNow { reply: oneshot::Sender<CheckSummary> },
    /// Stop the scheduler
    Stop,
}

/// Runs one deadline check against the stored goals and persists the log.
///
/// Log entries older than `notification_log_days` are dropped first.
pub async fn run_check_once(
    storage: &GoalStorage,
    dispatcher: Arc<dyn NotificationDispatcher>,
    now: DateTime<Utc>,
) -> Result<CheckSummary> {
    let mut log = storage.notification_log()?;
    let keep_days = u64::from(storage.config().notification_log_days);
    if let Some(cutoff) = now.date_naive().checked_sub_days(Days::new(keep_days)) {
        let pruned = log.prune(cutoff);
        if pruned > 0 {
            debug!("Pruned {} notification log entries before {}", pruned, cutoff);
        }
    }

    let users = storage.notification_users()?;
    let summary = run_deadline_check(&users, now, &mut log, dispatcher).await;
    storage.save_notification_log(&log)?;
    Ok(summary)
}

pub struct NotificationScheduler {
    /// Hours between scheduled checks
    interval_hours: u32,

    /// Where reminders are delivered
    dispatcher: Arc<dyn NotificationDispatcher>,

    /// Channel to send commands to the scheduler task
    command_tx: Option<mpsc::Sender<SchedulerCommand>>,

    /// Handle to the scheduler task
    scheduler_task: Option<JoinHandle<()>>,

    /// Status shared with the scheduler task
    status: Arc<StdMutex<NotificationSchedulerStatus>>,

    /// Weak reference to the storage
    storage: Option<Weak<Mutex<GoalStorage>>>,
}

impl NotificationScheduler {
    /// Create a new scheduler checking every `interval_hours` hours
    pub fn new(interval_hours: u32, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        info!(
            "Initializing notification scheduler with a {} hour interval",
            interval_hours
        );
        Self {
            interval_hours: interval_hours.max(1),
            dispatcher,
            command_tx: None,
            scheduler_task: None,
            status: Arc::new(StdMutex::new(NotificationSchedulerStatus::default())),
            storage: None,
        }
    }

    /// Set the weak reference to GoalStorage
    pub fn set_storage(&mut self, storage: Arc<Mutex<GoalStorage>>) {
        self.storage = Some(Arc::downgrade(&storage));
        info!("Storage reference set in NotificationScheduler.");
    }

    /// Start the scheduler. The first check runs right away.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting notification scheduler...");
        if self.scheduler_task.is_some() {
            debug!("Notification scheduler is already running");
            return Ok(());
        }

        let storage = match &self.storage {
            Some(weak) => match weak.upgrade() {
                Some(strong) => strong,
                None => {
                    error!("Failed to retrieve GoalStorage - reference is no longer valid.");
                    return Err(NovaError::ApplicationError {
                        message: "GoalStorage reference is no longer valid.".to_string(),
                    });
                }
            },
            None => {
                error!("No storage reference found in NotificationScheduler.");
                return Err(NovaError::ApplicationError {
                    message: "NotificationScheduler does not have a storage reference."
                        .to_string(),
                });
            }
        };

        let (command_tx, mut command_rx) = mpsc::channel(10);
        self.command_tx = Some(command_tx);

        let period = Duration::from_secs(u64::from(self.interval_hours) * 3600);
        let dispatcher = Arc::clone(&self.dispatcher);
        let status = Arc::clone(&self.status);

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let guard = storage.lock().await;
                        match run_check_once(&guard, Arc::clone(&dispatcher), Utc::now()).await {
                            Ok(summary) => record_run(&status, summary),
                            Err(e) => error!("Scheduled deadline check failed: {}", e),
                        }
                    }
                    Some(cmd) = command_rx.recv() => match cmd {
                        SchedulerCommand::RunNow { reply } => {
                            let guard = storage.lock().await;
                            match run_check_once(&guard, Arc::clone(&dispatcher), Utc::now()).await {
                                Ok(summary) => {
                                    record_run(&status, summary.clone());
                                    if reply.send(summary).is_err() {
                                        debug!("Run-now requester went away before the reply");
                                    }
                                }
                                Err(e) => error!("Manual deadline check failed: {}", e),
                            }
                        }
                        SchedulerCommand::Stop => {
                            info!("Notification scheduler stopping...");
                            break;
                        }
                    }
                }
            }
        });

        self.scheduler_task = Some(task);
        if let Ok(mut status) = self.status.lock() {
            status.is_running = true;
        }

        Ok(())
    }

    /// Stop the scheduler if it's running
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.scheduler_task.take() {
            if let Some(tx) = self.command_tx.take() {
                if let Err(e) = tx.send(SchedulerCommand::Stop).await {
                    error!("Failed to send stop command to notification scheduler: {}", e);
                }
            }

            if let Err(e) = task.await {
                let error_mgs = format!("Failed to stop notification scheduler: {}", e);
                error!("{}", error_mgs);
                return Err(NovaError::Scheduler { message: error_mgs });
            }

            if let Ok(mut status) = self.status.lock() {
                status.is_running = false;
            }
            info!("Notification scheduler stopped");
        } else {
            debug!("Notification scheduler is not running");
        }

        Ok(())
    }

    /// Run a check immediately, regardless of the schedule
    pub async fn run_now(&self) -> Result<CheckSummary> {
        let Some(tx) = &self.command_tx else {
            return Err(NovaError::Scheduler {
                message: "Notification scheduler is not running".to_string(),
            });
        };

        let (reply, response) = oneshot::channel();
        tx.send(SchedulerCommand::RunNow { reply })
            .await
            .map_err(|e| NovaError::Scheduler {
                message: format!("Failed to send run command: {}", e),
            })?;

        response.await.map_err(|_| NovaError::Scheduler {
            message: "Deadline check did not complete".to_string(),
        })
    }

    /// Get the current status of the scheduler
    pub fn get_status(&self) -> NotificationSchedulerStatus {
        self.status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }
}

fn record_run(status: &StdMutex<NotificationSchedulerStatus>, summary: CheckSummary) {
    if let Ok(mut status) = status.lock() {
        status.last_run = Some(Utc::now());
        status.total_sent += summary.sent;
        status.last_summary = Some(summary);
    }
}
