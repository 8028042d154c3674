//! Process-wide job scheduling.
//!
//! One [`JobScheduler`] is built at startup and handed to whatever needs to
//! enqueue work. It owns both queues, the recurring refresh timer and the
//! cancellation token that stops all of them.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use floodguard_config::JobsConfig;
use floodguard_models::{Notification, NotificationDispatcher};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::notify::{DeliveryHandler, PushDelivery, QueueNotificationDispatcher};
use crate::queue::{DeadLetter, Enqueued, JobHandler, JobQueue, QueueOptions};
use crate::retry::RetryPolicy;
use crate::risk::RiskJob;
use crate::QueueError;

/// Idempotency key of the recurring full cycle.
pub const CRON_KEY: &str = "risk-refresh:cron";

/// Owns the risk and notification queues and the refresh timer.
pub struct JobScheduler {
    config: JobsConfig,
    cancel: CancellationToken,
    notifications: Arc<JobQueue<Notification>>,
    risk: OnceLock<Arc<JobQueue<RiskJob>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Creates the scheduler and starts the notification queue so a
    /// [`Self::notifier`] is available before the risk side is wired up.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: JobsConfig, delivery: Arc<dyn PushDelivery>) -> Self {
        let cancel = CancellationToken::new();
        let notifications = Arc::new(JobQueue::start(
            "notifications",
            Arc::new(DeliveryHandler::new(delivery)),
            queue_options(&config, config.notification_workers),
            cancel.child_token(),
        ));

        Self {
            config,
            cancel,
            notifications,
            risk: OnceLock::new(),
            timer: Mutex::new(None),
        }
    }

    /// Fire-and-forget notification sink backed by the notification queue.
    #[must_use]
    pub fn notifier(&self) -> Arc<dyn NotificationDispatcher> {
        Arc::new(QueueNotificationDispatcher::new(Arc::clone(&self.notifications)))
    }

    /// Starts the risk queue and the recurring full-cycle timer. The first
    /// cycle is queued immediately.
    ///
    /// Calling this twice is a no-op.
    pub fn start(&self, handler: Arc<dyn JobHandler<RiskJob>>) {
        if self.risk.get().is_some() {
            log::warn!("Job scheduler already started");
            return;
        }

        let queue = Arc::new(JobQueue::start(
            "risk",
            handler,
            queue_options(&self.config, self.config.risk_workers),
            self.cancel.child_token(),
        ));
        if self.risk.set(Arc::clone(&queue)).is_err() {
            return;
        }

        let interval = Duration::from_secs(self.config.refresh_interval_secs.max(1));
        let cancel = self.cancel.clone();

        let timer = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        match queue.try_enqueue(Some(CRON_KEY.to_string()), RiskJob::FullCycle) {
                            Ok(Enqueued::Queued) => log::debug!("Queued scheduled full cycle"),
                            Ok(Enqueued::Duplicate) => {
                                log::debug!("Previous full cycle still pending, skipping tick");
                            }
                            Err(e) => log::error!("Could not queue scheduled full cycle: {e}"),
                        }
                    }
                }
            }
            log::debug!("Refresh timer stopped");
        });

        *self.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(timer);
        log::info!("Job scheduler started, full cycle every {interval:?}");
    }

    /// Queues a refresh of `zone_ids` (all zones when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the scheduler was never started or
    /// has stopped, or [`QueueError::Full`] under backpressure.
    pub fn enqueue_refresh(&self, zone_ids: Option<Vec<String>>) -> Result<Enqueued, QueueError> {
        let key = zone_ids.as_ref().map_or_else(
            || "risk-refresh:all".to_string(),
            |ids| format!("risk-refresh:{}", ids.join(",")),
        );
        self.risk_queue()?
            .try_enqueue(Some(key), RiskJob::Refresh { zone_ids })
    }

    /// Queues the recurring full cycle out of schedule. Shares the cron
    /// key, so it never overlaps a scheduled run.
    ///
    /// # Errors
    ///
    /// See [`Self::enqueue_refresh`].
    pub fn enqueue_full_cycle(&self) -> Result<Enqueued, QueueError> {
        self.risk_queue()?
            .try_enqueue(Some(CRON_KEY.to_string()), RiskJob::FullCycle)
    }

    /// Permanently failed jobs across both queues.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        let mut all = self.notifications.dead_letters();
        if let Some(risk) = self.risk.get() {
            all.extend(risk.dead_letters());
        }
        all.sort_by_key(|d| d.failed_at);
        all
    }

    /// Stops the timer and all workers and waits for them to exit.
    /// In-flight attempts are abandoned.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer
            && let Err(e) = timer.await
        {
            log::error!("Refresh timer panicked: {e}");
        }

        if let Some(risk) = self.risk.get() {
            risk.join().await;
        }
        self.notifications.join().await;
        log::info!("Job scheduler stopped");
    }

    fn risk_queue(&self) -> Result<&JobQueue<RiskJob>, QueueError> {
        self.risk
            .get()
            .map(AsRef::as_ref)
            .ok_or(QueueError::Closed { queue: "risk" })
    }
}

fn queue_options(config: &JobsConfig, workers: usize) -> QueueOptions {
    QueueOptions {
        workers,
        capacity: config.queue_capacity,
        policy: RetryPolicy::from_config(config),
        job_timeout: Duration::from_secs(config.job_timeout_secs),
        dead_letter_capacity: config.dead_letter_capacity,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use floodguard_config::FloodguardConfig;
    use floodguard_models::NotificationKind;

    use super::*;
    use crate::JobError;

    #[derive(Default)]
    struct CountingRisk {
        full_cycles: AtomicU32,
        refreshes: AtomicU32,
    }

    #[async_trait]
    impl JobHandler<RiskJob> for CountingRisk {
        async fn handle(&self, job: &RiskJob) -> Result<(), JobError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            match job {
                RiskJob::FullCycle => self.full_cycles.fetch_add(1, Ordering::SeqCst),
                RiskJob::Refresh { .. } => self.refreshes.fetch_add(1, Ordering::SeqCst),
            };
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPush {
        delivered: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl PushDelivery for RecordingPush {
        async fn deliver(&self, notification: &Notification) -> Result<(), JobError> {
            self.delivered.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn jobs_config() -> JobsConfig {
        let mut config = FloodguardConfig::defaults().jobs;
        config.refresh_interval_secs = 3600;
        config
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..300 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn start_queues_one_full_cycle_and_dedupes_manual_runs() {
        let scheduler = JobScheduler::new(jobs_config(), Arc::new(RecordingPush::default()));
        let risk = Arc::new(CountingRisk::default());
        scheduler.start(risk.clone());

        // The first tick fires immediately and holds the cron key until done.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(scheduler.enqueue_full_cycle().unwrap(), Enqueued::Duplicate);

        eventually(|| risk.full_cycles.load(Ordering::SeqCst) == 1).await;
        assert_eq!(scheduler.enqueue_full_cycle().unwrap(), Enqueued::Queued);
        eventually(|| risk.full_cycles.load(Ordering::SeqCst) == 2).await;

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn refresh_before_start_is_rejected() {
        let scheduler = JobScheduler::new(jobs_config(), Arc::new(RecordingPush::default()));
        assert_eq!(
            scheduler.enqueue_refresh(None),
            Err(QueueError::Closed { queue: "risk" })
        );
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn refresh_jobs_run_on_the_risk_queue() {
        let scheduler = JobScheduler::new(jobs_config(), Arc::new(RecordingPush::default()));
        let risk = Arc::new(CountingRisk::default());
        scheduler.start(risk.clone());

        scheduler
            .enqueue_refresh(Some(vec!["adyar".to_string()]))
            .unwrap();
        eventually(|| risk.refreshes.load(Ordering::SeqCst) == 1).await;

        scheduler.stop().await;
        assert!(matches!(
            scheduler.enqueue_refresh(None),
            Err(QueueError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn notifier_delivers_through_the_queue() {
        let push = Arc::new(RecordingPush::default());
        let scheduler = JobScheduler::new(jobs_config(), push.clone());

        scheduler.notifier().enqueue(Notification {
            targets: vec!["citizen-1".to_string()],
            kind: NotificationKind::IncidentCancelled {
                incident_id: uuid::Uuid::new_v4(),
                reason: Some("duplicate report".to_string()),
            },
        });

        eventually(|| push.delivered.lock().unwrap().len() == 1).await;
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn notifications_without_targets_are_dead_lettered() {
        let scheduler = JobScheduler::new(jobs_config(), Arc::new(RecordingPush::default()));

        scheduler.notifier().enqueue(Notification {
            targets: Vec::new(),
            kind: NotificationKind::IncidentCancelled {
                incident_id: uuid::Uuid::new_v4(),
                reason: None,
            },
        });

        eventually(|| scheduler.dead_letters().len() == 1).await;
        assert_eq!(scheduler.dead_letters()[0].attempts, 1);
        scheduler.stop().await;
    }
}
