//! Notification delivery through the notification queue.

use std::sync::Arc;

use async_trait::async_trait;
use floodguard_models::{Notification, NotificationDispatcher};

use crate::queue::{JobHandler, JobQueue};
use crate::{Enqueued, JobError};

/// Push transport (FCM, SMS gateway, ...). Delivery itself lives outside
/// the dispatch core.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    /// Delivers one notification to all of its targets.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Transient`] for failures worth retrying.
    async fn deliver(&self, notification: &Notification) -> Result<(), JobError>;
}

/// Delivery that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPushDelivery;

#[async_trait]
impl PushDelivery for LogPushDelivery {
    async fn deliver(&self, notification: &Notification) -> Result<(), JobError> {
        log::info!(
            "push {} to {}",
            notification.kind.label(),
            notification.targets.join(", ")
        );
        Ok(())
    }
}

pub(crate) struct DeliveryHandler {
    delivery: Arc<dyn PushDelivery>,
}

impl DeliveryHandler {
    pub(crate) fn new(delivery: Arc<dyn PushDelivery>) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl JobHandler<Notification> for DeliveryHandler {
    async fn handle(&self, job: &Notification) -> Result<(), JobError> {
        if job.targets.is_empty() {
            return Err(JobError::Permanent {
                message: format!("{} notification has no targets", job.kind.label()),
            });
        }
        self.delivery.deliver(job).await
    }
}

/// [`NotificationDispatcher`] that hands notifications to the notification
/// queue and returns immediately.
pub struct QueueNotificationDispatcher {
    queue: Arc<JobQueue<Notification>>,
}

impl QueueNotificationDispatcher {
    /// Creates a dispatcher that feeds `queue`.
    #[must_use]
    pub const fn new(queue: Arc<JobQueue<Notification>>) -> Self {
        Self { queue }
    }
}

impl NotificationDispatcher for QueueNotificationDispatcher {
    fn enqueue(&self, notification: Notification) {
        let label = notification.kind.label();
        match self.queue.try_enqueue(None, notification) {
            Ok(Enqueued::Queued | Enqueued::Duplicate) => {}
            Err(e) => log::error!("Dropping {label} notification: {e}"),
        }
    }
}
