//! Log-only [`PresenceBroadcaster`] and [`NotificationDispatcher`] sinks,
//! for processes that run without push transport or connected clients.

use floodguard_models::{BroadcastEvent, Notification, NotificationDispatcher, PresenceBroadcaster};

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBroadcaster;

impl PresenceBroadcaster for LogBroadcaster {
    fn emit(&self, event: BroadcastEvent) {
        log::info!("broadcast {}", event.name());
        log::trace!("broadcast payload: {event:?}");
    }
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationDispatcher for LogNotifier {
    fn enqueue(&self, notification: Notification) {
        log::info!(
            "notification {} -> {:?}",
            notification.kind.label(),
            notification.targets
        );
    }
}
