#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Asynchronous job execution for the dispatch core.
//!
//! Two [`JobQueue`]s run side by side: a risk queue (refreshes and full
//! cycles, one worker by default) and a notification queue (push delivery,
//! several workers). Every queued job carries its own attempt count and is
//! retried under a [`RetryPolicy`] until it succeeds, fails permanently or
//! runs out of attempts, at which point it lands in the queue's dead-letter
//! list.
//!
//! [`JobScheduler`] owns both queues, the shutdown token and the recurring
//! refresh timer.

pub mod notify;
pub mod queue;
pub mod retry;
pub mod risk;
pub mod scheduler;

pub use notify::{LogPushDelivery, PushDelivery, QueueNotificationDispatcher};
pub use queue::{DeadLetter, Enqueued, JobHandler, JobQueue, QueueOptions, QueueStats};
pub use retry::{Backoff, RetryPolicy};
pub use risk::{FullCycleReport, RiskJob, RiskJobHandler, run_full_cycle};
pub use scheduler::JobScheduler;

use thiserror::Error;

/// Outcome of a failed job attempt.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// Worth retrying (network, timeouts, contention).
    #[error("Transient failure: {message}")]
    Transient {
        /// What went wrong.
        message: String,
    },

    /// Retrying cannot help.
    #[error("Permanent failure: {message}")]
    Permanent {
        /// What went wrong.
        message: String,
    },

    /// The attempt exceeded the per-job time limit.
    #[error("Job timed out after {seconds}s")]
    Timeout {
        /// Configured limit.
        seconds: u64,
    },
}

impl JobError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }

    /// Wraps any error as transient.
    pub fn transient(e: impl std::fmt::Display) -> Self {
        Self::Transient {
            message: e.to_string(),
        }
    }
}

/// Why a job could not be enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The bounded channel is full.
    #[error("Queue '{queue}' is full")]
    Full {
        /// Queue name.
        queue: &'static str,
    },

    /// The queue has shut down.
    #[error("Queue '{queue}' is closed")]
    Closed {
        /// Queue name.
        queue: &'static str,
    },
}
