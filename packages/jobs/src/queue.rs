//! Bounded job queue with a worker pool.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::retry::RetryPolicy;
use crate::{JobError, QueueError};

/// Executes one kind of job.
#[async_trait]
pub trait JobHandler<J>: Send + Sync {
    /// Runs a single attempt.
    async fn handle(&self, job: &J) -> Result<(), JobError>;
}

/// Whether [`JobQueue::try_enqueue`] accepted the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Queued for a worker.
    Queued,
    /// A job with the same key is already queued, running or waiting to
    /// retry.
    Duplicate,
}

/// A permanently failed job, kept for inspection.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Idempotency key, if the job had one.
    pub key: Option<String>,
    /// Debug rendering of the payload.
    pub job: String,
    /// Attempts made.
    pub attempts: u32,
    /// Last error.
    pub error: String,
    /// When the job was given up on.
    pub failed_at: DateTime<Utc>,
}

/// Counters since the queue started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs that eventually succeeded.
    pub completed: u64,
    /// Attempts that were scheduled for retry.
    pub retried: u64,
    /// Jobs moved to the dead-letter list.
    pub failed: u64,
}

#[derive(Debug)]
struct QueuedJob<J> {
    key: Option<String>,
    payload: J,
    attempts: u32,
}

/// Sizing and failure handling for one queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// Worker tasks draining the queue. At least 1.
    pub workers: usize,
    /// Bounded channel capacity.
    pub capacity: usize,
    /// Attempts and backoff per job.
    pub policy: RetryPolicy,
    /// Upper bound on a single attempt.
    pub job_timeout: Duration,
    /// Dead letters kept before the oldest is dropped.
    pub dead_letter_capacity: usize,
}

struct Shared<J> {
    name: &'static str,
    sender: mpsc::Sender<QueuedJob<J>>,
    settings: QueueOptions,
    keys: Mutex<BTreeSet<String>>,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    cancel: CancellationToken,
}

/// A named queue drained by a fixed pool of workers.
///
/// Jobs may carry an idempotency key; while a keyed job is queued, running
/// or waiting for a retry, enqueuing another job with the same key is a
/// no-op.
pub struct JobQueue<J> {
    shared: Arc<Shared<J>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<J> JobQueue<J>
where
    J: Debug + Send + Sync + 'static,
{
    /// Creates the queue and spawns its workers, which stop when `cancel`
    /// fires.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(
        name: &'static str,
        handler: Arc<dyn JobHandler<J>>,
        options: QueueOptions,
        cancel: CancellationToken,
    ) -> Self {
        let workers = options.workers.max(1);
        let (sender, receiver) = mpsc::channel(options.capacity.max(1));
        let receiver = Arc::new(AsyncMutex::new(receiver));

        let shared = Arc::new(Shared {
            name,
            sender,
            settings: options,
            keys: Mutex::new(BTreeSet::new()),
            dead_letters: Mutex::new(VecDeque::new()),
            completed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancel,
        });

        let handles = (0..workers)
            .map(|worker| {
                tokio::spawn(work(
                    worker,
                    Arc::clone(&shared),
                    Arc::clone(&receiver),
                    Arc::clone(&handler),
                ))
            })
            .collect();

        log::info!("Started '{name}' queue with {workers} workers");

        Self {
            shared,
            workers: Mutex::new(handles),
        }
    }

    /// Queues a job without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] when the channel is at capacity or
    /// [`QueueError::Closed`] after shutdown.
    pub fn try_enqueue(&self, key: Option<String>, payload: J) -> Result<Enqueued, QueueError> {
        let name = self.shared.name;
        if self.shared.cancel.is_cancelled() {
            return Err(QueueError::Closed { queue: name });
        }
        if let Some(key) = &key
            && !lock(&self.shared.keys).insert(key.clone())
        {
            log::debug!("'{name}' job {key} already pending");
            return Ok(Enqueued::Duplicate);
        }

        let job = QueuedJob {
            key,
            payload,
            attempts: 0,
        };

        match self.shared.sender.try_send(job) {
            Ok(()) => Ok(Enqueued::Queued),
            Err(e) => {
                let (job, error) = match e {
                    mpsc::error::TrySendError::Full(job) => (job, QueueError::Full { queue: name }),
                    mpsc::error::TrySendError::Closed(job) => {
                        (job, QueueError::Closed { queue: name })
                    }
                };
                self.shared.release(job.key.as_deref());
                Err(error)
            }
        }
    }

    /// Counters since start.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            completed: self.shared.completed.load(Ordering::SeqCst),
            retried: self.shared.retried.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
        }
    }

    /// Permanently failed jobs, oldest first.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        lock(&self.shared.dead_letters).iter().cloned().collect()
    }

    /// Queue name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Waits for every worker to exit. Workers exit once the cancellation
    /// token fires.
    pub async fn join(&self) {
        let handles: Vec<_> = std::mem::take(&mut *lock(&self.workers));
        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("'{}' worker panicked: {e}", self.shared.name);
            }
        }
    }
}

impl<J> Shared<J>
where
    J: Debug + Send + Sync + 'static,
{
    async fn run(&self, mut job: QueuedJob<J>, handler: &dyn JobHandler<J>) {
        job.attempts += 1;
        let attempt = job.attempts;
        let max = self.settings.policy.max_attempts;

        let timeout = self.settings.job_timeout;
        let result = tokio::time::timeout(timeout, handler.handle(&job.payload))
            .await
            .unwrap_or(Err(JobError::Timeout {
                seconds: timeout.as_secs(),
            }));

        let error = match result {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                log::debug!("'{}' job {:?} done after {attempt} attempt(s)", self.name, job.key);
                self.release(job.key.as_deref());
                return;
            }
            Err(e) => e,
        };

        if error.is_transient()
            && let Some(delay) = self.settings.policy.next_delay(attempt)
        {
            log::warn!(
                "'{}' job attempt {attempt}/{max} failed: {error}; retrying in {delay:?}",
                self.name
            );
            self.retried.fetch_add(1, Ordering::SeqCst);
            self.schedule_retry(job, delay);
            return;
        }

        log::error!(
            "'{}' job {:?} permanently failed after {attempt} attempt(s): {error}",
            self.name,
            job.payload
        );
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.release(job.key.as_deref());

        let mut dead = lock(&self.dead_letters);
        if self.settings.dead_letter_capacity > 0 {
            if dead.len() >= self.settings.dead_letter_capacity {
                dead.pop_front();
            }
            dead.push_back(DeadLetter {
                key: job.key,
                job: format!("{:?}", job.payload),
                attempts: attempt,
                error: error.to_string(),
                failed_at: Utc::now(),
            });
        }
    }

    fn schedule_retry(&self, job: QueuedJob<J>, delay: Duration) {
        let sender = self.sender.clone();
        let cancel = self.cancel.clone();
        let name = self.name;

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if sender.send(job).await.is_err() {
                        log::warn!("'{name}' queue closed before retry could be queued");
                    }
                }
            }
        });
    }

    fn release(&self, key: Option<&str>) {
        if let Some(key) = key {
            lock(&self.keys).remove(key);
        }
    }
}

async fn work<J>(
    worker: usize,
    shared: Arc<Shared<J>>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<QueuedJob<J>>>>,
    handler: Arc<dyn JobHandler<J>>,
) where
    J: Debug + Send + Sync + 'static,
{
    loop {
        let next = tokio::select! {
            () = shared.cancel.cancelled() => None,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = next else {
            break;
        };
        shared.run(job, handler.as_ref()).await;
    }

    log::debug!("'{}' worker {worker} stopped", shared.name);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
