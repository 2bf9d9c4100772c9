//! At-least-once delivery queue.
//!
//! Batches are appended by the collection loop and drained one at a time by
//! the delivery loop. The head batch is only removed after the sender
//! acknowledges it; a failed send leaves it in place for the next attempt, so
//! ordering is strict even under repeated failures.
//!
//! The structural lock guards append/peek/remove only. The network call runs
//! without it, so `enqueue` never waits behind a slow send.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Batch, Observation};

/// Failure reported by a [`MetricSender`].
#[derive(Debug, Error)]
#[error("send failed: {0}")]
pub struct SendError(pub String);

/// Destination for delivered batches.
pub trait MetricSender: Send + Sync {
    /// Posts `observations` for the target `identity` (e.g. a host id).
    fn send(&self, identity: &str, observations: &[Observation]) -> Result<(), SendError>;
}

/// Sender that accepts everything without doing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSender;

impl MetricSender for NoopSender {
    fn send(&self, _identity: &str, _observations: &[Observation]) -> Result<(), SendError> {
        Ok(())
    }
}

/// Queue behaviour switches.
#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    /// Identity passed to the sender with every batch.
    pub identity: String,
    /// Drain locally without contacting the sender.
    pub dry_run: bool,
    /// Print every observation to stdout before the send attempt.
    pub debug: bool,
    /// Drop the oldest batch once this many are queued. `None` is unbounded.
    pub max_batches: Option<usize>,
}

/// Result of one [`DeliveryQueue::try_deliver_one`] call.
#[derive(Debug)]
pub enum DeliveryStatus {
    /// Nothing was queued.
    Empty,
    /// The head batch was accepted and removed.
    Delivered { observations: usize },
    /// The head batch was drained without contacting the sender.
    DryRun { observations: usize },
    /// The sender failed; the head batch stays queued.
    Failed(SendError),
}

/// FIFO of observation batches shared by the collection and delivery loops.
pub struct DeliveryQueue {
    buffers: Mutex<VecDeque<Arc<Batch>>>,
    /// Serializes deliverers so the head is never in flight twice.
    delivering: Mutex<()>,
    sender: Box<dyn MetricSender>,
    options: QueueOptions,
}

impl DeliveryQueue {
    pub fn new(sender: Box<dyn MetricSender>, options: QueueOptions) -> Self {
        Self {
            buffers: Mutex::new(VecDeque::new()),
            delivering: Mutex::new(()),
            sender,
            options,
        }
    }

    fn buffers(&self) -> MutexGuard<'_, VecDeque<Arc<Batch>>> {
        // A panic while holding the lock cannot leave the deque half-mutated.
        self.buffers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a batch to the tail.
    pub fn enqueue(&self, batch: Batch) {
        let mut buffers = self.buffers();
        if let Some(max) = self.options.max_batches {
            while buffers.len() >= max.max(1) {
                if let Some(dropped) = buffers.pop_front() {
                    warn!(
                        observations = dropped.len(),
                        max_batches = max,
                        "queue full, dropping oldest batch"
                    );
                }
            }
        }
        buffers.push_back(Arc::new(batch));
    }

    pub fn len(&self) -> usize {
        self.buffers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers().is_empty()
    }

    /// Attempts to deliver the oldest batch.
    pub fn try_deliver_one(&self) -> DeliveryStatus {
        let _delivering = self.delivering.lock().unwrap_or_else(|e| e.into_inner());

        let Some(head) = self.buffers().front().cloned() else {
            return DeliveryStatus::Empty;
        };

        if self.options.debug {
            for obs in head.iter() {
                println!("{}\t{}\t{}", obs.time, obs.name, obs.value);
            }
        }

        let observations = head.len();
        if !self.options.dry_run
            && let Err(e) = self.sender.send(&self.options.identity, &head)
        {
            warn!(error = %e, queued = self.len(), "delivery failed, batch kept for retry");
            return DeliveryStatus::Failed(e);
        }

        {
            let mut buffers = self.buffers();
            // The head may have been dropped by a bounded enqueue during the send.
            if buffers.front().is_some_and(|front| Arc::ptr_eq(front, &head)) {
                buffers.pop_front();
            }
        }

        if self.options.dry_run {
            DeliveryStatus::DryRun { observations }
        } else {
            debug!(observations, queued = self.len(), "batch delivered");
            DeliveryStatus::Delivered { observations }
        }
    }
}
