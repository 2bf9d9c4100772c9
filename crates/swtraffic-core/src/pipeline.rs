//! Collection and delivery loops.
//!
//! The two loops run on their own threads and share nothing but the
//! [`DeliveryQueue`] and a [`Shutdown`] flag. Collection is slow (one SNMP
//! poll per period); delivery ticks fast so a backlog left by an outage drains
//! quickly once the API is reachable again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::collector::{Collector, CounterSource};
use crate::custom::CustomConverter;
use crate::queue::{DeliveryQueue, DeliveryStatus};
use crate::rates::SnapshotDiffer;

/// Longest uninterrupted sleep; bounds shutdown latency.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cooperative stop signal shared by both loops.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleeps for `duration` in short slices, returning early once `shutdown` fires.
pub fn sleep_interruptible(duration: Duration, shutdown: &Shutdown) {
    let mut remaining = duration;
    while remaining > Duration::ZERO && !shutdown.is_triggered() {
        let sleep_time = remaining.min(SLEEP_SLICE);
        std::thread::sleep(sleep_time);
        remaining = remaining.saturating_sub(sleep_time);
    }
}

/// Sleeps until `deadline` and returns the next one, `period` later.
///
/// A deadline already in the past is moved to now, so an overrun delays the
/// following tick instead of firing a burst of catch-up ticks.
fn sleep_until_next(deadline: Instant, period: Duration, shutdown: &Shutdown) -> Instant {
    let now = Instant::now();
    let deadline = deadline.max(now);
    sleep_interruptible(deadline - now, shutdown);
    deadline + period
}

/// What one collection tick produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Samples in the new snapshot; `None` if the interface poll failed.
    pub samples: Option<usize>,
    pub interface_observations: usize,
    pub custom_observations: usize,
    pub batches_enqueued: usize,
}

// ----------------------------------------------------------------------------
// Collection
// ----------------------------------------------------------------------------

/// Polls the device once per period and enqueues the derived batches.
pub struct CollectionLoop<S: CounterSource> {
    collector: Collector<S>,
    differ: SnapshotDiffer,
    custom: CustomConverter,
    queue: Arc<DeliveryQueue>,
    period: Duration,
}

impl<S: CounterSource> CollectionLoop<S> {
    /// `period` is also the divisor for per-second rates.
    pub fn new(collector: Collector<S>, queue: Arc<DeliveryQueue>, period: Duration) -> Self {
        Self {
            collector,
            differ: SnapshotDiffer::new(period.as_secs()),
            custom: CustomConverter::default(),
            queue,
            period,
        }
    }

    pub fn with_custom(mut self, custom: CustomConverter) -> Self {
        self.custom = custom;
        self
    }

    pub fn collector_mut(&mut self) -> &mut Collector<S> {
        &mut self.collector
    }

    pub fn differ(&self) -> &SnapshotDiffer {
        &self.differ
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Utc::now().timestamp())
    }

    /// Runs one tick stamping observations with `time`.
    pub fn tick_at(&mut self, time: i64) -> TickReport {
        let mut report = TickReport::default();

        match self.collector.collect_snapshot() {
            Ok(snapshot) => {
                report.samples = Some(snapshot.len());
                let batch = self.differ.advance(snapshot, time);
                if !batch.is_empty() {
                    report.interface_observations = batch.len();
                    report.batches_enqueued += 1;
                    self.queue.enqueue(batch);
                }
            }
            Err(e) => {
                warn!("Failed to collect interface counters, skipping tick: {}", e);
                return report;
            }
        }

        if !self.custom.is_empty() {
            match self.collector.collect_custom() {
                Ok(values) => {
                    let batch = self.custom.convert(&values, time);
                    if !batch.is_empty() {
                        report.custom_observations = batch.len();
                        report.batches_enqueued += 1;
                        self.queue.enqueue(batch);
                    }
                }
                Err(e) => {
                    warn!("Failed to collect custom MIBs: {}", e);
                }
            }
        }

        debug!(
            "Tick: {} interface + {} custom observations, {} batches queued",
            report.interface_observations,
            report.custom_observations,
            self.queue.len()
        );
        report
    }

    /// Ticks until `shutdown` fires. The first tick runs immediately; later
    /// ticks start on a fixed cadence regardless of how long a poll takes.
    pub fn run(&mut self, shutdown: &Shutdown) {
        info!("Starting collection loop (every {:?})", self.period);
        let mut next = Instant::now() + self.period;
        while !shutdown.is_triggered() {
            self.tick();
            next = sleep_until_next(next, self.period, shutdown);
        }
        info!("Collection loop stopped");
    }
}

// ----------------------------------------------------------------------------
// Delivery
// ----------------------------------------------------------------------------

/// Attempts one delivery per period.
pub struct DeliveryLoop {
    queue: Arc<DeliveryQueue>,
    period: Duration,
}

impl DeliveryLoop {
    pub fn new(queue: Arc<DeliveryQueue>, period: Duration) -> Self {
        Self { queue, period }
    }

    pub fn run(&self, shutdown: &Shutdown) {
        info!("Starting delivery loop (every {:?})", self.period);
        let mut next = Instant::now() + self.period;
        while !shutdown.is_triggered() {
            if let DeliveryStatus::Delivered { observations } = self.queue.try_deliver_one() {
                info!("Sent {} observations", observations);
            }
            next = sleep_until_next(next, self.period, shutdown);
        }
        let pending = self.queue.len();
        if pending > 0 {
            warn!("Delivery loop stopped with {} batches undelivered", pending);
        } else {
            info!("Delivery loop stopped");
        }
    }
}
