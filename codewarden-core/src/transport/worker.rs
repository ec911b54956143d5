// codewarden-core/src/transport/worker.rs
//! The background transport.
//!
//! [`Transport::send`] never blocks and never fails loudly: it enqueues or
//! drops with a warning. A single spawned tokio task drains the queue on a
//! fixed interval, or as soon as the send-mode threshold is reached.
//! Flushes are serialized, so an explicit [`Transport::flush`] and the
//! worker never deliver the same batch twice or interleave retries.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, error, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::errors::{WardenError, WardenResult};
use crate::event::Event;
use crate::transport::envelope::WireBody;
use crate::transport::queue::EventQueue;
use crate::transport::retry::{deliver_with_retry, DeliveryOutcome, RetryPolicy};
use crate::transport::sink::EventSink;
use crate::transport::SendMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub max_queue_size: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub retry: RetryPolicy,
    pub send_mode: SendMode,
    /// Log each successful delivery at debug level.
    pub debug: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            batch_size: 10,
            flush_interval: Duration::from_millis(5000),
            retry: RetryPolicy::default(),
            send_mode: SendMode::default(),
            debug: false,
        }
    }
}

impl TransportConfig {
    /// Events per request.
    fn chunk_size(&self) -> usize {
        match self.send_mode {
            SendMode::Immediate => 1,
            SendMode::Batched => self.batch_size.max(1),
        }
    }

    /// Queue length at which the worker is woken early.
    fn wake_threshold(&self) -> usize {
        self.chunk_size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Accumulating,
    Flushing,
    Stopped,
}

/// Lifetime counters. `attempts` counts every HTTP attempt, retries included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    pub delivered: u64,
    pub dropped_overflow: u64,
    pub dropped_stopped: u64,
    pub dropped_permanent: u64,
    pub dropped_exhausted: u64,
    pub attempts: u64,
    pub queued: usize,
}

/// What a single drain accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub delivered: usize,
    pub dropped: usize,
    pub batches: usize,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_stopped: AtomicU64,
    dropped_permanent: AtomicU64,
    dropped_exhausted: AtomicU64,
    attempts: AtomicU64,
}

struct Shared {
    queue: EventQueue,
    config: TransportConfig,
    sink: Arc<dyn EventSink>,
    flush_lock: tokio::sync::Mutex<()>,
    flushing: AtomicBool,
    stopped: AtomicBool,
    wake: Notify,
    shutdown: Notify,
    counters: Counters,
}

/// Clears the `flushing` flag however the drain ends.
struct FlushingGuard<'a>(&'a AtomicBool);

impl<'a> FlushingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    /// Delivers queued events batch by batch until the queue is empty.
    /// With `respect_stop`, gives up between batches once stopped.
    async fn drain(&self, respect_stop: bool) -> FlushReport {
        let _lock = self.flush_lock.lock().await;
        let _flushing = FlushingGuard::set(&self.flushing);
        let batched = self.config.send_mode == SendMode::Batched;
        let mut report = FlushReport::default();

        loop {
            if respect_stop && self.stopped.load(Ordering::SeqCst) {
                break;
            }
            let events = self.queue.take_batch(self.config.chunk_size());
            if events.is_empty() {
                break;
            }

            let count = events.len();
            let body = WireBody::from_events(&events, batched);
            let outcome = deliver_with_retry(self.sink.as_ref(), &body, &self.config.retry).await;
            self.counters
                .attempts
                .fetch_add(u64::from(outcome.attempts()), Ordering::Relaxed);
            report.batches += 1;

            match outcome {
                DeliveryOutcome::Delivered { attempts } => {
                    self.counters.delivered.fetch_add(count as u64, Ordering::Relaxed);
                    report.delivered += count;
                    if self.config.debug {
                        debug!("Delivered {} event(s) via {} after {} attempt(s).", count, self.sink.name(), attempts);
                    }
                }
                DeliveryOutcome::Rejected { error: e, .. } => {
                    self.counters.dropped_permanent.fetch_add(count as u64, Ordering::Relaxed);
                    report.dropped += count;
                    error!("Dropping {} event(s): {}", count, e);
                }
                DeliveryOutcome::Exhausted { attempts, error: e } => {
                    self.counters.dropped_exhausted.fetch_add(count as u64, Ordering::Relaxed);
                    report.dropped += count;
                    error!("Dropping {} event(s) after {} attempts: {}", count, attempts, e);
                }
            }
        }

        report
    }
}

async fn run_worker(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    while !shared.stopped.load(Ordering::SeqCst) {
        tokio::select! {
            biased;
            _ = shared.shutdown.notified() => break,
            _ = ticker.tick() => {}
            _ = shared.wake.notified() => {}
        }
        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }
        if !shared.queue.is_empty() {
            shared.drain(true).await;
        }
    }
    debug!("Transport worker stopped.");
}

/// Bounded queue plus background delivery worker.
pub struct Transport {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("sink", &self.shared.sink.name())
            .field("state", &self.state())
            .field("queued", &self.shared.queue.len())
            .finish()
    }
}

impl Transport {
    /// Spawns the worker on the current tokio runtime.
    pub fn start(config: TransportConfig, sink: Arc<dyn EventSink>) -> WardenResult<Self> {
        let handle = Handle::try_current().map_err(|_| WardenError::NoRuntime)?;
        let mut config = config;
        config.flush_interval = config.flush_interval.max(Duration::from_millis(1));

        let shared = Arc::new(Shared {
            queue: EventQueue::new(config.max_queue_size),
            config,
            sink,
            flush_lock: tokio::sync::Mutex::new(()),
            flushing: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            wake: Notify::new(),
            shutdown: Notify::new(),
            counters: Counters::default(),
        });

        let worker = handle.spawn(run_worker(Arc::clone(&shared)));
        debug!(
            "Transport started: sink={}, mode={:?}, max_queue_size={}, batch_size={}, flush_interval={:?}",
            shared.sink.name(),
            shared.config.send_mode,
            shared.config.max_queue_size,
            shared.config.batch_size,
            shared.config.flush_interval
        );

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Enqueues `event`. Returns `false` when it was dropped because the
    /// queue is full or the transport is stopped.
    pub fn send(&self, event: Event) -> bool {
        if self.shared.stopped.load(Ordering::SeqCst) {
            self.shared.counters.dropped_stopped.fetch_add(1, Ordering::Relaxed);
            warn!("Transport is stopped; dropping event {}.", event.event_id);
            return false;
        }

        match self.shared.queue.push(event) {
            Ok(len) => {
                if len >= self.shared.config.wake_threshold() {
                    self.shared.wake.notify_one();
                }
                true
            }
            Err(event) => {
                self.shared.counters.dropped_overflow.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Event queue is full ({} events); dropping event {}.",
                    self.shared.queue.capacity(),
                    event.event_id
                );
                false
            }
        }
    }

    /// Delivers everything currently queued.
    pub async fn flush(&self) -> FlushReport {
        self.shared.drain(false).await
    }

    /// Stops accepting events and signals the worker to exit. Queued
    /// events stay queued until [`Transport::close`] or [`Transport::flush`].
    pub fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            self.shared.shutdown.notify_one();
        }
    }

    /// Stops the worker, waits for it, then drains what is left. Safe to
    /// call more than once.
    pub async fn close(&self) -> FlushReport {
        self.stop();
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Transport worker ended abnormally: {}", e);
            }
        }
        self.shared.drain(false).await
    }

    pub fn state(&self) -> TransportState {
        if self.shared.stopped.load(Ordering::SeqCst) {
            TransportState::Stopped
        } else if self.shared.flushing.load(Ordering::SeqCst) {
            TransportState::Flushing
        } else if self.shared.queue.is_empty() {
            TransportState::Idle
        } else {
            TransportState::Accumulating
        }
    }

    pub fn stats(&self) -> TransportStats {
        let c = &self.shared.counters;
        TransportStats {
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped_overflow: c.dropped_overflow.load(Ordering::Relaxed),
            dropped_stopped: c.dropped_stopped.load(Ordering::Relaxed),
            dropped_permanent: c.dropped_permanent.load(Ordering::Relaxed),
            dropped_exhausted: c.dropped_exhausted.load(Ordering::Relaxed),
            attempts: c.attempts.load(Ordering::Relaxed),
            queued: self.shared.queue.len(),
        }
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop();
    }
}
