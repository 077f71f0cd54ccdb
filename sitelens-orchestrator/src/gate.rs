//! Concurrency gate with FIFO admission.
//!
//! Built on [`tokio::sync::Semaphore`], whose waiters are served strictly in
//! arrival order. The gate adds an optional bound on the number of queued
//! callers, an optional acquire deadline, and counters for stats.

use serde::{Deserialize, Serialize};
use sitelens_core::{CapacityError, OrchestratorConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, Default)]
struct GateCounters {
    active: AtomicUsize,
    queued: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Point-in-time view of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub active: usize,
    pub queued: usize,
    pub peak_active: usize,
    pub max_concurrent: usize,
    pub max_queued: Option<usize>,
}

/// Bounds the number of executions running at once.
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    max_queued: Option<usize>,
    acquire_timeout: Option<Duration>,
    counters: Arc<GateCounters>,
}

impl ConcurrencyGate {
    pub fn new(
        max_concurrent: usize,
        max_queued: Option<usize>,
        acquire_timeout: Option<Duration>,
    ) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            max_queued,
            acquire_timeout,
            counters: Arc::new(GateCounters::default()),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.max_concurrent, config.max_queued, config.acquire_timeout)
    }

    /// Wait for an execution slot.
    ///
    /// Admits immediately when a slot is free and nobody is queued. Otherwise
    /// joins the back of the queue, failing with [`CapacityError::QueueFull`]
    /// if the queue is at its bound or [`CapacityError::AcquireTimeout`] if
    /// the deadline passes first. Cancelling the returned future leaves the
    /// queue without consuming a slot.
    pub async fn acquire(&self) -> Result<GatePermit, CapacityError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => return Ok(self.admit(permit)),
            Err(TryAcquireError::Closed) => return Err(CapacityError::GateClosed),
            Err(TryAcquireError::NoPermits) => {}
        }

        let _queued = self.enqueue()?;
        let started = Instant::now();
        let acquire = Arc::clone(&self.semaphore).acquire_owned();

        let permit = match self.acquire_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, acquire).await {
                Ok(result) => result,
                Err(_) => {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    tracing::warn!(waited_ms, "Timed out waiting for an execution slot");
                    return Err(CapacityError::AcquireTimeout { waited_ms });
                }
            },
            None => acquire.await,
        }
        .map_err(|_| CapacityError::GateClosed)?;

        tracing::debug!(
            waited_ms = started.elapsed().as_millis() as u64,
            "Execution slot granted after queueing"
        );
        Ok(self.admit(permit))
    }

    fn enqueue(&self) -> Result<QueuedGuard, CapacityError> {
        let counters = &self.counters;
        match self.max_queued {
            Some(max_queued) => {
                counters
                    .queued
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                        (queued < max_queued).then_some(queued + 1)
                    })
                    .map_err(|queued| {
                        tracing::warn!(queued, max_queued, "Gate waiter queue is full");
                        CapacityError::QueueFull { queued, max_queued }
                    })?;
            }
            None => {
                counters.queued.fetch_add(1, Ordering::AcqRel);
            }
        }
        Ok(QueuedGuard {
            counters: Arc::clone(&self.counters),
        })
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let active = self.counters.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak_active.fetch_max(active, Ordering::AcqRel);
        GatePermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        }
    }

    /// Reject all current and future waiters.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }

    pub fn queued(&self) -> usize {
        self.counters.queued.load(Ordering::Acquire)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            active: self.active(),
            queued: self.queued(),
            peak_active: self.counters.peak_active.load(Ordering::Acquire),
            max_concurrent: self.max_concurrent,
            max_queued: self.max_queued,
        }
    }
}

/// Decrements the queued count when a waiter leaves the queue for any reason.
struct QueuedGuard {
    counters: Arc<GateCounters>,
}

impl Drop for QueuedGuard {
    fn drop(&mut self) {
        self.counters.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An admitted execution slot. Dropping it wakes the oldest waiter.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<GateCounters>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Decrement before the semaphore permit is returned so `active`
        // never exceeds `max_concurrent` as observed by stats.
        self.counters.active.fetch_sub(1, Ordering::AcqRel);
    }
}
