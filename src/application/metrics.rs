//! Observability metrics for fallback execution.
//!
//! Provides counters about how often chains fall back, propagate or run dry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking fallback execution statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones of an executor share the same metrics.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Calls made to any execution entry point
    executions: AtomicU64,
    /// Calls that returned a successful result
    successes: AtomicU64,
    /// Failures swallowed so the next implementation could be tried
    suppressed_failures: AtomicU64,
    /// Failures that matched an exclusion rule and were propagated
    propagated_failures: AtomicU64,
    /// Calls where every implementation failed
    exhausted: AtomicU64,
    /// Failure observer invocations that panicked
    observer_panics: AtomicU64,
    /// Async observers dropped unfinished by a synchronous call
    abandoned_observers: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                executions: AtomicU64::new(0),
                successes: AtomicU64::new(0),
                suppressed_failures: AtomicU64::new(0),
                propagated_failures: AtomicU64::new(0),
                exhausted: AtomicU64::new(0),
                observer_panics: AtomicU64::new(0),
                abandoned_observers: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_execution(&self) {
        self.inner.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.inner.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.inner
            .suppressed_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_propagated(&self) {
        self.inner
            .propagated_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.inner.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_observer_panic(&self) {
        self.inner.observer_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned_observer(&self) {
        self.inner
            .abandoned_observers
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of executions.
    pub fn executions(&self) -> u64 {
        self.inner.executions.load(Ordering::Relaxed)
    }

    /// Get the number of successful executions.
    pub fn successes(&self) -> u64 {
        self.inner.successes.load(Ordering::Relaxed)
    }

    /// Get the number of failures that triggered a fallback.
    pub fn suppressed_failures(&self) -> u64 {
        self.inner.suppressed_failures.load(Ordering::Relaxed)
    }

    /// Get the number of failures propagated by an exclusion rule.
    pub fn propagated_failures(&self) -> u64 {
        self.inner.propagated_failures.load(Ordering::Relaxed)
    }

    /// Get the number of executions where every implementation failed.
    pub fn exhausted(&self) -> u64 {
        self.inner.exhausted.load(Ordering::Relaxed)
    }

    /// Get the number of observer invocations that panicked.
    pub fn observer_panics(&self) -> u64 {
        self.inner.observer_panics.load(Ordering::Relaxed)
    }

    /// Get the number of asynchronous observers a synchronous call dropped
    /// before they finished.
    pub fn abandoned_observers(&self) -> u64 {
        self.inner.abandoned_observers.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.executions(),
            successes: self.successes(),
            suppressed_failures: self.suppressed_failures(),
            propagated_failures: self.propagated_failures(),
            exhausted: self.exhausted(),
            observer_panics: self.observer_panics(),
            abandoned_observers: self.abandoned_observers(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.executions.store(0, Ordering::Relaxed);
        self.inner.successes.store(0, Ordering::Relaxed);
        self.inner.suppressed_failures.store(0, Ordering::Relaxed);
        self.inner.propagated_failures.store(0, Ordering::Relaxed);
        self.inner.exhausted.store(0, Ordering::Relaxed);
        self.inner.observer_panics.store(0, Ordering::Relaxed);
        self.inner.abandoned_observers.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Calls made to any execution entry point
    pub executions: u64,
    /// Calls that returned a successful result
    pub successes: u64,
    /// Failures swallowed so the next implementation could be tried
    pub suppressed_failures: u64,
    /// Failures that matched an exclusion rule and were propagated
    pub propagated_failures: u64,
    /// Calls where every implementation failed
    pub exhausted: u64,
    /// Failure observer invocations that panicked
    pub observer_panics: u64,
    /// Async observers dropped unfinished by a synchronous call
    pub abandoned_observers: u64,
}

impl MetricsSnapshot {
    /// Average number of suppressed failures per execution.
    ///
    /// Returns 0.0 if nothing has been executed.
    pub fn fallback_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.suppressed_failures as f64 / self.executions as f64
        }
    }

    /// Fraction of executions that returned a successful result (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.successes as f64 / self.executions as f64
        }
    }
}
