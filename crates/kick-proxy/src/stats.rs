//! Atomic dispatch counters.
//!
//! Monotonic display counters; `Relaxed` ordering throughout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Default)]
struct StatsInner {
    requests: AtomicU64,
    upstream_attempts: AtomicU64,
    upstream_failures: AtomicU64,
    bypass_fetches: AtomicU64,
    bypass_failures: AtomicU64,
    retries_exhausted: AtomicU64,
}

/// Shared dispatcher statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct ProxyStats {
    inner: Arc<StatsInner>,
}

/// Point-in-time copy of the counters, serialized by `GET /api/stats`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub upstream_attempts: u64,
    pub upstream_failures: u64,
    pub bypass_fetches: u64,
    pub bypass_failures: u64,
    pub retries_exhausted: u64,
}

impl ProxyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_requests(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_attempts(&self) {
        self.inner.upstream_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_failures(&self) {
        self.inner.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts every round trip to the provider, including retries.
    pub fn inc_bypass_fetches(&self) {
        self.inner.bypass_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bypass_failures(&self) {
        self.inner.bypass_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries_exhausted(&self) {
        self.inner.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.inner.requests.load(Ordering::Relaxed),
            upstream_attempts: self.inner.upstream_attempts.load(Ordering::Relaxed),
            upstream_failures: self.inner.upstream_failures.load(Ordering::Relaxed),
            bypass_fetches: self.inner.bypass_fetches.load(Ordering::Relaxed),
            bypass_failures: self.inner.bypass_failures.load(Ordering::Relaxed),
            retries_exhausted: self.inner.retries_exhausted.load(Ordering::Relaxed),
        }
    }
}
