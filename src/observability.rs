//! Process-level counters for the control plane.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_redelivered: AtomicU64,
    specialist_calls: AtomicU64,
    specialist_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_accepted(&self) {
        self.jobs_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_accepted", "Metric incremented");
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_completed", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn job_redelivered(&self) {
        self.jobs_redelivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_redelivered", "Metric incremented");
    }

    pub fn specialist_call(&self) {
        self.specialist_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn specialist_failure(&self) {
        self.specialist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_redelivered: self.jobs_redelivered.load(Ordering::Relaxed),
            specialist_calls: self.specialist_calls.load(Ordering::Relaxed),
            specialist_failures: self.specialist_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_redelivered: u64,
    pub specialist_calls: u64,
    pub specialist_failures: u64,
}
