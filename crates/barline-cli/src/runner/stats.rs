//! Per-run counters.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters shared between the loop worker and whoever started it.
#[derive(Debug, Default)]
pub struct RunStats {
    ticks: AtomicU64,
    capture_failures: AtomicU64,
    holds: AtomicU64,
    releases: AtomicU64,
    actuation_failures: AtomicU64,
}

impl RunStats {
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hold(&self) {
        self.holds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_actuation_failure(&self) {
        self.actuation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn capture_failures(&self) -> u64 {
        self.capture_failures.load(Ordering::Relaxed)
    }

    pub fn holds(&self) -> u64 {
        self.holds.load(Ordering::Relaxed)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    pub fn actuation_failures(&self) -> u64 {
        self.actuation_failures.load(Ordering::Relaxed)
    }
}

/// Printed as JSON when `barline run` exits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub ticks: u64,
    pub capture_failures: u64,
    pub holds: u64,
    pub releases: u64,
    pub actuation_failures: u64,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, stopped_at: DateTime<Utc>, stats: &RunStats) -> Self {
        Self {
            started_at,
            stopped_at,
            ticks: stats.ticks(),
            capture_failures: stats.capture_failures(),
            holds: stats.holds(),
            releases: stats.releases(),
            actuation_failures: stats.actuation_failures(),
        }
    }
}
