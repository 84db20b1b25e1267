//! What the loop tells the outside world after every tick.
//!
//! The worker hands each tick to an [`Observer`]. Observers must return
//! immediately; the usual implementation overwrites a single "latest"
//! slot so a slow consumer simply skips frames.
//!
//! [`StatusTracker`] folds those updates into a coarse status suitable
//! for a status line.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::detect::DetectionResult;
use crate::frame::Frame;

/// One published tick.
#[derive(Debug, Clone)]
pub enum Update {
    /// A captured frame and what was found in it. `seq` increases by one
    /// per successful capture.
    Frame {
        seq: u64,
        frame: Arc<Frame>,
        result: DetectionResult,
    },
    /// The capture failed; `consecutive` counts failures since the last
    /// successful capture.
    CaptureFailed { consecutive: u32, message: String },
}

/// Receives ticks from the loop worker. Must not block.
pub trait Observer: Send + Sync + 'static {
    fn publish(&self, update: Update);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingStatus {
    /// Nothing detected yet this run.
    Searching,
    /// Bar within tolerance of the reference line.
    OnTarget,
    /// Bar detected but outside tolerance.
    Correcting,
    /// Detections stopped arriving.
    Lost,
    CaptureFailing { consecutive: u32 },
}

impl TrackingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TrackingStatus::Searching => "searching",
            TrackingStatus::OnTarget => "on target",
            TrackingStatus::Correcting => "correcting",
            TrackingStatus::Lost => "lost",
            TrackingStatus::CaptureFailing { .. } => "capture failing",
        }
    }
}

/// Derives a [`TrackingStatus`] from the stream of updates.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    tolerance: f64,
    lost_after: Duration,
    last_seen: Option<Instant>,
    status: TrackingStatus,
}

impl StatusTracker {
    pub fn new(tolerance_px: u32, lost_after: Duration) -> Self {
        Self {
            tolerance: f64::from(tolerance_px),
            lost_after,
            last_seen: None,
            status: TrackingStatus::Searching,
        }
    }

    pub fn status(&self) -> &TrackingStatus {
        &self.status
    }

    /// Fold in one update. Returns the new status if it changed.
    pub fn observe(&mut self, update: &Update, now: Instant) -> Option<TrackingStatus> {
        let next = match update {
            Update::CaptureFailed { consecutive, .. } => TrackingStatus::CaptureFailing {
                consecutive: *consecutive,
            },
            Update::Frame { result, .. } => match result.distance() {
                Some(distance) => {
                    self.last_seen = Some(now);
                    if distance.abs() <= self.tolerance {
                        TrackingStatus::OnTarget
                    } else {
                        TrackingStatus::Correcting
                    }
                }
                None => match self.last_seen {
                    None => TrackingStatus::Searching,
                    Some(seen) if now.saturating_duration_since(seen) > self.lost_after => {
                        TrackingStatus::Lost
                    }
                    // Brief dropouts keep the previous tracking status.
                    Some(_) => match &self.status {
                        TrackingStatus::CaptureFailing { .. } => TrackingStatus::Lost,
                        other => other.clone(),
                    },
                },
            },
        };

        if next == self.status {
            return None;
        }
        self.status = next.clone();
        Some(next)
    }
}
