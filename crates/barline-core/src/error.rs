//! Error types with operator-facing suggestions.
//!
//! None of these are fatal to a run: the loop degrades to "no correction
//! applied" and keeps going. Each error still carries a hint so that a
//! status line or log entry tells the operator what to try next.

use std::error::Error as StdError;

use thiserror::Error;

use crate::region::CaptureRegion;

/// Boxed underlying cause from a platform backend.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The display region could not be read.
///
/// Transient by nature (window moved, display asleep, permission prompt
/// still open). The loop backs off and retries.
#[derive(Debug, Error)]
#[error("failed to capture region {region}: {source}")]
pub struct CaptureError {
    pub region: CaptureRegion,
    #[source]
    pub source: BoxError,
}

impl CaptureError {
    pub fn new(region: CaptureRegion, source: impl Into<BoxError>) -> Self {
        Self {
            region,
            source: source.into(),
        }
    }

    pub fn suggestion(&self) -> &'static str {
        "Check that the region is on-screen and that screen recording is permitted"
    }
}

/// A pixel buffer that does not describe a BGRA frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame buffer is empty")]
    Empty,
    #[error("frame has zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height} BGRA")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

impl FrameError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            FrameError::Empty | FrameError::ZeroDimension { .. } => {
                "Set a capture region with a positive width and height"
            }
            FrameError::SizeMismatch { .. } => {
                "The capture backend returned an unexpected pixel layout; try a different monitor"
            }
        }
    }
}

/// The OS refused an injected mouse event.
#[derive(Debug, Error)]
#[error("input injection failed: {source}")]
pub struct ActuationError {
    #[source]
    pub source: BoxError,
}

impl ActuationError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn suggestion(&self) -> &'static str {
        "Grant accessibility/input permissions to the terminal running barline"
    }
}

/// A configuration value that cannot be used as given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("capture region must have positive width and height (got {w}x{h})")]
    EmptyRegion { w: u32, h: u32 },
    #[error("capture region origin must be non-negative (got {x},{y})")]
    NegativeOrigin { x: i64, y: i64 },
    #[error("malformed region '{0}', expected X,Y,W,H")]
    RegionSyntax(String),
    #[error("no capture region configured")]
    MissingRegion,
}

impl ConfigError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            ConfigError::EmptyRegion { .. } | ConfigError::NegativeOrigin { .. } => {
                "Pick a region fully inside the monitor"
            }
            ConfigError::RegionSyntax(_) => "Pass four integers, e.g. --region 800,400,120,300",
            ConfigError::MissingRegion => {
                "Run 'barline set-region X Y W H' or pass --region to 'barline run'"
            }
        }
    }
}

/// Lifecycle errors from the loop driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("loop is already running")]
    AlreadyRunning,
    #[error("loop is not running")]
    NotRunning,
    #[error("failed to open input device: {0}")]
    Device(#[from] ActuationError),
    #[error("loop worker panicked")]
    WorkerPanicked,
    #[error("failed to spawn loop worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl DriverError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            DriverError::AlreadyRunning => "Stop the running loop before starting a new one",
            DriverError::NotRunning => "Start the loop first",
            DriverError::Device(e) => e.suggestion(),
            DriverError::WorkerPanicked => {
                "This is an internal error. Please report it if it persists."
            }
            DriverError::Spawn(_) => "The system may be out of threads; close other programs",
        }
    }
}
