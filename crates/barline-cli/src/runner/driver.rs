//! The capture → detect → decide → act → publish loop.
//!
//! The loop runs on its own thread so rendering or logging on the caller
//! side can never delay a capture. Each tick is strictly sequential, so
//! updates reach the observer in capture order.
//!
//! Lifecycle: `Idle → Running → Stopping → Idle`. Stopping clears a shared
//! run flag that the worker polls before and after every capture and that
//! the actuator checks before touching the device. Once the flag is clear
//! the only device call left is the worker's final release, sent exactly
//! once on its way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use barline_core::config::{Config, VisionConfig};
use barline_core::detect::FeatureDetector;
use barline_core::error::{ActuationError, DriverError};
use barline_core::frame::FrameSource;
use barline_core::input::InputDevice;
use barline_core::policy::{ActuationPolicy, HoldParams};
use barline_core::region::CaptureRegion;
use barline_core::status::{Observer, Update};
use tracing::{debug, error, info, warn};

use crate::runner::actuator::Actuator;
use crate::runner::stats::RunStats;

/// Opens the platform capture and input handles on the worker thread.
///
/// Handles are created inside the worker so they never cross threads.
pub trait Backend: Send + Sync + 'static {
    type Source: FrameSource;
    type Device: InputDevice;

    fn open_source(&self) -> Self::Source;
    fn open_device(&self) -> Result<Self::Device, ActuationError>;
}

/// Per-run loop parameters, fixed for the duration of a run.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub vision: VisionConfig,
    pub hold: HoldParams,
    pub tick_period: Duration,
    pub capture_backoff: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            vision: config.vision.clone(),
            hold: config.control.hold_params(),
            tick_period: config.control.tick_period(),
            capture_backoff: config.control.capture_backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
}

pub struct LoopDriver<B: Backend> {
    backend: Arc<B>,
    observer: Arc<dyn Observer>,
    settings: LoopSettings,
    state: LoopState,
    running: Arc<AtomicBool>,
    stats: Arc<RunStats>,
    worker: Option<JoinHandle<()>>,
}

impl<B: Backend> LoopDriver<B> {
    pub fn new(backend: B, observer: Arc<dyn Observer>, settings: LoopSettings) -> Self {
        Self {
            backend: Arc::new(backend),
            observer,
            settings,
            state: LoopState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RunStats::default()),
            worker: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Counters for the current (or most recent) run.
    pub fn stats(&self) -> Arc<RunStats> {
        self.stats.clone()
    }

    /// Spawn the worker and block until it has opened the input device.
    pub fn start(&mut self, region: CaptureRegion) -> Result<(), DriverError> {
        if self.state != LoopState::Idle {
            return Err(DriverError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);
        self.stats = Arc::new(RunStats::default());
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), ActuationError>>(1);

        let worker = Worker {
            backend: self.backend.clone(),
            observer: self.observer.clone(),
            settings: self.settings.clone(),
            running: self.running.clone(),
            stats: self.stats.clone(),
            region,
        };
        let handle = thread::Builder::new()
            .name("barline-loop".into())
            .spawn(move || worker.run(ready_tx))
            .inspect_err(|_| self.running.store(false, Ordering::SeqCst))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Loop started on region {}", region);
                self.worker = Some(handle);
                self.state = LoopState::Running;
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(DriverError::Device(e))
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(DriverError::WorkerPanicked)
            }
        }
    }

    /// Request a stop and wait for the in-flight tick to finish.
    ///
    /// The worker emits its final release before this returns.
    pub fn stop(&mut self) -> Result<(), DriverError> {
        if self.state != LoopState::Running {
            return Err(DriverError::NotRunning);
        }

        self.state = LoopState::Stopping;
        self.running.store(false, Ordering::SeqCst);
        debug!("Stop requested, waiting for loop worker");

        let joined = self.worker.take().map(JoinHandle::join);
        self.state = LoopState::Idle;
        match joined {
            Some(Err(_)) => {
                error!("Loop worker panicked");
                Err(DriverError::WorkerPanicked)
            }
            _ => {
                info!("Loop stopped after {} ticks", self.stats.ticks());
                Ok(())
            }
        }
    }
}

impl<B: Backend> Drop for LoopDriver<B> {
    fn drop(&mut self) {
        if self.state == LoopState::Running {
            let _ = self.stop();
        }
    }
}

/// Everything the loop thread owns.
struct Worker<B: Backend> {
    backend: Arc<B>,
    observer: Arc<dyn Observer>,
    settings: LoopSettings,
    running: Arc<AtomicBool>,
    stats: Arc<RunStats>,
    region: CaptureRegion,
}

impl<B: Backend> Worker<B> {
    fn run(self, ready: mpsc::SyncSender<Result<(), ActuationError>>) {
        let device = match self.backend.open_device() {
            Ok(device) => device,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let mut source = self.backend.open_source();
        let detector = FeatureDetector::new(self.settings.vision.clone());
        let policy = ActuationPolicy::new(self.settings.hold, Instant::now());
        let mut actuator =
            Actuator::new(device, policy, self.running.clone(), self.stats.clone());
        let _ = ready.send(Ok(()));

        let mut seq = 0u64;
        let mut consecutive_failures = 0u32;

        while self.running.load(Ordering::SeqCst) {
            let tick_started = Instant::now();

            let frame = match source.capture(&self.region) {
                Ok(frame) => frame,
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    self.stats.record_capture_failure();
                    warn!(
                        "Capture failed ({} in a row): {} (hint: {})",
                        consecutive_failures,
                        e,
                        e.suggestion()
                    );
                    self.observer.publish(Update::CaptureFailed {
                        consecutive: consecutive_failures,
                        message: e.to_string(),
                    });
                    thread::sleep(self.settings.capture_backoff);
                    continue;
                }
            };
            consecutive_failures = 0;
            // Stopped while capturing: leave the device to the final release.
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let result = detector.detect_frame(&frame);
            let action = actuator.apply(&result, Instant::now());
            debug!(?result, ?action, "Tick {}", seq + 1);

            seq += 1;
            self.stats.record_tick();
            self.observer.publish(Update::Frame {
                seq,
                frame: Arc::new(frame),
                result,
            });

            let elapsed = tick_started.elapsed();
            if let Some(rest) = self.settings.tick_period.checked_sub(elapsed) {
                thread::sleep(rest);
            }
        }

        actuator.release();
        if actuator.has_pending_release() {
            error!("Final release failed; the mouse button may still be held");
        }
    }
}
