//! Executes policy decisions on the input device.
//!
//! The actuator is the only thing that touches the device during a run.
//! Device errors are logged and never abort the loop; a failed call leaves
//! a release pending that is retried on the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use barline_core::detect::DetectionResult;
use barline_core::input::InputDevice;
use barline_core::policy::{Action, ActuationPolicy};
use tracing::{debug, warn};

use crate::runner::stats::RunStats;

pub struct Actuator<D: InputDevice> {
    device: D,
    policy: ActuationPolicy,
    /// Cleared by the driver when a stop is requested.
    running: Arc<AtomicBool>,
    stats: Arc<RunStats>,
    pending_release: bool,
}

impl<D: InputDevice> Actuator<D> {
    pub fn new(
        device: D,
        policy: ActuationPolicy,
        running: Arc<AtomicBool>,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            device,
            policy,
            running,
            stats,
            pending_release: false,
        }
    }

    /// Decide and execute for one detection.
    ///
    /// Once a stop is requested nothing reaches the device; the worker's
    /// final [`release`](Self::release) is the only call left.
    pub fn apply(&mut self, result: &DetectionResult, now: Instant) -> Action {
        if self.stop_requested() {
            return Action::Idle;
        }
        if self.pending_release {
            debug!("Retrying pending release");
            self.release();
        }
        let action = self.policy.decide(Some(result), now);
        self.execute(action);
        action
    }

    pub fn execute(&mut self, action: Action) {
        // A stop may have been requested since the decision was made.
        if self.stop_requested() {
            return;
        }
        match action {
            Action::Idle => {}
            Action::Release => self.release(),
            Action::Hold(duration) => {
                if let Err(e) = self.device.press() {
                    warn!("Mouse press failed: {} (hint: {})", e, e.suggestion());
                    self.stats.record_actuation_failure();
                    self.pending_release = true;
                    return;
                }
                self.stats.record_hold();
                thread::sleep(duration);
                if self.stop_requested() {
                    // Left held for the final release.
                    self.pending_release = true;
                    return;
                }
                self.release();
            }
        }
    }

    fn stop_requested(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Release the button, remembering to retry if the device refuses.
    pub fn release(&mut self) {
        match self.device.release() {
            Ok(()) => {
                self.pending_release = false;
                self.stats.record_release();
            }
            Err(e) => {
                warn!("Mouse release failed: {} (hint: {})", e, e.suggestion());
                self.stats.record_actuation_failure();
                self.pending_release = true;
            }
        }
    }

    pub fn has_pending_release(&self) -> bool {
        self.pending_release
    }

    #[cfg(test)]
    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use barline_core::error::ActuationError;
    use barline_core::policy::HoldParams;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Press,
        Release,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        fail_next: usize,
        /// Cleared on press, as if a stop arrived mid-hold.
        stop_on_press: Option<Arc<AtomicBool>>,
    }

    impl Recorder {
        fn outcome(&mut self, event: Event) -> Result<(), ActuationError> {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(ActuationError::new("injection refused"));
            }
            if let (Event::Press, Some(flag)) = (event, &self.stop_on_press) {
                flag.store(false, Ordering::SeqCst);
            }
            self.events.push(event);
            Ok(())
        }
    }

    impl InputDevice for Recorder {
        fn press(&mut self) -> Result<(), ActuationError> {
            self.outcome(Event::Press)
        }

        fn release(&mut self) -> Result<(), ActuationError> {
            self.outcome(Event::Release)
        }
    }

    fn params() -> HoldParams {
        HoldParams {
            min_hold: Duration::from_micros(100),
            max_hold: Duration::from_micros(500),
            cooldown: Duration::from_micros(50),
            saturation: 40.0,
        }
    }

    fn actuator(device: Recorder, running: bool) -> (Actuator<Recorder>, Instant, Arc<RunStats>) {
        let start = Instant::now();
        let stats = Arc::new(RunStats::default());
        let actuator = Actuator::new(
            device,
            ActuationPolicy::new(params(), start),
            Arc::new(AtomicBool::new(running)),
            stats.clone(),
        );
        (actuator, start + params().cooldown, stats)
    }

    #[test]
    fn test_hold_presses_then_releases() {
        let (mut act, now, stats) = actuator(Recorder::default(), true);
        let action = act.apply(&DetectionResult::found(110, 100), now);
        assert!(matches!(action, Action::Hold(_)));
        assert_eq!(act.into_device().events, vec![Event::Press, Event::Release]);
        assert_eq!(stats.holds(), 1);
        assert_eq!(stats.releases(), 1);
    }

    #[test]
    fn test_negative_distance_only_releases() {
        let (mut act, now, _) = actuator(Recorder::default(), true);
        assert_eq!(act.apply(&DetectionResult::found(90, 100), now), Action::Release);
        assert_eq!(act.into_device().events, vec![Event::Release]);
    }

    #[test]
    fn test_inactive_detection_releases() {
        let (mut act, now, _) = actuator(Recorder::default(), true);
        assert_eq!(act.apply(&DetectionResult::inactive(), now), Action::Release);
        assert_eq!(act.into_device().events, vec![Event::Release]);
    }

    #[test]
    fn test_nothing_reaches_device_after_stop_request() {
        let (mut act, now, stats) = actuator(Recorder::default(), false);
        assert_eq!(act.apply(&DetectionResult::found(130, 100), now), Action::Idle);
        assert_eq!(act.apply(&DetectionResult::inactive(), now), Action::Idle);
        act.execute(Action::Hold(Duration::from_micros(100)));
        act.execute(Action::Release);
        assert!(act.into_device().events.is_empty());
        assert_eq!(stats.holds(), 0);
    }

    #[test]
    fn test_stop_during_hold_leaves_release_to_caller() {
        let (mut act, now, _) = actuator(Recorder::default(), true);
        act.device.stop_on_press = Some(act.running.clone());

        act.apply(&DetectionResult::found(120, 100), now);
        assert!(act.has_pending_release());
        assert_eq!(act.device.events, vec![Event::Press]);

        act.release();
        assert!(!act.has_pending_release());
        assert_eq!(act.into_device().events, vec![Event::Press, Event::Release]);
    }

    #[test]
    fn test_failed_release_is_retried_next_tick() {
        let device = Recorder {
            fail_next: 1,
            ..Recorder::default()
        };
        let (mut act, now, stats) = actuator(device, true);

        act.apply(&DetectionResult::inactive(), now);
        assert!(act.has_pending_release());
        assert_eq!(stats.actuation_failures(), 1);

        // Within cooldown: the policy idles, but the pending release still fires.
        let early = now - params().cooldown / 2;
        let action = act.apply(&DetectionResult::found(120, 100), early);
        assert_eq!(action, Action::Idle);
        assert!(!act.has_pending_release());
        assert_eq!(act.into_device().events, vec![Event::Release]);
    }

    #[test]
    fn test_failed_press_marks_release_pending() {
        let device = Recorder {
            fail_next: 1,
            ..Recorder::default()
        };
        let (mut act, now, stats) = actuator(device, true);
        act.apply(&DetectionResult::found(120, 100), now);
        assert!(act.has_pending_release());
        assert_eq!(stats.holds(), 0);
        assert_eq!(stats.actuation_failures(), 1);
    }
}
