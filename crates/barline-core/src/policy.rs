//! Hold/release decisions.
//!
//! This is the "decide" half of actuation. It never touches a device: it
//! turns a detection and the current time into an [`Action`], and the
//! runner executes that action.
//!
//! The policy keeps correcting continuously with no dead zone:
//!
//! | Situation | Action |
//! |-----------|--------|
//! | no usable detection | release (never leave the button held) |
//! | within `cooldown` of the last action | nothing |
//! | `distance < 0` | release |
//! | `distance >= 0` | hold for `min_hold + s * (max_hold - min_hold)` |
//!
//! where `s = min(1, distance / saturation)`.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::detect::DetectionResult;

/// What the device should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "hold_us", rename_all = "snake_case")]
pub enum Action {
    /// Leave the device alone.
    Idle,
    /// Make sure the button is up.
    Release,
    /// Press, keep down for the duration, then release.
    Hold(#[serde(serialize_with = "as_micros")] Duration),
}

fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
}

/// Tunables for [`ActuationPolicy`]. `min_hold <= max_hold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldParams {
    pub min_hold: Duration,
    pub max_hold: Duration,
    pub cooldown: Duration,
    /// Distance at which the hold reaches `max_hold`.
    pub saturation: f64,
}

impl Default for HoldParams {
    fn default() -> Self {
        Self {
            min_hold: Duration::from_micros(2_000),
            max_hold: Duration::from_micros(18_000),
            cooldown: Duration::from_micros(1_500),
            saturation: 40.0,
        }
    }
}

impl HoldParams {
    /// Hold duration for a non-negative distance.
    pub fn hold_for(&self, distance: f64) -> Duration {
        let strength = (distance / self.saturation).clamp(0.0, 1.0);
        let span = self.max_hold.saturating_sub(self.min_hold);
        self.min_hold + span.mul_f64(strength)
    }
}

/// Rate-limited continuous correction policy.
#[derive(Debug, Clone)]
pub struct ActuationPolicy {
    params: HoldParams,
    last_action: Instant,
}

impl ActuationPolicy {
    /// The cooldown is counted from `now`, so the first correction can
    /// happen one cooldown after creation.
    pub fn new(params: HoldParams, now: Instant) -> Self {
        Self {
            params,
            last_action: now,
        }
    }

    pub fn last_action(&self) -> Instant {
        self.last_action
    }

    pub fn decide(&mut self, result: Option<&DetectionResult>, now: Instant) -> Action {
        let Some(distance) = result
            .filter(|r| r.is_active())
            .and_then(DetectionResult::distance)
        else {
            return Action::Release;
        };

        if now.saturating_duration_since(self.last_action) < self.params.cooldown {
            return Action::Idle;
        }

        self.last_action = now;
        if distance < 0.0 {
            Action::Release
        } else {
            Action::Hold(self.params.hold_for(distance))
        }
    }
}
