//! Input device seam.
//!
//! The loop only ever presses and releases a single mouse button. Keeping
//! the device behind a trait lets the actuation logic run against a
//! recording fake in tests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ActuationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
        }
    }
}

/// A device that can hold a button down and let it go.
///
/// `release` must be safe to call when the button is already up.
pub trait InputDevice {
    fn press(&mut self) -> Result<(), ActuationError>;
    fn release(&mut self) -> Result<(), ActuationError>;
}

impl<D: InputDevice + ?Sized> InputDevice for Box<D> {
    fn press(&mut self) -> Result<(), ActuationError> {
        (**self).press()
    }

    fn release(&mut self) -> Result<(), ActuationError> {
        (**self).release()
    }
}
