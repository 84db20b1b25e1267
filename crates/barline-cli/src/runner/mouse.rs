//! Mouse button injection using enigo.

use barline_core::error::ActuationError;
use barline_core::input::{InputDevice, MouseButton};
use enigo::{Button, Direction, Enigo, Mouse, Settings};

/// Presses and releases one mouse button at the current cursor position.
pub struct EnigoMouse {
    enigo: Enigo,
    button: Button,
}

impl EnigoMouse {
    pub fn new(button: MouseButton) -> Result<Self, ActuationError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| ActuationError::new(e.to_string()))?;
        Ok(Self {
            enigo,
            button: match button {
                MouseButton::Left => Button::Left,
                MouseButton::Right => Button::Right,
            },
        })
    }

    fn send(&mut self, direction: Direction) -> Result<(), ActuationError> {
        self.enigo
            .button(self.button, direction)
            .map_err(|e| ActuationError::new(e.to_string()))
    }
}

impl InputDevice for EnigoMouse {
    fn press(&mut self) -> Result<(), ActuationError> {
        self.send(Direction::Press)
    }

    fn release(&mut self) -> Result<(), ActuationError> {
        self.send(Direction::Release)
    }
}
