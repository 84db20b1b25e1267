//! Desktop runner: capture, input, the loop thread and its outputs.

pub mod actuator;
pub mod capture;
pub mod driver;
pub mod mouse;
pub mod paths;
pub mod preview;
pub mod stats;
pub mod store;

use barline_core::config::{CaptureConfig, Config};
use barline_core::error::ActuationError;
use barline_core::input::MouseButton;

use crate::runner::capture::XcapSource;
use crate::runner::driver::Backend;
use crate::runner::mouse::EnigoMouse;

// Public API - used by main.rs
pub use driver::{LoopDriver, LoopSettings};
pub use preview::{PreviewSettings, WatchObserver};
pub use stats::RunSummary;
pub use store::ConfigStore;

/// xcap capture and enigo mouse input.
pub struct DesktopBackend {
    capture: CaptureConfig,
    button: MouseButton,
}

impl DesktopBackend {
    pub fn from_config(config: &Config) -> Self {
        Self {
            capture: config.capture.clone(),
            button: config.input.mouse_button,
        }
    }

    pub fn source(&self) -> XcapSource {
        XcapSource::new(&self.capture)
    }
}

impl Backend for DesktopBackend {
    type Source = XcapSource;
    type Device = EnigoMouse;

    fn open_source(&self) -> XcapSource {
        self.source()
    }

    fn open_device(&self) -> Result<EnigoMouse, ActuationError> {
        EnigoMouse::new(self.button)
    }
}
