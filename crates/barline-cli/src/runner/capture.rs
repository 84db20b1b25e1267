//! Screen capture using xcap.

use barline_core::config::CaptureConfig;
use barline_core::error::{BoxError, CaptureError};
use barline_core::frame::{Frame, FrameSource};
use barline_core::region::CaptureRegion;
use tracing::{debug, info};
use xcap::Monitor;

/// Captures a region of one monitor.
///
/// Regions are relative to the monitor's top-left corner and are scaled by
/// `dpi_scale` before capture. The monitor handle is cached between ticks
/// and dropped after any failure so a reconnected display is found again.
pub struct XcapSource {
    monitor_index: usize,
    dpi_scale: f64,
    monitor: Option<Monitor>,
}

impl XcapSource {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            monitor_index: config.monitor_index,
            dpi_scale: config.dpi_scale,
            monitor: None,
        }
    }

    fn open_monitor(&self) -> Result<Monitor, BoxError> {
        let monitors = Monitor::all().map_err(|e| e.to_string())?;
        let count = monitors.len();
        let monitor = monitors.into_iter().nth(self.monitor_index).ok_or_else(|| {
            format!(
                "monitor {} not found ({} connected)",
                self.monitor_index, count
            )
        })?;
        if let Ok(name) = monitor.name() {
            info!("Capturing from monitor {} ({})", self.monitor_index, name);
        }
        Ok(monitor)
    }
}

impl FrameSource for XcapSource {
    fn capture(&mut self, region: &CaptureRegion) -> Result<Frame, CaptureError> {
        let monitor = match self.monitor.take() {
            Some(monitor) => monitor,
            None => self
                .open_monitor()
                .map_err(|e| CaptureError::new(*region, e))?,
        };

        let scaled = region.scaled(self.dpi_scale);
        let image = monitor
            .capture_region(scaled.x(), scaled.y(), scaled.width(), scaled.height())
            .map_err(|e| {
                debug!("Dropping cached monitor after capture failure");
                CaptureError::new(*region, e.to_string())
            })?;

        self.monitor = Some(monitor);
        let (width, height) = (image.width(), image.height());
        let frame = Frame::from_rgba(image.into_raw(), width, height);
        frame.validate().map_err(|e| CaptureError::new(*region, e))?;
        Ok(frame)
    }
}
