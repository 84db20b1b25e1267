//! Latest-value preview channel and the annotated PNG writer.
//!
//! The loop worker overwrites a single `watch` slot and never waits. The
//! async preview task wakes on changes, folds them into a tracking status
//! and, when a path is configured, rewrites a PNG at a bounded rate.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use barline_core::config::Config;
use barline_core::detect::{strip_columns, DetectionResult};
use barline_core::frame::Frame;
use barline_core::status::{Observer, StatusTracker, TrackingStatus, Update};
use image::{Rgba, RgbaImage};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const STRIP_COLOR: Rgba<u8> = Rgba([255, 200, 0, 255]);
const LINE_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BAR_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Publishes updates into a `watch` channel, replacing the previous one.
pub struct WatchObserver {
    tx: watch::Sender<Option<Update>>,
}

impl WatchObserver {
    pub fn channel() -> (Self, watch::Receiver<Option<Update>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl Observer for WatchObserver {
    fn publish(&self, update: Update) {
        // send_replace stores the value even with no receiver left.
        self.tx.send_replace(Some(update));
    }
}

#[derive(Debug, Clone)]
pub struct PreviewSettings {
    /// Where to write the PNG. `None` disables writing.
    pub path: Option<PathBuf>,
    pub interval: Duration,
    pub draw_overlay: bool,
    pub strip_left: f64,
    pub strip_right: f64,
}

impl PreviewSettings {
    pub fn from_config(config: &Config, path: Option<PathBuf>) -> Self {
        Self {
            path: path.filter(|_| config.debug.show_preview),
            interval: Duration::from_millis(config.debug.preview_interval_ms),
            draw_overlay: config.debug.draw_overlay,
            strip_left: config.vision.strip_left,
            strip_right: config.vision.strip_right,
        }
    }
}

/// Render a frame, optionally marking the strip and both detected rows.
pub fn render_preview(
    frame: &Frame,
    result: &DetectionResult,
    overlay: Option<(f64, f64)>,
) -> Result<RgbaImage> {
    let mut img = RgbaImage::from_raw(frame.width(), frame.height(), frame.to_rgba())
        .context("Frame buffer does not match its dimensions")?;

    let Some((left, right)) = overlay else {
        return Ok(img);
    };
    let (w, h) = img.dimensions();
    let (x0, x1) = strip_columns(w, left, right);
    for x in [x0 as u32, (x1 as u32).saturating_sub(1)] {
        if x < w {
            for y in 0..h {
                img.put_pixel(x, y, STRIP_COLOR);
            }
        }
    }

    for (row, color) in [(result.white_y(), LINE_COLOR), (result.bar_y(), BAR_COLOR)] {
        if let Some(y) = row.filter(|y| *y < h) {
            for x in 0..w {
                img.put_pixel(x, y, color);
            }
        }
    }
    Ok(img)
}

pub fn save_preview(img: &RgbaImage, path: &Path) -> Result<()> {
    img.save(path)
        .with_context(|| format!("Failed to write preview to {}", path.display()))
}

/// Consume updates until the sending side is dropped.
pub async fn run_preview(
    mut rx: watch::Receiver<Option<Update>>,
    settings: PreviewSettings,
    mut tracker: StatusTracker,
) {
    let mut last_write: Option<Instant> = None;
    let overlay = settings
        .draw_overlay
        .then_some((settings.strip_left, settings.strip_right));

    while rx.changed().await.is_ok() {
        let Some(update) = rx.borrow_and_update().clone() else {
            continue;
        };

        let now = Instant::now();
        if let Some(status) = tracker.observe(&update, now) {
            match status {
                TrackingStatus::CaptureFailing { consecutive } if consecutive > 1 => {
                    debug!("Status: {} ({} in a row)", status.label(), consecutive)
                }
                _ => info!("Status: {}", status.label()),
            }
        }

        let (Some(path), Update::Frame { frame, result, .. }) = (&settings.path, update) else {
            continue;
        };
        if last_write.is_some_and(|t| now.duration_since(t) < settings.interval) {
            continue;
        }
        last_write = Some(now);

        let path = path.clone();
        let written = tokio::task::spawn_blocking(move || {
            let img = render_preview(&frame, &result, overlay)?;
            save_preview(&img, &path)
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{:#}", e),
            Err(e) => warn!("Preview writer task failed: {}", e),
        }
    }
    debug!("Preview channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use barline_core::frame::BYTES_PER_PIXEL;
    use tempfile::TempDir;

    fn gray(w: u32, h: u32) -> Frame {
        Frame::from_bgra(vec![100u8; (w * h) as usize * BYTES_PER_PIXEL], w, h)
    }

    #[test]
    fn test_render_without_overlay_keeps_pixels() {
        let img = render_preview(&gray(10, 4), &DetectionResult::found(1, 2), None).unwrap();
        assert!(img.pixels().all(|p| *p == Rgba([100, 100, 100, 100])));
    }

    #[test]
    fn test_render_marks_rows_and_strip() {
        let img = render_preview(
            &gray(10, 6),
            &DetectionResult::found(1, 4),
            Some((0.4, 0.6)),
        )
        .unwrap();
        assert_eq!(*img.get_pixel(0, 1), LINE_COLOR);
        assert_eq!(*img.get_pixel(9, 4), BAR_COLOR);
        assert_eq!(*img.get_pixel(4, 0), STRIP_COLOR);
        assert_eq!(*img.get_pixel(5, 5), STRIP_COLOR);
        assert_eq!(*img.get_pixel(0, 0), Rgba([100, 100, 100, 100]));
    }

    #[test]
    fn test_watch_observer_keeps_latest() {
        let (observer, rx) = WatchObserver::channel();
        for consecutive in 1..=3 {
            observer.publish(Update::CaptureFailed {
                consecutive,
                message: "gone".into(),
            });
        }
        assert!(matches!(
            *rx.borrow(),
            Some(Update::CaptureFailed { consecutive: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_preview_task_writes_png_and_ends_with_sender() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preview.png");
        let (observer, rx) = WatchObserver::channel();
        let settings = PreviewSettings {
            path: Some(path.clone()),
            interval: Duration::ZERO,
            draw_overlay: true,
            strip_left: 0.4,
            strip_right: 0.6,
        };
        let task = tokio::spawn(run_preview(
            rx,
            settings,
            StatusTracker::new(12, Duration::from_millis(60)),
        ));

        observer.publish(Update::Frame {
            seq: 1,
            frame: Arc::new(gray(8, 8)),
            result: DetectionResult::found(2, 6),
        });
        for _ in 0..200 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(observer);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (8, 8));
        assert_eq!(*img.get_pixel(0, 2), LINE_COLOR);
    }

    #[test]
    fn test_preview_disabled_by_config() {
        let mut config = Config::default();
        config.debug.show_preview = false;
        let settings = PreviewSettings::from_config(&config, Some("p.png".into()));
        assert!(settings.path.is_none());
    }
}
