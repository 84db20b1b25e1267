//! Reference line and bar detection.
//!
//! The detector looks at a vertical strip in the middle of the frame and,
//! for every row, counts pixels that are very bright or very dark:
//!
//! | Feature | Pixel test | Row chosen |
//! |---------|------------|------------|
//! | **Reference line** | `b + g + r > white_threshold` | most bright pixels |
//! | **Bar** | `b + g + r < black_threshold` | most dark pixels |
//!
//! Ties go to the topmost row. If either best row has fewer than
//! `min_blob_size` matching pixels the frame is treated as "nothing to
//! track" and the result is inactive.
//!
//! Detection is a pure function of the input bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VisionConfig;
use crate::frame::{validate_layout, Frame, BYTES_PER_PIXEL};

/// Outcome of scanning one frame.
///
/// Either all positional fields are present (`active`) or none are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    white_y: Option<u32>,
    bar_y: Option<u32>,
    distance: Option<f64>,
    active: bool,
}

impl DetectionResult {
    pub fn inactive() -> Self {
        Self {
            white_y: None,
            bar_y: None,
            distance: None,
            active: false,
        }
    }

    /// An active detection; `distance` is `white_y - bar_y`.
    pub fn found(white_y: u32, bar_y: u32) -> Self {
        Self {
            white_y: Some(white_y),
            bar_y: Some(bar_y),
            distance: Some(f64::from(white_y) - f64::from(bar_y)),
            active: true,
        }
    }

    /// Row of the reference line.
    pub fn white_y(&self) -> Option<u32> {
        self.white_y
    }

    /// Row of the bar.
    pub fn bar_y(&self) -> Option<u32> {
        self.bar_y
    }

    /// `white_y - bar_y`, in rows.
    pub fn distance(&self) -> Option<f64> {
        self.distance
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for DetectionResult {
    fn default() -> Self {
        Self::inactive()
    }
}

/// Column range `[left, right)` of the detection strip for a frame width.
pub fn strip_columns(width: u32, left: f64, right: f64) -> (usize, usize) {
    let w = f64::from(width);
    let start = ((w * left) as usize).min(width as usize);
    let end = ((w * right) as usize).min(width as usize);
    (start, end.max(start))
}

/// Brightness-based feature detector.
#[derive(Debug, Clone)]
pub struct FeatureDetector {
    config: VisionConfig,
}

impl FeatureDetector {
    pub fn new(config: VisionConfig) -> Self {
        Self { config }
    }

    pub fn detect_frame(&self, frame: &Frame) -> DetectionResult {
        self.detect(frame.pixels(), frame.width(), frame.height())
    }

    /// Scan a BGRA buffer. Malformed buffers yield an inactive result.
    pub fn detect(&self, pixels: &[u8], width: u32, height: u32) -> DetectionResult {
        if let Err(e) = validate_layout(pixels, width, height) {
            debug!("Skipping malformed frame: {}", e);
            return DetectionResult::inactive();
        }

        let cfg = &self.config;
        let (start, end) = strip_columns(width, cfg.strip_left, cfg.strip_right);
        let stride = width as usize * BYTES_PER_PIXEL;

        let mut best_white = RowMax::default();
        let mut best_black = RowMax::default();

        for (y, row) in pixels.chunks_exact(stride).enumerate() {
            let strip = &row[start * BYTES_PER_PIXEL..end * BYTES_PER_PIXEL];
            let mut white = 0u32;
            let mut black = 0u32;
            for px in strip.chunks_exact(BYTES_PER_PIXEL) {
                let brightness = u16::from(px[0]) + u16::from(px[1]) + u16::from(px[2]);
                if brightness > cfg.white_threshold {
                    white += 1;
                }
                if brightness < cfg.black_threshold {
                    black += 1;
                }
            }
            best_white.offer(y as u32, white);
            best_black.offer(y as u32, black);
        }

        if best_white.count < cfg.min_blob_size || best_black.count < cfg.min_blob_size {
            return DetectionResult::inactive();
        }

        DetectionResult::found(best_white.row, best_black.row)
    }
}

impl Default for FeatureDetector {
    fn default() -> Self {
        Self::new(VisionConfig::default())
    }
}

/// Running argmax that keeps the first row reaching the maximum.
#[derive(Debug, Default)]
struct RowMax {
    row: u32,
    count: u32,
}

impl RowMax {
    fn offer(&mut self, row: u32, count: u32) {
        if count > self.count {
            self.row = row;
            self.count = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAY: u8 = 133; // 3 * 133 = 399, neither bright nor dark
    const BRIGHT: u8 = 230; // 690
    const DARK: u8 = 20; // 60

    /// Uniform gray frame with optional bright/dark rows painted across
    /// columns `[x0, x1)`.
    fn frame(width: u32, height: u32, rows: &[(u32, u8, u32, u32)]) -> Frame {
        let mut pixels = vec![0u8; (width * height) as usize * BYTES_PER_PIXEL];
        for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&[GRAY, GRAY, GRAY, 255]);
        }
        for &(y, value, x0, x1) in rows {
            for x in x0..x1 {
                let i = ((y * width + x) as usize) * BYTES_PER_PIXEL;
                pixels[i..i + 3].copy_from_slice(&[value, value, value]);
            }
        }
        Frame::from_bgra(pixels, width, height)
    }

    #[test]
    fn test_bright_above_dark_gives_negative_distance() {
        let f = frame(100, 50, &[(10, BRIGHT, 40, 60), (30, DARK, 40, 60)]);
        let result = FeatureDetector::default().detect_frame(&f);
        assert_eq!(result, DetectionResult::found(10, 30));
        assert_eq!(result.white_y(), Some(10));
        assert_eq!(result.bar_y(), Some(30));
        assert_eq!(result.distance(), Some(-20.0));
        assert!(result.is_active());
    }

    #[test]
    fn test_dark_above_bright_gives_positive_distance() {
        let f = frame(100, 50, &[(30, BRIGHT, 40, 60), (5, DARK, 40, 60)]);
        let result = FeatureDetector::default().detect_frame(&f);
        assert_eq!(result.distance(), Some(25.0));
    }

    #[test]
    fn test_uniform_frame_is_inactive() {
        let result = FeatureDetector::default().detect_frame(&frame(100, 50, &[]));
        assert_eq!(result, DetectionResult::inactive());
        assert_eq!(result.white_y(), None);
        assert_eq!(result.bar_y(), None);
        assert_eq!(result.distance(), None);
    }

    #[test]
    fn test_single_pixel_rows_are_below_signal_gate() {
        let f = frame(100, 50, &[(10, BRIGHT, 45, 46), (30, DARK, 45, 46)]);
        assert!(!FeatureDetector::default().detect_frame(&f).is_active());
    }

    #[test]
    fn test_missing_bar_is_inactive() {
        let f = frame(100, 50, &[(10, BRIGHT, 40, 60)]);
        assert!(!FeatureDetector::default().detect_frame(&f).is_active());
    }

    #[test]
    fn test_two_pixels_pass_signal_gate() {
        let f = frame(100, 50, &[(7, BRIGHT, 50, 52), (8, DARK, 50, 52)]);
        assert_eq!(
            FeatureDetector::default().detect_frame(&f),
            DetectionResult::found(7, 8)
        );
    }

    #[test]
    fn test_features_outside_strip_are_ignored() {
        // Columns 0..40 and 60..100 are outside the strip.
        let f = frame(
            100,
            50,
            &[(10, BRIGHT, 0, 40), (30, DARK, 60, 100), (12, BRIGHT, 40, 60), (33, DARK, 40, 60)],
        );
        assert_eq!(
            FeatureDetector::default().detect_frame(&f),
            DetectionResult::found(12, 33)
        );
    }

    #[test]
    fn test_ties_resolve_to_topmost_row() {
        let f = frame(
            100,
            50,
            &[(20, BRIGHT, 40, 60), (3, BRIGHT, 40, 60), (40, DARK, 40, 60), (25, DARK, 40, 60)],
        );
        assert_eq!(
            FeatureDetector::default().detect_frame(&f),
            DetectionResult::found(3, 25)
        );
    }

    #[test]
    fn test_alpha_is_ignored() {
        let mut f = frame(100, 50, &[(10, BRIGHT, 40, 60), (30, DARK, 40, 60)]);
        let mut pixels = f.pixels().to_vec();
        for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px[3] = 0;
        }
        f = Frame::from_bgra(pixels, 100, 50);
        assert_eq!(
            FeatureDetector::default().detect_frame(&f),
            DetectionResult::found(10, 30)
        );
    }

    #[test]
    fn test_malformed_buffers_are_inactive() {
        let detector = FeatureDetector::default();
        assert!(!detector.detect(&[], 10, 10).is_active());
        assert!(!detector.detect(&[0; 16], 0, 4).is_active());
        assert!(!detector.detect(&[0; 16], 4, 0).is_active());
        assert!(!detector.detect(&[0; 15], 2, 2).is_active());
        assert!(!detector.detect(&[0; 20], 2, 2).is_active());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let f = frame(100, 50, &[(30, BRIGHT, 40, 60), (5, DARK, 40, 60)]);
        let detector = FeatureDetector::default();
        assert_eq!(detector.detect_frame(&f), detector.detect_frame(&f));
    }

    #[test]
    fn test_distance_matches_rows_for_every_active_pair() {
        let detector = FeatureDetector::default();
        for white in [0u32, 9, 24, 49] {
            for bar in [0u32, 13, 49] {
                if white == bar {
                    continue;
                }
                let f = frame(100, 50, &[(white, BRIGHT, 40, 60), (bar, DARK, 40, 60)]);
                let result = detector.detect_frame(&f);
                assert!(result.is_active());
                assert_eq!(
                    result.distance(),
                    Some(f64::from(white) - f64::from(bar)),
                    "white={} bar={}",
                    white,
                    bar
                );
            }
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let config = VisionConfig {
            white_threshold: 380,
            black_threshold: 420,
            min_blob_size: 5,
            ..VisionConfig::default()
        };
        // Gray (399) counts as both bright and dark under these thresholds,
        // so every row ties and the topmost wins.
        let result = FeatureDetector::new(config).detect_frame(&frame(100, 50, &[]));
        assert_eq!(result, DetectionResult::found(0, 0));
    }

    #[test]
    fn test_strip_columns() {
        assert_eq!(strip_columns(100, 0.40, 0.60), (40, 60));
        assert_eq!(strip_columns(7, 0.40, 0.60), (2, 4));
        assert_eq!(strip_columns(1, 0.40, 0.60), (0, 0));
    }

    #[test]
    fn test_narrow_frame_lacks_signal() {
        let f = frame(2, 10, &[(1, BRIGHT, 0, 2), (3, DARK, 0, 2)]);
        assert!(!FeatureDetector::default().detect_frame(&f).is_active());
    }
}
