//! Captured pixel buffers and the capture seam.

use crate::error::{CaptureError, FrameError};
use crate::region::CaptureRegion;

/// Bytes per pixel in a [`Frame`] (blue, green, red, alpha).
pub const BYTES_PER_PIXEL: usize = 4;

/// One captured frame in BGRA order.
///
/// A frame is never mutated after it is built. The loop moves it into an
/// `Arc` when handing it to an observer, so publishing is a pointer copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap a BGRA buffer. The layout is checked by [`Frame::validate`],
    /// not here, so a malformed capture still reaches the detector.
    pub fn from_bgra(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Convert an RGBA buffer (the layout most capture APIs hand out).
    pub fn from_rgba(mut pixels: Vec<u8>, width: u32, height: u32) -> Self {
        for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        Self::from_bgra(pixels, width, height)
    }

    /// Copy out as RGBA, e.g. for encoding a preview image.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = self.pixels.clone();
        for px in out.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        out
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Check that the buffer is exactly `width * height * 4` bytes.
    pub fn validate(&self) -> Result<(), FrameError> {
        validate_layout(&self.pixels, self.width, self.height)
    }
}

pub(crate) fn validate_layout(pixels: &[u8], width: u32, height: u32) -> Result<(), FrameError> {
    if pixels.is_empty() {
        return Err(FrameError::Empty);
    }
    if width == 0 || height == 0 {
        return Err(FrameError::ZeroDimension { width, height });
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL));
    match expected {
        Some(expected) if expected == pixels.len() => Ok(()),
        expected => Err(FrameError::SizeMismatch {
            width,
            height,
            expected: expected.unwrap_or(usize::MAX),
            actual: pixels.len(),
        }),
    }
}

/// Something that can read a rectangle of the screen.
///
/// Implementations do not retry; the loop owns the retry policy.
pub trait FrameSource {
    fn capture(&mut self, region: &CaptureRegion) -> Result<Frame, CaptureError>;
}

impl<F> FrameSource for F
where
    F: FnMut(&CaptureRegion) -> Result<Frame, CaptureError>,
{
    fn capture(&mut self, region: &CaptureRegion) -> Result<Frame, CaptureError> {
        self(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_exact_size() {
        let frame = Frame::from_bgra(vec![0; 3 * 2 * 4], 3, 2);
        assert_eq!(frame.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_malformed_buffers() {
        assert_eq!(Frame::from_bgra(vec![], 3, 2).validate(), Err(FrameError::Empty));
        assert_eq!(
            Frame::from_bgra(vec![0; 8], 0, 2).validate(),
            Err(FrameError::ZeroDimension {
                width: 0,
                height: 2
            })
        );
        assert_eq!(
            Frame::from_bgra(vec![0; 23], 3, 2).validate(),
            Err(FrameError::SizeMismatch {
                width: 3,
                height: 2,
                expected: 24,
                actual: 23
            })
        );
    }

    #[test]
    fn test_rgba_conversion_swaps_red_and_blue() {
        let frame = Frame::from_rgba(vec![10, 20, 30, 255, 1, 2, 3, 4], 2, 1);
        assert_eq!(frame.pixels(), &[30, 20, 10, 255, 3, 2, 1, 4]);
        assert_eq!(frame.to_rgba(), vec![10, 20, 30, 255, 1, 2, 3, 4]);
    }

    #[test]
    fn test_closure_is_a_frame_source() {
        let mut calls = 0;
        let mut source = |region: &CaptureRegion| -> Result<Frame, CaptureError> {
            calls += 1;
            let (w, h) = (region.width(), region.height());
            Ok(Frame::from_bgra(vec![0; (w * h * 4) as usize], w, h))
        };
        let region = CaptureRegion::new(0, 0, 2, 2).unwrap();
        let frame = source.capture(&region).unwrap();
        assert_eq!((frame.width(), frame.height()), (2, 2));
        drop(source);
        assert_eq!(calls, 1);
    }
}
