//! Screen rectangles read by the capture loop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A validated capture rectangle in monitor pixels.
///
/// The origin is non-negative and both sides are positive. Construct it
/// with [`CaptureRegion::new`], [`CaptureRegion::from_signed`] or by
/// parsing `"X,Y,W,H"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CaptureRegion {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl CaptureRegion {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Result<Self, ConfigError> {
        if w == 0 || h == 0 {
            return Err(ConfigError::EmptyRegion { w, h });
        }
        Ok(Self { x, y, w, h })
    }

    /// Build a region from untrusted signed values (config files, CLI).
    pub fn from_signed(x: i64, y: i64, w: i64, h: i64) -> Result<Self, ConfigError> {
        if x < 0 || y < 0 {
            return Err(ConfigError::NegativeOrigin { x, y });
        }
        let clamp = |v: i64| u32::try_from(v.max(0)).unwrap_or(u32::MAX);
        if w <= 0 || h <= 0 {
            return Err(ConfigError::EmptyRegion {
                w: clamp(w),
                h: clamp(h),
            });
        }
        Self::new(clamp(x), clamp(y), clamp(w), clamp(h))
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.w
    }

    pub fn height(&self) -> u32 {
        self.h
    }

    /// Scale every coordinate by `factor`, rounding to the nearest pixel.
    ///
    /// Sides never shrink below one pixel.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |v: u32| {
            let scaled = (f64::from(v) * factor).round().max(0.0);
            scaled.min(f64::from(u32::MAX)) as u32
        };
        Self {
            x: scale(self.x),
            y: scale(self.y),
            w: scale(self.w).max(1),
            h: scale(self.h).max(1),
        }
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.w, self.h, self.x, self.y)
    }
}

impl FromStr for CaptureRegion {
    type Err = ConfigError;

    /// Parse `"X,Y,W,H"` (whitespace around numbers is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i64> = s
            .split(',')
            .map(|p| p.trim().parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|_| ConfigError::RegionSyntax(s.to_string()))?;
        match parts.as_slice() {
            [x, y, w, h] => Self::from_signed(*x, *y, *w, *h),
            _ => Err(ConfigError::RegionSyntax(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for CaptureRegion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            x: i64,
            y: i64,
            w: i64,
            h: i64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::from_signed(raw.x, raw.y, raw.w, raw.h).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_sides() {
        assert_eq!(
            CaptureRegion::new(0, 0, 0, 5),
            Err(ConfigError::EmptyRegion { w: 0, h: 5 })
        );
        assert!(CaptureRegion::new(0, 0, 5, 0).is_err());
        assert!(CaptureRegion::new(0, 0, 1, 1).is_ok());
    }

    #[test]
    fn test_from_signed_rejects_negative_origin() {
        assert_eq!(
            CaptureRegion::from_signed(-1, 3, 10, 10),
            Err(ConfigError::NegativeOrigin { x: -1, y: 3 })
        );
        assert!(matches!(
            CaptureRegion::from_signed(0, 0, -10, 10),
            Err(ConfigError::EmptyRegion { .. })
        ));
    }

    #[test]
    fn test_parse_region() {
        let region: CaptureRegion = "10, 20,300,500".parse().unwrap();
        assert_eq!(
            (region.x(), region.y(), region.width(), region.height()),
            (10, 20, 300, 500)
        );
    }

    #[test]
    fn test_parse_region_rejects_bad_syntax() {
        for input in ["", "1,2,3", "1,2,3,4,5", "a,b,c,d", "1;2;3;4"] {
            assert!(
                matches!(input.parse::<CaptureRegion>(), Err(ConfigError::RegionSyntax(_))),
                "{:?} should be a syntax error",
                input
            );
        }
    }

    #[test]
    fn test_scaled_rounds_and_keeps_positive_sides() {
        let region = CaptureRegion::new(10, 20, 3, 1).unwrap();
        let scaled = region.scaled(1.5);
        assert_eq!((scaled.x(), scaled.y(), scaled.width(), scaled.height()), (15, 30, 5, 2));

        let tiny = region.scaled(0.1);
        assert_eq!((tiny.width(), tiny.height()), (1, 1));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: CaptureRegion = serde_json::from_str(r#"{"x":1,"y":2,"w":3,"h":4}"#).unwrap();
        assert_eq!(ok, CaptureRegion::new(1, 2, 3, 4).unwrap());

        assert!(serde_json::from_str::<CaptureRegion>(r#"{"x":1,"y":2,"w":0,"h":4}"#).is_err());
        assert!(serde_json::from_str::<CaptureRegion>(r#"{"x":-1,"y":2,"w":3,"h":4}"#).is_err());
    }

    #[test]
    fn test_display() {
        let region = CaptureRegion::new(800, 400, 120, 300).unwrap();
        assert_eq!(region.to_string(), "120x300+800+400");
    }
}
