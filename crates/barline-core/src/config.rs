//! Typed configuration with defaults and repair.
//!
//! The on-disk form is JSON with one object per section. Loading is
//! forgiving: missing keys take their defaults, values of the wrong type
//! are dropped, and out-of-range values are reset by [`Config::sanitize`].
//! Every repair is reported as a human-readable note so the caller can
//! log it and persist the fixed file.
//!
//! The loop treats a `Config` as immutable for the duration of a run.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::input::MouseButton;
use crate::policy::HoldParams;
use crate::region::CaptureRegion;

/// Highest possible brightness (sum of three 8-bit channels).
pub const MAX_BRIGHTNESS: u16 = 765;

/// Accepted `control.loop_hz` range.
pub const LOOP_HZ_RANGE: std::ops::RangeInclusive<u32> = 20..=240;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub vision: VisionConfig,
    pub control: ControlConfig,
    pub input: InputConfig,
    pub safety: SafetyConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Region relative to the selected monitor, before DPI scaling.
    pub region: Option<CaptureRegion>,
    pub monitor_index: usize,
    pub dpi_scale: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            region: None,
            monitor_index: 0,
            dpi_scale: 1.0,
        }
    }
}

/// Detector thresholds. Brightness is `b + g + r` in `[0, 765]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub white_threshold: u16,
    pub black_threshold: u16,
    /// Minimum matching pixels in the best row for a feature to count.
    pub min_blob_size: u32,
    /// Left edge of the detection strip as a fraction of frame width.
    pub strip_left: f64,
    /// Right edge (exclusive) of the detection strip.
    pub strip_right: f64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            white_threshold: 650,
            black_threshold: 100,
            min_blob_size: 2,
            strip_left: 0.40,
            strip_right: 0.60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Distance (rows) within which the bar counts as on target.
    pub tolerance_px: u32,
    /// Time without a detection before tracking is reported lost.
    pub min_flip_ms: u64,
    pub loop_hz: u32,
    pub min_hold_us: u64,
    pub max_hold_us: u64,
    pub cooldown_us: u64,
    /// Distance at which the hold duration reaches `max_hold_us`.
    pub saturation_px: f64,
    /// Pause after a failed capture before the next attempt.
    pub capture_backoff_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tolerance_px: 12,
            min_flip_ms: 60,
            loop_hz: 90,
            min_hold_us: 2_000,
            max_hold_us: 18_000,
            cooldown_us: 1_500,
            saturation_px: 40.0,
            capture_backoff_ms: 50,
        }
    }
}

impl ControlConfig {
    pub fn hold_params(&self) -> HoldParams {
        HoldParams {
            min_hold: Duration::from_micros(self.min_hold_us),
            max_hold: Duration::from_micros(self.max_hold_us),
            cooldown: Duration::from_micros(self.cooldown_us),
            saturation: self.saturation_px,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.loop_hz.max(1)))
    }

    pub fn capture_backoff(&self) -> Duration {
        Duration::from_millis(self.capture_backoff_ms)
    }

    pub fn lost_after(&self) -> Duration {
        Duration::from_millis(self.min_flip_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub mouse_button: MouseButton,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Stop the loop after this many seconds. `0` means no limit.
    pub max_run_seconds: u64,
}

impl SafetyConfig {
    pub fn max_run(&self) -> Option<Duration> {
        (self.max_run_seconds > 0).then(|| Duration::from_secs(self.max_run_seconds))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub show_preview: bool,
    pub draw_overlay: bool,
    pub log_level: LogLevel,
    pub preview_interval_ms: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_preview: true,
            draw_overlay: true,
            log_level: LogLevel::Info,
            preview_interval_ms: 250,
        }
    }
}

impl Config {
    /// The configured region, or an error telling the operator to set one.
    pub fn region(&self) -> Result<CaptureRegion, ConfigError> {
        self.capture.region.ok_or(ConfigError::MissingRegion)
    }

    /// Build a config from arbitrary JSON, repairing what can be repaired.
    ///
    /// Returns `None` only when the root is not a JSON object.
    pub fn from_json(value: Value) -> Option<(Self, Vec<String>)> {
        let Value::Object(user) = value else {
            return None;
        };
        let mut merged = merge_json(&defaults_json(), &Value::Object(user));
        let mut notes = Vec::new();
        repair_types(&mut merged, &mut notes);
        // Every leaf now matches its type and `serde(default)` fills the rest.
        let config = decode(merged, &mut notes);
        let (config, more) = config.sanitize();
        notes.extend(more);
        Some((config, notes))
    }

    /// Reset out-of-range values to their defaults.
    #[must_use]
    pub fn sanitize(mut self) -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        let defaults = Config::default();

        if !(self.capture.dpi_scale.is_finite() && self.capture.dpi_scale > 0.0) {
            notes.push(format!(
                "capture.dpi_scale {} is not a positive number, using {}",
                self.capture.dpi_scale, defaults.capture.dpi_scale
            ));
            self.capture.dpi_scale = defaults.capture.dpi_scale;
        }

        let vision = &mut self.vision;
        if vision.white_threshold > MAX_BRIGHTNESS {
            notes.push(format!(
                "vision.white_threshold {} exceeds {}, using {}",
                vision.white_threshold, MAX_BRIGHTNESS, defaults.vision.white_threshold
            ));
            vision.white_threshold = defaults.vision.white_threshold;
        }
        if vision.black_threshold > MAX_BRIGHTNESS {
            notes.push(format!(
                "vision.black_threshold {} exceeds {}, using {}",
                vision.black_threshold, MAX_BRIGHTNESS, defaults.vision.black_threshold
            ));
            vision.black_threshold = defaults.vision.black_threshold;
        }
        // Overlapping bands would let one pixel count as both line and bar.
        if vision.black_threshold > vision.white_threshold {
            notes.push(format!(
                "vision.black_threshold {} is above white_threshold {}, using {} and {}",
                vision.black_threshold,
                vision.white_threshold,
                defaults.vision.black_threshold,
                defaults.vision.white_threshold
            ));
            vision.white_threshold = defaults.vision.white_threshold;
            vision.black_threshold = defaults.vision.black_threshold;
        }
        if vision.min_blob_size < 1 {
            notes.push(format!(
                "vision.min_blob_size must be at least 1, using {}",
                defaults.vision.min_blob_size
            ));
            vision.min_blob_size = defaults.vision.min_blob_size;
        }
        let strip_ok = vision.strip_left.is_finite()
            && vision.strip_right.is_finite()
            && 0.0 <= vision.strip_left
            && vision.strip_left < vision.strip_right
            && vision.strip_right <= 1.0;
        if !strip_ok {
            notes.push(format!(
                "vision strip [{}, {}) is not inside [0, 1], using [{}, {})",
                vision.strip_left,
                vision.strip_right,
                defaults.vision.strip_left,
                defaults.vision.strip_right
            ));
            vision.strip_left = defaults.vision.strip_left;
            vision.strip_right = defaults.vision.strip_right;
        }

        let control = &mut self.control;
        if !LOOP_HZ_RANGE.contains(&control.loop_hz) {
            notes.push(format!(
                "control.loop_hz {} is outside {}..={}, using {}",
                control.loop_hz,
                LOOP_HZ_RANGE.start(),
                LOOP_HZ_RANGE.end(),
                defaults.control.loop_hz
            ));
            control.loop_hz = defaults.control.loop_hz;
        }
        if control.min_hold_us > control.max_hold_us {
            notes.push(format!(
                "control.min_hold_us {} exceeds max_hold_us {}, using {} and {}",
                control.min_hold_us,
                control.max_hold_us,
                defaults.control.min_hold_us,
                defaults.control.max_hold_us
            ));
            control.min_hold_us = defaults.control.min_hold_us;
            control.max_hold_us = defaults.control.max_hold_us;
        }
        if !(control.saturation_px.is_finite() && control.saturation_px > 0.0) {
            notes.push(format!(
                "control.saturation_px {} is not a positive number, using {}",
                control.saturation_px, defaults.control.saturation_px
            ));
            control.saturation_px = defaults.control.saturation_px;
        }

        (self, notes)
    }
}

/// Deserialize a merged, type-repaired value, falling back to defaults.
fn decode(merged: Value, notes: &mut Vec<String>) -> Config {
    match serde_json::from_value(merged) {
        Ok(config) => config,
        Err(e) => {
            notes.push(format!("config could not be decoded ({e}), using defaults"));
            Config::default()
        }
    }
}

/// Default configuration as JSON.
pub fn defaults_json() -> Value {
    serde_json::to_value(Config::default()).unwrap_or(Value::Null)
}

/// Recursively overlay `user` on `defaults`. User values win; nested
/// objects are merged key by key.
pub fn merge_json(defaults: &Value, user: &Value) -> Value {
    match (defaults, user) {
        (Value::Object(base), Value::Object(over)) => {
            let mut merged = base.clone();
            for (key, value) in over {
                let next = match base.get(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, over) => over.clone(),
    }
}

/// Drop values that do not deserialize as their field type.
fn repair_types(root: &mut Value, notes: &mut Vec<String>) {
    let Value::Object(sections) = root else {
        return;
    };
    let defaults = defaults_json();

    for name in ["capture", "vision", "control", "input", "safety", "debug"] {
        let section_ok = sections.get(name).is_some_and(Value::is_object);
        if !section_ok {
            notes.push(format!("section '{}' is not an object, using defaults", name));
            sections.insert(name.to_string(), defaults[name].clone());
        }
    }

    let section = |sections: &mut Map<String, Value>, name: &str| -> Map<String, Value> {
        match sections.remove(name) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    };

    let mut capture = section(sections, "capture");
    check::<Option<CaptureRegion>>(&mut capture, "capture", "region", notes);
    check::<usize>(&mut capture, "capture", "monitor_index", notes);
    check::<f64>(&mut capture, "capture", "dpi_scale", notes);
    sections.insert("capture".into(), Value::Object(capture));

    let mut vision = section(sections, "vision");
    check::<u16>(&mut vision, "vision", "white_threshold", notes);
    check::<u16>(&mut vision, "vision", "black_threshold", notes);
    check::<u32>(&mut vision, "vision", "min_blob_size", notes);
    check::<f64>(&mut vision, "vision", "strip_left", notes);
    check::<f64>(&mut vision, "vision", "strip_right", notes);
    sections.insert("vision".into(), Value::Object(vision));

    let mut control = section(sections, "control");
    check::<u32>(&mut control, "control", "tolerance_px", notes);
    check::<u64>(&mut control, "control", "min_flip_ms", notes);
    check::<u32>(&mut control, "control", "loop_hz", notes);
    check::<u64>(&mut control, "control", "min_hold_us", notes);
    check::<u64>(&mut control, "control", "max_hold_us", notes);
    check::<u64>(&mut control, "control", "cooldown_us", notes);
    check::<f64>(&mut control, "control", "saturation_px", notes);
    check::<u64>(&mut control, "control", "capture_backoff_ms", notes);
    sections.insert("control".into(), Value::Object(control));

    let mut input = section(sections, "input");
    check::<MouseButton>(&mut input, "input", "mouse_button", notes);
    sections.insert("input".into(), Value::Object(input));

    let mut safety = section(sections, "safety");
    check::<u64>(&mut safety, "safety", "max_run_seconds", notes);
    sections.insert("safety".into(), Value::Object(safety));

    let mut debug = section(sections, "debug");
    check::<bool>(&mut debug, "debug", "show_preview", notes);
    check::<bool>(&mut debug, "debug", "draw_overlay", notes);
    check::<LogLevel>(&mut debug, "debug", "log_level", notes);
    check::<u64>(&mut debug, "debug", "preview_interval_ms", notes);
    sections.insert("debug".into(), Value::Object(debug));
}

fn check<T: DeserializeOwned>(
    section: &mut Map<String, Value>,
    section_name: &str,
    key: &str,
    notes: &mut Vec<String>,
) {
    let Some(value) = section.get(key) else {
        return;
    };
    if let Err(e) = serde_json::from_value::<T>(value.clone()) {
        notes.push(format!(
            "{}.{} = {} is invalid ({}), using default",
            section_name, key, value, e
        ));
        section.remove(key);
    }
}
