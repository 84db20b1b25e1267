//! Core types and logic for barline.
//!
//! barline keeps a dark bar aligned with a bright reference line in a
//! timing minigame by watching a small screen region and pressing or
//! releasing a mouse button. This crate holds everything that does not
//! touch the OS: detection, the control policy, configuration and the
//! seams the runner plugs real devices into.
//!
//! # Modules
//!
//! - [`region`]: validated capture rectangles
//! - [`frame`]: BGRA frames and the [`frame::FrameSource`] seam
//! - [`detect`]: reference line / bar detection
//! - [`policy`]: hold/release decisions
//! - [`input`]: the [`input::InputDevice`] seam
//! - [`status`]: per-tick updates, observers and tracking status
//! - [`config`]: typed configuration with defaults and repair
//! - [`error`]: error types with operator suggestions
//!
//! # Control loop
//!
//! | Step | Component | Stateful |
//! |------|-----------|----------|
//! | capture | `FrameSource` | no |
//! | detect | `FeatureDetector` | no |
//! | decide | `ActuationPolicy` | last action time |
//! | act | `InputDevice` | button state |
//! | publish | `Observer` | no |

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod input;
pub mod policy;
pub mod region;
pub mod status;
