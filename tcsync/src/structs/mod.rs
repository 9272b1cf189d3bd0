//! Data structures shared across encoding, decoding and correlation.
//!
//! Contains the timecode format and unit grid, the frequency plan, encoded
//! units, detections, phase classifications and the calibration cycle layout.

pub mod detection;
pub mod format;
pub mod frequency;
pub mod layout;
pub mod unit;
pub mod window;
