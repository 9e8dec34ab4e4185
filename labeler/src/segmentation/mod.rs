//! Segmentation module for the initial-guess foreground mask
//!
//! This module provides:
//! - `initial_guess` / `SegmentationEngine` for the single-object starting mask
//! - `distance_to_foreground` exact Euclidean distance transform
//! - `label_components` and `fill_holes` morphology helpers

mod components;
mod distance;
mod engine;
mod types;

pub use components::{fill_holes, label_components};
pub use distance::distance_to_foreground;
pub use engine::{SegmentationEngine, initial_guess};
pub use types::{
    DEFAULT_MAX_GAP, DEFAULT_THRESHOLD, Mask, RegionSizeMetric, SegmentationError,
    SegmentationOptions,
};
