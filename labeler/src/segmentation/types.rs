//! Segmentation types and error definitions

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intensity used when no threshold is supplied
pub const DEFAULT_THRESHOLD: f64 = 200.0;

/// Default gap (in pixels) bridged between foreground blobs
pub const DEFAULT_MAX_GAP: usize = 2;

/// Boolean foreground mask, same shape as the image it came from
pub type Mask = Array2<bool>;

/// Errors that can occur during segmentation
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("No regions found above threshold {threshold}")]
    NoRegionsFound { threshold: f64 },
}

/// How a candidate region's size is measured when picking the largest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSizeMetric {
    /// Count strict-threshold pixels inside each gap-tolerant region
    #[default]
    StrictCore,
    /// Count every pixel of the gap-tolerant region
    Grown,
}

/// Tunables for the initial guess
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationOptions {
    /// Intensity threshold; `None` means `DEFAULT_THRESHOLD`
    pub threshold: Option<f64>,
    /// Largest gap in pixels still merged into one region
    pub max_gap: usize,
    #[serde(default)]
    pub region_size: RegionSizeMetric,
}

impl Default for SegmentationOptions {
    fn default() -> Self {
        Self {
            threshold: None,
            max_gap: DEFAULT_MAX_GAP,
            region_size: RegionSizeMetric::StrictCore,
        }
    }
}
