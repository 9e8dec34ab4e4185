//! Initial-guess segmentation
//!
//! threshold -> gap-tolerant growth -> connected components ->
//! largest region -> hole filling

use ndarray::{ArrayView2, Zip};
use tracing::debug;

use super::components::{fill_holes, label_components};
use super::distance::distance_to_foreground;
use super::types::{
    DEFAULT_THRESHOLD, Mask, RegionSizeMetric, SegmentationError, SegmentationOptions,
};

/// Produces the single-object starting mask a user then corrects
#[derive(Debug, Clone, Default)]
pub struct SegmentationEngine {
    options: SegmentationOptions,
}

impl SegmentationEngine {
    pub fn new(options: SegmentationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SegmentationOptions {
        &self.options
    }

    /// Boolean mask of the most likely foreground object, same shape as `image`
    pub fn run(&self, image: ArrayView2<'_, f64>) -> Result<Mask, SegmentationError> {
        let threshold = self.select_threshold(image);

        let binary = image.mapv(|v| v > threshold);

        // Background pixels within max_gap of the foreground join it
        let max_gap = self.options.max_gap as f64;
        let tolerant = distance_to_foreground(binary.view()).mapv(|d| d <= max_gap);

        let (labels, count) = label_components(tolerant.view());
        if count == 0 {
            return Err(SegmentationError::NoRegionsFound { threshold });
        }

        let mut sizes = vec![0usize; count + 1];
        match self.options.region_size {
            RegionSizeMetric::StrictCore => {
                Zip::from(&labels).and(&binary).for_each(|&label, &strict| {
                    if strict {
                        sizes[label as usize] += 1;
                    }
                });
            }
            RegionSizeMetric::Grown => {
                for &label in labels.iter() {
                    sizes[label as usize] += 1;
                }
            }
        }

        // Lowest id wins ties
        let mut largest = 1;
        for id in 2..=count {
            if sizes[id] > sizes[largest] {
                largest = id;
            }
        }
        debug!(
            "Segmentation: threshold={}, max_gap={}, {} regions, picked {} ({} px by {:?})",
            threshold, self.options.max_gap, count, largest, sizes[largest], self.options.region_size
        );

        // The whole tolerant region of the winner, not only its strict pixels
        let largest = largest as u32;
        let mask = labels.mapv(|label| label == largest);

        Ok(fill_holes(mask.view()))
    }

    fn select_threshold(&self, image: ArrayView2<'_, f64>) -> f64 {
        if let Some(threshold) = self.options.threshold {
            return threshold;
        }

        // The mean-based candidate is computed and logged but never used
        let mean_candidate = image.mean().unwrap_or(0.0);
        debug!(
            "Mean-based threshold candidate {} ignored, using {}",
            mean_candidate, DEFAULT_THRESHOLD
        );
        DEFAULT_THRESHOLD
    }
}

/// Initial guess with the default region-size metric
pub fn initial_guess(
    image: ArrayView2<'_, f64>,
    threshold: Option<f64>,
    max_gap: usize,
) -> Result<Mask, SegmentationError> {
    SegmentationEngine::new(SegmentationOptions {
        threshold,
        max_gap,
        region_size: RegionSizeMetric::StrictCore,
    })
    .run(image)
}
