//! Projection-related types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::acquisition::{AcquisitionError, ImageDims, IndexOutOfRange, Plane};

use super::engine::ProjectionEngine;

/// Errors that can occur while projecting a Z-stack
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("{0}")]
    OutOfRange(IndexOutOfRange),

    #[error("Processing of mosaic image {image_index} cancelled")]
    Cancelled { image_index: usize },

    #[error("Image {image_index} has no Z-slices")]
    EmptyStack { image_index: usize },

    #[error(transparent)]
    Acquisition(AcquisitionError),
}

impl From<AcquisitionError> for ProjectionError {
    fn from(e: AcquisitionError) -> Self {
        match e {
            AcquisitionError::OutOfRange(range) => ProjectionError::OutOfRange(range),
            other => ProjectionError::Acquisition(other),
        }
    }
}

impl From<IndexOutOfRange> for ProjectionError {
    fn from(range: IndexOutOfRange) -> Self {
        ProjectionError::OutOfRange(range)
    }
}

/// What to do when the selected image is a mosaic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MosaicPolicy {
    /// Stop and ask the caller before reading any slices
    #[default]
    Ask,
    /// Process tile 0 without asking
    Proceed,
}

/// Selection of the stack to project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionRequest {
    pub image_index: usize,
    pub channel: usize,
    pub time: usize,
    pub mosaic: MosaicPolicy,
}

impl ProjectionRequest {
    /// Channel 0, time point 0, ask on mosaics
    pub fn new(image_index: usize) -> Self {
        Self {
            image_index,
            channel: 0,
            time: 0,
            mosaic: MosaicPolicy::Ask,
        }
    }

    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_time(mut self, time: usize) -> Self {
        self.time = time;
        self
    }

    pub fn with_mosaic(mut self, mosaic: MosaicPolicy) -> Self {
        self.mosaic = mosaic;
        self
    }
}

/// Another image that looks like the pre-merged version of a mosaic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedCandidate {
    pub index: usize,
    pub name: String,
}

/// Advisory details about a mosaic selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicWarning {
    pub image_index: usize,
    pub name: String,
    pub tiles: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    pub merged_candidates: Vec<MergedCandidate>,
}

/// Description of a finished projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMetadata {
    pub name: String,
    pub num_slices: usize,
    pub channel: usize,
    pub time: usize,
    pub dims: ImageDims,
    /// `(height, width)` of the projected array
    pub shape: (usize, usize),
    pub intensity_min: f64,
    pub intensity_max: f64,
    pub middle_slice_index: usize,
    pub is_mosaic: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_candidates: Vec<MergedCandidate>,
}

/// Maximum-intensity projection plus the representative middle slice
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub max_projection: Plane,
    pub middle_slice: Plane,
    pub metadata: ProjectionMetadata,
}

/// Result of a projection attempt
#[derive(Debug)]
pub enum ProjectionOutcome {
    Complete(Projection),
    /// The image is a mosaic; nothing was read yet
    NeedsConfirmation(PendingProjection),
}

impl ProjectionOutcome {
    /// The projection, if no confirmation was needed
    pub fn complete(self) -> Option<Projection> {
        match self {
            ProjectionOutcome::Complete(projection) => Some(projection),
            ProjectionOutcome::NeedsConfirmation(_) => None,
        }
    }
}

/// A mosaic projection suspended until the caller answers yes or no
#[derive(Debug)]
pub struct PendingProjection {
    pub(crate) request: ProjectionRequest,
    pub(crate) warning: MosaicWarning,
}

impl PendingProjection {
    pub fn warning(&self) -> &MosaicWarning {
        &self.warning
    }

    pub fn request(&self) -> &ProjectionRequest {
        &self.request
    }

    /// Continue with tile 0 if `confirmed`, otherwise fail with `Cancelled`
    pub fn resolve(
        self,
        engine: &ProjectionEngine<'_>,
        confirmed: bool,
    ) -> Result<Projection, ProjectionError> {
        if !confirmed {
            info!(
                "Mosaic image {} declined; nothing processed",
                self.request.image_index
            );
            return Err(ProjectionError::Cancelled {
                image_index: self.request.image_index,
            });
        }

        let info = engine.validate(&self.request)?;
        engine.run(&info, &self.request)
    }
}
