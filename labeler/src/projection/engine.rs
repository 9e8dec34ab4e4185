//! Maximum-intensity projection of one (image, channel, time) selection

use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::acquisition::{AcquisitionReader, ImageInfo, IndexAxis, IndexOutOfRange, PlaneIndex};

use super::stack::ZStack;
use super::types::{
    MergedCandidate, MosaicPolicy, MosaicWarning, PendingProjection, Projection,
    ProjectionError, ProjectionMetadata, ProjectionOutcome, ProjectionRequest,
};

/// Slices between progress log lines
const PROGRESS_EVERY: usize = 10;

/// Reduces a Z-stack from an acquisition to a single 2D array
pub struct ProjectionEngine<'a> {
    reader: &'a dyn AcquisitionReader,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(reader: &'a dyn AcquisitionReader) -> Self {
        Self { reader }
    }

    /// Project the requested stack, or suspend if the image is a mosaic and
    /// the request does not allow proceeding
    pub fn project(&self, request: &ProjectionRequest) -> Result<ProjectionOutcome, ProjectionError> {
        let info = self.validate(request)?;

        if info.dims.is_mosaic() {
            let warning = self.mosaic_warning(&info)?;
            warn!(
                "Image {} ({:?}) is a mosaic with {} tiles of {}x{}; only tile 0 will be processed",
                warning.image_index, warning.name, warning.tiles, warning.tile_width, warning.tile_height
            );
            for candidate in &warning.merged_candidates {
                info!(
                    "Image {} ({:?}) appears to be the merged version",
                    candidate.index, candidate.name
                );
            }

            match request.mosaic {
                MosaicPolicy::Ask => {
                    return Ok(ProjectionOutcome::NeedsConfirmation(PendingProjection {
                        request: request.clone(),
                        warning,
                    }));
                }
                MosaicPolicy::Proceed => {
                    info!("Mosaic confirmation skipped; processing tile 0 as-is");
                }
            }
        }

        self.run(&info, request).map(ProjectionOutcome::Complete)
    }

    /// Project, answering any mosaic confirmation synchronously with `confirm`
    pub fn project_with<F>(
        &self,
        request: &ProjectionRequest,
        confirm: F,
    ) -> Result<Projection, ProjectionError>
    where
        F: FnOnce(&MosaicWarning) -> bool,
    {
        match self.project(request)? {
            ProjectionOutcome::Complete(projection) => Ok(projection),
            ProjectionOutcome::NeedsConfirmation(pending) => {
                let confirmed = confirm(pending.warning());
                pending.resolve(self, confirmed)
            }
        }
    }

    /// Check image, channel and time bounds before anything is read
    pub(crate) fn validate(&self, request: &ProjectionRequest) -> Result<ImageInfo, ProjectionError> {
        IndexOutOfRange::check(
            IndexAxis::Image,
            request.image_index,
            self.reader.image_count(),
        )?;
        let info = self.reader.image_info(request.image_index)?;
        IndexOutOfRange::check(IndexAxis::Channel, request.channel, info.dims.c)?;
        IndexOutOfRange::check(IndexAxis::Time, request.time, info.dims.t)?;
        Ok(info)
    }

    fn mosaic_warning(&self, info: &ImageInfo) -> Result<MosaicWarning, ProjectionError> {
        let images = self.reader.images()?;
        Ok(MosaicWarning {
            image_index: info.index,
            name: info.name.clone(),
            tiles: info.dims.m,
            tile_width: info.dims.x,
            tile_height: info.dims.y,
            merged_candidates: find_merged_candidates(&images, info.index),
        })
    }

    /// Load every slice, then take the per-pixel maximum over z
    pub(crate) fn run(
        &self,
        info: &ImageInfo,
        request: &ProjectionRequest,
    ) -> Result<Projection, ProjectionError> {
        let start = Instant::now();
        let nz = info.dims.z;
        if nz == 0 {
            return Err(ProjectionError::EmptyStack {
                image_index: info.index,
            });
        }

        info!(
            "Processing image {:?}: channel={}, time={}, z-slices={}",
            info.name, request.channel, request.time, nz
        );
        if info.dims.is_mosaic() {
            info!("Mosaic tiles: {} (processing first tile only)", info.dims.m);
        }

        let mut planes = Vec::with_capacity(nz);
        for z in 0..nz {
            planes.push(self.reader.read_plane(PlaneIndex {
                image: info.index,
                channel: request.channel,
                time: request.time,
                z,
            })?);

            if nz > PROGRESS_EVERY && (z + 1) % PROGRESS_EVERY == 0 {
                debug!("Progress: {}/{} slices loaded", z + 1, nz);
            }
        }
        debug!("Complete: {}/{} slices loaded", nz, nz);

        let stack = ZStack::from_planes(planes)?;
        let max_projection = stack.max_projection()?;
        let middle_slice_index = nz / 2;
        let middle_slice = stack.slice(middle_slice_index).ok_or(ProjectionError::EmptyStack {
            image_index: info.index,
        })?;

        let shape = max_projection.shape();
        let (intensity_min, intensity_max) = max_projection.min_max().unwrap_or((0.0, 0.0));
        let merged_candidates = if info.dims.is_mosaic() {
            find_merged_candidates(&self.reader.images()?, info.index)
        } else {
            Vec::new()
        };

        let metadata = ProjectionMetadata {
            name: info.name.clone(),
            num_slices: nz,
            channel: request.channel,
            time: request.time,
            dims: info.dims,
            shape,
            intensity_min,
            intensity_max,
            middle_slice_index,
            is_mosaic: info.dims.is_mosaic(),
            merged_candidates,
        };

        info!(
            "Projection of {:?}: shape={:?}, intensity range {} to {}",
            metadata.name, shape, intensity_min, intensity_max
        );
        counter!("labeler_projections_total").increment(1);
        histogram!("labeler_projection_duration_seconds").record(start.elapsed());

        Ok(Projection {
            max_projection,
            middle_slice,
            metadata,
        })
    }
}

/// Images whose names suggest a pre-merged version of image `index`
///
/// A candidate's name contains "Merged", and with any "_Merged" removed one
/// of the two names is a substring of the other.
pub fn find_merged_candidates(images: &[ImageInfo], index: usize) -> Vec<MergedCandidate> {
    let Some(target) = images.iter().find(|i| i.index == index) else {
        return Vec::new();
    };
    let target_base = target.name.replace("_Merged", "");

    images
        .iter()
        .filter(|other| other.index != index && other.name.contains("Merged"))
        .filter(|other| {
            let other_base = other.name.replace("_Merged", "");
            other.name.contains(&target_base) || target.name.contains(&other_base)
        })
        .map(|other| MergedCandidate {
            index: other.index,
            name: other.name.clone(),
        })
        .collect()
}
