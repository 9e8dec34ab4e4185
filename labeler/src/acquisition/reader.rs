//! AcquisitionReader trait definition and the info-only listing

use serde::Serialize;
use tracing::{info, warn};

use super::types::{AcquisitionError, ImageInfo, Plane, PlaneIndex};

/// Trait for multi-image microscopy containers (in-memory, TIFF hyperstacks, ...)
pub trait AcquisitionReader: Send + Sync {
    /// Number of images in the container
    fn image_count(&self) -> usize;

    /// Metadata for one image
    fn image_info(&self, index: usize) -> Result<ImageInfo, AcquisitionError>;

    /// Read a single 2D plane from tile 0 of the addressed image
    fn read_plane(&self, index: PlaneIndex) -> Result<Plane, AcquisitionError>;

    /// Metadata for every image, in container order
    fn images(&self) -> Result<Vec<ImageInfo>, AcquisitionError> {
        (0..self.image_count()).map(|i| self.image_info(i)).collect()
    }
}

/// One line of the info-only listing
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    #[serde(flatten)]
    pub info: ImageInfo,
    pub is_mosaic: bool,
    /// Index of the following image when its name suggests a merged mosaic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_hint: Option<usize>,
}

/// List every image in an acquisition, flagging mosaics
pub fn describe(reader: &dyn AcquisitionReader) -> Result<Vec<ImageSummary>, AcquisitionError> {
    let images = reader.images()?;
    info!("Acquisition holds {} images", images.len());

    let summaries: Vec<ImageSummary> = images
        .iter()
        .map(|image| {
            let is_mosaic = image.dims.is_mosaic();
            let merged_hint = if is_mosaic {
                images
                    .get(image.index + 1)
                    .filter(|next| next.name.contains("Merged"))
                    .map(|next| next.index)
            } else {
                None
            };

            info!(
                "Image {}: name={:?}, dims={:?}, bit_depth={}",
                image.index, image.name, image.dims, image.bit_depth
            );
            if is_mosaic {
                warn!(
                    "Image {} is a mosaic with {} tiles; only tile 0 is processed",
                    image.index, image.dims.m
                );
                if let Some(next) = merged_hint {
                    info!("Image {} appears to be the merged version", next);
                }
            }

            ImageSummary {
                info: image.clone(),
                is_mosaic,
                merged_hint,
            }
        })
        .collect();

    Ok(summaries)
}
