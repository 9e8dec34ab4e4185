//! Acquisition held entirely in memory

use super::reader::AcquisitionReader;
use super::types::{
    AcquisitionError, ImageDims, ImageInfo, IndexAxis, IndexOutOfRange, Plane, PlaneIndex,
};

/// One image of an in-memory acquisition
///
/// Planes are stored `[time][channel][z]`, i.e. plane `(c, t, z)` lives at
/// `(t * channels + c) * nz + z`.
#[derive(Debug, Clone)]
pub struct InMemoryImage {
    name: String,
    dims: ImageDims,
    bit_depth: u8,
    planes: Vec<Plane>,
}

impl InMemoryImage {
    /// Build an image from planes ordered `[time][channel][z]`
    pub fn from_planes(
        name: impl Into<String>,
        channels: usize,
        times: usize,
        planes: Vec<Plane>,
    ) -> Result<Self, AcquisitionError> {
        let name = name.into();
        let per_stack = channels * times;
        if per_stack == 0 || planes.is_empty() || planes.len() % per_stack != 0 {
            return Err(AcquisitionError::Format(format!(
                "{}: {} planes cannot be split into {} channels x {} time points",
                name,
                planes.len(),
                channels,
                times
            )));
        }

        let (rows, cols) = planes[0].shape();
        let sample_type = planes[0].sample_type();
        if let Some(odd) = planes
            .iter()
            .find(|p| p.shape() != (rows, cols) || p.sample_type() != sample_type)
        {
            return Err(AcquisitionError::Format(format!(
                "{}: mixed planes ({} {:?} vs {} {:?})",
                name,
                sample_type,
                (rows, cols),
                odd.sample_type(),
                odd.shape()
            )));
        }

        let dims = ImageDims {
            x: cols,
            y: rows,
            z: planes.len() / per_stack,
            c: channels,
            t: times,
            m: 1,
        };

        Ok(Self {
            name,
            dims,
            bit_depth: planes[0].bit_depth(),
            planes,
        })
    }

    /// Single-channel, single-time-point Z-stack
    pub fn from_stack(name: impl Into<String>, slices: Vec<Plane>) -> Result<Self, AcquisitionError> {
        Self::from_planes(name, 1, 1, slices)
    }

    /// Mark the image as a mosaic; the stored planes stand for tile 0
    pub fn with_tiles(mut self, tiles: usize) -> Self {
        self.dims.m = tiles.max(1);
        self
    }

    pub fn dims(&self) -> ImageDims {
        self.dims
    }
}

/// Reader over images held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryAcquisition {
    images: Vec<InMemoryImage>,
}

impl InMemoryAcquisition {
    pub fn new(images: Vec<InMemoryImage>) -> Self {
        Self { images }
    }

    pub fn push(&mut self, image: InMemoryImage) {
        self.images.push(image);
    }

    fn image(&self, index: usize) -> Result<&InMemoryImage, AcquisitionError> {
        self.images.get(index).ok_or(AcquisitionError::OutOfRange(IndexOutOfRange {
            axis: IndexAxis::Image,
            value: index,
            limit: self.images.len(),
        }))
    }
}

impl AcquisitionReader for InMemoryAcquisition {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn image_info(&self, index: usize) -> Result<ImageInfo, AcquisitionError> {
        let image = self.image(index)?;
        Ok(ImageInfo {
            index,
            name: image.name.clone(),
            dims: image.dims,
            bit_depth: image.bit_depth,
        })
    }

    fn read_plane(&self, index: PlaneIndex) -> Result<Plane, AcquisitionError> {
        let image = self.image(index.image)?;
        index
            .check_within(&image.dims)
            .map_err(AcquisitionError::OutOfRange)?;

        let dims = image.dims;
        let offset = (index.time * dims.c + index.channel) * dims.z + index.z;
        Ok(image.planes[offset].clone())
    }
}
