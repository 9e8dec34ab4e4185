//! Acquisition module for reading multi-dimensional microscopy containers
//!
//! This module provides:
//! - `AcquisitionReader` trait for abstracting container formats
//! - `InMemoryAcquisition` for planes already held in memory
//! - `TiffAcquisition` for multi-page TIFF hyperstacks
//! - `describe` for the info-only listing of a container
//! - `AcquisitionCatalog` for finding acquisitions in the image folder

mod catalog;
mod memory;
mod reader;
mod tiff_stack;
mod types;

pub use catalog::{AcquisitionCatalog, AcquisitionEntry};
pub use memory::{InMemoryAcquisition, InMemoryImage};
pub use reader::{AcquisitionReader, ImageSummary, describe};
pub use tiff_stack::{TIFF_EXTENSIONS, TiffAcquisition};
pub use types::{
    AcquisitionError, ImageDims, ImageInfo, IndexAxis, IndexOutOfRange, Plane, PlaneIndex, Sample,
};
