//! Acquisition-related types and error definitions

use std::fmt;
use std::path::PathBuf;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis of a multi-dimensional acquisition index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAxis {
    Image,
    Channel,
    Time,
    Z,
}

impl fmt::Display for IndexAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexAxis::Image => write!(f, "image"),
            IndexAxis::Channel => write!(f, "channel"),
            IndexAxis::Time => write!(f, "time"),
            IndexAxis::Z => write!(f, "z"),
        }
    }
}

/// An index that fell outside `0..limit` on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexOutOfRange {
    pub axis: IndexAxis,
    pub value: usize,
    /// Exclusive upper bound
    pub limit: usize,
}

impl fmt::Display for IndexOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} index {} out of range (valid: 0..{})",
            self.axis, self.value, self.limit
        )
    }
}

impl IndexOutOfRange {
    /// Check `value < limit`, reporting the axis on failure
    pub fn check(axis: IndexAxis, value: usize, limit: usize) -> Result<(), IndexOutOfRange> {
        if value < limit {
            Ok(())
        } else {
            Err(IndexOutOfRange { axis, value, limit })
        }
    }
}

/// Errors that can occur when reading an acquisition
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Acquisition not found: {0:?}")]
    NotFound(PathBuf),

    #[error("{0}")]
    OutOfRange(IndexOutOfRange),

    #[error("Unsupported or malformed acquisition: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Dimensions of one image inside an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDims {
    /// Width in pixels
    pub x: usize,
    /// Height in pixels
    pub y: usize,
    /// Z-slices
    pub z: usize,
    /// Channels
    pub c: usize,
    /// Time points
    pub t: usize,
    /// Mosaic tiles
    pub m: usize,
}

impl ImageDims {
    /// Plane shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.y, self.x)
    }

    pub fn is_mosaic(&self) -> bool {
        self.m > 1
    }
}

/// Per-image metadata reported by a reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub index: usize,
    pub name: String,
    pub dims: ImageDims,
    pub bit_depth: u8,
}

/// Location of a single 2D plane. Mosaic images always read tile 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneIndex {
    pub image: usize,
    pub channel: usize,
    pub time: usize,
    pub z: usize,
}

impl PlaneIndex {
    /// Validate channel, time and z against an image's dimensions
    pub fn check_within(&self, dims: &ImageDims) -> Result<(), IndexOutOfRange> {
        IndexOutOfRange::check(IndexAxis::Channel, self.channel, dims.c)?;
        IndexOutOfRange::check(IndexAxis::Time, self.time, dims.t)?;
        IndexOutOfRange::check(IndexAxis::Z, self.z, dims.z)
    }
}

/// Numeric sample type a plane can carry
pub trait Sample: Copy + PartialOrd + Send + Sync + 'static {
    /// Identity element for a running maximum
    const LOWEST: Self;

    fn to_f64(self) -> f64;
}

impl Sample for u8 {
    const LOWEST: Self = u8::MIN;

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for u16 {
    const LOWEST: Self = u16::MIN;

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for f32 {
    const LOWEST: Self = f32::NEG_INFINITY;

    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// A 2D intensity array in the sample type the source delivered
#[derive(Debug, Clone, PartialEq)]
pub enum Plane {
    U8(Array2<u8>),
    U16(Array2<u16>),
    F32(Array2<f32>),
}

impl Plane {
    /// Shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Plane::U8(a) => a.dim(),
            Plane::U16(a) => a.dim(),
            Plane::F32(a) => a.dim(),
        }
    }

    pub fn sample_type(&self) -> &'static str {
        match self {
            Plane::U8(_) => "u8",
            Plane::U16(_) => "u16",
            Plane::F32(_) => "f32",
        }
    }

    pub fn bit_depth(&self) -> u8 {
        match self {
            Plane::U8(_) => 8,
            Plane::U16(_) => 16,
            Plane::F32(_) => 32,
        }
    }

    /// Widen every sample to f64
    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            Plane::U8(a) => widen(a.view()),
            Plane::U16(a) => widen(a.view()),
            Plane::F32(a) => widen(a.view()),
        }
    }

    /// Minimum and maximum intensity, or `None` for an empty plane
    pub fn min_max(&self) -> Option<(f64, f64)> {
        match self {
            Plane::U8(a) => min_max(a.view()),
            Plane::U16(a) => min_max(a.view()),
            Plane::F32(a) => min_max(a.view()),
        }
    }
}

fn widen<T: Sample>(a: ArrayView2<'_, T>) -> Array2<f64> {
    a.mapv(|v| v.to_f64())
}

fn min_max<T: Sample>(a: ArrayView2<'_, T>) -> Option<(f64, f64)> {
    let mut iter = a.iter().copied();
    let first = iter.next()?;
    let (lo, hi) = iter.fold((first, first), |(lo, hi), v| {
        (if v < lo { v } else { lo }, if v > hi { v } else { hi })
    });
    Some((lo.to_f64(), hi.to_f64()))
}
