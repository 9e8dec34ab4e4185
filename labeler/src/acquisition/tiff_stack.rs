//! Multi-page TIFF acquisitions (ImageJ hyperstack layout)

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, info};

use super::reader::AcquisitionReader;
use super::types::{
    AcquisitionError, ImageDims, ImageInfo, IndexAxis, IndexOutOfRange, Plane, PlaneIndex,
};

/// Supported acquisition file extensions
pub const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Reader over one TIFF file or a directory of TIFF files
///
/// Each file is one image. Pages are ordered tile-major, then time, then z,
/// then channel, so page `((m * T + t) * Z + z) * C + c` holds plane
/// `(c, t, z)` of tile `m`.
#[derive(Debug, Clone)]
pub struct TiffAcquisition {
    images: Vec<TiffImage>,
}

#[derive(Debug, Clone)]
struct TiffImage {
    path: PathBuf,
    info: ImageInfo,
}

impl TiffAcquisition {
    /// Open a single TIFF file or every TIFF file in a directory
    pub fn open(path: &Path) -> Result<Self, AcquisitionError> {
        if !path.exists() {
            return Err(AcquisitionError::NotFound(path.to_path_buf()));
        }

        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && is_tiff(p))
                .collect();
            files.sort();
            if files.is_empty() {
                return Err(AcquisitionError::Format(format!(
                    "no TIFF files in {:?}",
                    path
                )));
            }
            files
        } else {
            vec![path.to_path_buf()]
        };

        let images = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| probe(index, file))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Opened TIFF acquisition {:?} with {} images", path, images.len());
        Ok(Self { images })
    }

    /// File backing image `index`
    pub fn image_path(&self, index: usize) -> Result<&Path, AcquisitionError> {
        Ok(&self.image(index)?.path)
    }

    fn image(&self, index: usize) -> Result<&TiffImage, AcquisitionError> {
        self.images.get(index).ok_or(AcquisitionError::OutOfRange(IndexOutOfRange {
            axis: IndexAxis::Image,
            value: index,
            limit: self.images.len(),
        }))
    }
}

impl AcquisitionReader for TiffAcquisition {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn image_info(&self, index: usize) -> Result<ImageInfo, AcquisitionError> {
        Ok(self.image(index)?.info.clone())
    }

    fn read_plane(&self, index: PlaneIndex) -> Result<Plane, AcquisitionError> {
        let image = self.image(index.image)?;
        let dims = image.info.dims;
        index
            .check_within(&dims)
            .map_err(AcquisitionError::OutOfRange)?;

        let page = (index.time * dims.z + index.z) * dims.c + index.channel;
        let mut decoder = open_decoder(&image.path)?;
        for _ in 0..page {
            decoder.next_image().map_err(|e| tiff_error(&image.path, e))?;
        }

        let (width, height) = decoder.dimensions().map_err(|e| tiff_error(&image.path, e))?;
        if (width as usize, height as usize) != (dims.x, dims.y) {
            return Err(AcquisitionError::Format(format!(
                "{:?}: page {} is {}x{}, expected {}x{}",
                image.path, page, width, height, dims.x, dims.y
            )));
        }

        let shape = (dims.y, dims.x);
        let data = decoder.read_image().map_err(|e| tiff_error(&image.path, e))?;
        let plane = match data {
            DecodingResult::U8(buf) => Array2::from_shape_vec(shape, buf).map(Plane::U8),
            DecodingResult::U16(buf) => Array2::from_shape_vec(shape, buf).map(Plane::U16),
            DecodingResult::F32(buf) => Array2::from_shape_vec(shape, buf).map(Plane::F32),
            _ => {
                return Err(AcquisitionError::Format(format!(
                    "{:?}: unsupported sample type on page {}",
                    image.path, page
                )));
            }
        }
        .map_err(|e| AcquisitionError::Format(format!("{:?}: {}", image.path, e)))?;

        debug!("Read {:?} page {} ({:?})", image.path, page, index);
        Ok(plane)
    }
}

pub(crate) fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TIFF_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, AcquisitionError> {
    let file = File::open(path)?;
    Decoder::new(BufReader::new(file)).map_err(|e| tiff_error(path, e))
}

fn tiff_error(path: &Path, e: tiff::TiffError) -> AcquisitionError {
    AcquisitionError::Format(format!("{:?}: {}", path, e))
}

/// Read dimensions and layout of one TIFF file without decoding pixel data
fn probe(index: usize, path: PathBuf) -> Result<TiffImage, AcquisitionError> {
    let mut decoder = open_decoder(&path)?;

    let (width, height) = decoder.dimensions().map_err(|e| tiff_error(&path, e))?;
    let bit_depth = match decoder.colortype().map_err(|e| tiff_error(&path, e))? {
        ColorType::Gray(bits) => bits,
        other => {
            return Err(AcquisitionError::Format(format!(
                "{:?}: expected grayscale pages, found {:?}",
                path, other
            )));
        }
    };
    let description = decoder.get_tag_ascii_string(Tag::ImageDescription).ok();

    let mut pages = 1usize;
    while decoder.more_images() {
        decoder.next_image().map_err(|e| tiff_error(&path, e))?;
        pages += 1;
    }

    let layout = description
        .as_deref()
        .map(HyperstackLayout::parse)
        .unwrap_or_default();
    let dims = layout
        .dims(width as usize, height as usize, pages)
        .ok_or_else(|| {
            AcquisitionError::Format(format!(
                "{:?}: layout {:?} overflows the page count",
                path, layout
            ))
        })?;
    let required = page_count(&dims);
    if dims.z == 0 || required.is_none_or(|required| pages < required) {
        return Err(AcquisitionError::Format(format!(
            "{:?}: {} pages do not fit layout c={}, z={}, t={}, tiles={}",
            path, pages, dims.c, dims.z, dims.t, dims.m
        )));
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("image_{}", index));

    debug!("Probed {:?}: {:?}, {} pages", path, dims, pages);
    Ok(TiffImage {
        path,
        info: ImageInfo {
            index,
            name,
            dims,
            bit_depth,
        },
    })
}

/// Hyperstack counts read from an ImageJ-style description
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HyperstackLayout {
    channels: Option<usize>,
    slices: Option<usize>,
    frames: Option<usize>,
    tiles: Option<usize>,
}

impl HyperstackLayout {
    fn parse(description: &str) -> Self {
        let mut layout = Self::default();
        for line in description.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().parse().ok();
            match key.trim() {
                "channels" => layout.channels = value,
                "slices" => layout.slices = value,
                "frames" => layout.frames = value,
                "tiles" => layout.tiles = value,
                _ => {}
            }
        }
        layout
    }

    /// Without explicit slice count every remaining page is a Z-slice
    ///
    /// `None` when the non-Z counts overflow.
    fn dims(&self, x: usize, y: usize, pages: usize) -> Option<ImageDims> {
        let c = self.channels.unwrap_or(1).max(1);
        let t = self.frames.unwrap_or(1).max(1);
        let m = self.tiles.unwrap_or(1).max(1);
        let per_slice = c.checked_mul(t)?.checked_mul(m)?;
        let z = self.slices.unwrap_or(pages / per_slice);
        Some(ImageDims { x, y, z, c, t, m })
    }
}

/// Pages a layout occupies, `None` on overflow
fn page_count(dims: &ImageDims) -> Option<usize> {
    dims.c
        .checked_mul(dims.z)?
        .checked_mul(dims.t)?
        .checked_mul(dims.m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imagej_description() {
        let layout = HyperstackLayout::parse(
            "ImageJ=1.54f\nimages=24\nchannels=2\nslices=4\nframes=3\nhyperstack=true\n",
        );
        assert_eq!(layout.channels, Some(2));
        assert_eq!(layout.slices, Some(4));
        assert_eq!(layout.frames, Some(3));
        assert_eq!(layout.tiles, None);

        let dims = layout.dims(10, 8, 24).unwrap();
        assert_eq!((dims.c, dims.z, dims.t, dims.m), (2, 4, 3, 1));
        assert_eq!(dims.shape(), (8, 10));
    }

    #[test]
    fn test_plain_stack_uses_all_pages_as_slices() {
        let dims = HyperstackLayout::default().dims(5, 5, 7).unwrap();
        assert_eq!((dims.c, dims.z, dims.t, dims.m), (1, 7, 1, 1));
    }

    #[test]
    fn test_tiles_divide_inferred_slices() {
        let layout = HyperstackLayout::parse("tiles=4");
        let dims = layout.dims(5, 5, 12).unwrap();
        assert_eq!((dims.z, dims.m), (3, 4));
    }

    #[test]
    fn test_overflowing_counts_have_no_dims() {
        let layout = HyperstackLayout::parse("channels=18446744073709551615\nframes=2");
        assert_eq!(layout.dims(5, 5, 12), None);

        // Slice count given explicitly: the product still has to fit
        let layout = HyperstackLayout::parse("channels=4294967296\nframes=4294967296\nslices=1");
        assert_eq!(layout.dims(2, 2, 1), None);
    }

    #[test]
    fn test_page_count_overflow() {
        let layout = HyperstackLayout::parse("channels=2\nslices=18446744073709551615");
        let dims = layout.dims(2, 2, 4).unwrap();
        assert_eq!(page_count(&dims), None);
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let err = TiffAcquisition::open(Path::new("/nonexistent/acquisition.tif")).unwrap_err();
        assert!(matches!(err, AcquisitionError::NotFound(_)));
    }

    #[test]
    fn test_is_tiff() {
        assert!(is_tiff(Path::new("a/b.TIF")));
        assert!(is_tiff(Path::new("stack.tiff")));
        assert!(!is_tiff(Path::new("label.png")));
    }
}
