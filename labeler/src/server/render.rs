//! PNG rendering of projections for the canvas background

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};
use ndarray::Array2;

use crate::acquisition::Plane;

/// Map a plane onto 0..=255
///
/// 8-bit data is passed through; wider data is stretched linearly over its
/// own intensity range. A flat plane renders black.
pub fn stretch_to_u8(plane: &Plane) -> Array2<u8> {
    if let Plane::U8(data) = plane {
        return data.clone();
    }

    let values = plane.to_f64();
    let Some((min, max)) = plane.min_max() else {
        return Array2::zeros(values.dim());
    };
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return Array2::zeros(values.dim());
    }

    values.mapv(|v| (((v - min) / range) * 255.0).round().clamp(0.0, 255.0) as u8)
}

/// Encode `plane` into the red channel of an RGB PNG
pub fn render_red_png(plane: &Plane) -> Result<Vec<u8>, ImageError> {
    let intensity = stretch_to_u8(plane);
    let (height, width) = intensity.dim();

    let mut rgb = Vec::with_capacity(height * width * 3);
    for &v in intensity.iter() {
        rgb.extend_from_slice(&[v, 0, 0]);
    }

    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        &rgb,
        width as u32,
        height as u32,
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}
