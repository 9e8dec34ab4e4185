//! Label edits driven by canvas strokes and segmentation masks

use image::ImageFormat;
use ndarray::{Array2, ArrayView2, Zip};

use super::types::{EditAction, Label, LabelError};
use crate::segmentation::Mask;

/// Paint `action` onto every touched pixel, returning the new label
///
/// Pure and idempotent: applying the same edit twice yields the same label.
pub fn apply_edit(
    label: &Label,
    touched: ArrayView2<'_, bool>,
    action: EditAction,
) -> Result<Label, LabelError> {
    check_shape(label.dim(), touched.dim())?;

    let value = action.value();
    let mut edited = label.clone();
    Zip::from(&mut edited).and(&touched).for_each(|px, &hit| {
        if hit {
            *px = value;
        }
    });
    Ok(edited)
}

/// Touched-pixel mask from a canvas RGBA raster: any non-transparent pixel
pub fn touched_from_rgba(rgba: &image::RgbaImage) -> Mask {
    let (width, height) = rgba.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        rgba.get_pixel(c as u32, r as u32).0[3] > 0
    })
}

/// Decode a canvas PNG upload into a touched mask
pub fn touched_from_png(bytes: &[u8]) -> Result<Mask, LabelError> {
    let canvas = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| LabelError::FormatError(e.to_string()))?;
    Ok(touched_from_rgba(&canvas.to_rgba8()))
}

/// 0/1 label from a boolean mask
pub fn label_from_mask(mask: ArrayView2<'_, bool>) -> Label {
    mask.mapv(u8::from)
}

/// Boolean mask of every nonzero label pixel
pub fn mask_from_label(label: &Label) -> Mask {
    label.mapv(|v| v != 0)
}

pub(crate) fn check_shape(
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<(), LabelError> {
    if expected != actual {
        return Err(LabelError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
