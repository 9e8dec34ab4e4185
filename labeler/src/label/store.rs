//! Label persistence as single-channel 8-bit PNG files
//!
//! Writes go through a temp file next to the destination followed by a
//! rename, so a reader sees either the old label or the new one.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use ndarray::Array2;
use tracing::debug;

use super::types::{Label, LabelError};

/// All-zero label of the given `(height, width)`
pub fn blank_label(shape: (usize, usize)) -> Label {
    Array2::zeros(shape)
}

/// Encode a label as an 8-bit grayscale PNG
pub fn encode_label_png(label: &Label) -> Result<Vec<u8>, LabelError> {
    let (height, width) = label.dim();
    let pixels: Vec<u8> = label.iter().copied().collect();

    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(&pixels, width as u32, height as u32, ExtendedColorType::L8)
        .map_err(|e| LabelError::FormatError(format!("PNG encoding failed: {}", e)))?;
    Ok(buf)
}

/// Decode an 8-bit single-channel PNG into a label
pub fn decode_label_png(bytes: &[u8]) -> Result<Label, LabelError> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| LabelError::FormatError(e.to_string()))?;

    let gray = match decoded {
        DynamicImage::ImageLuma8(gray) => gray,
        other => {
            return Err(LabelError::FormatError(format!(
                "expected 8-bit single-channel image, got {:?}",
                other.color()
            )));
        }
    };

    let (width, height) = gray.dimensions();
    Array2::from_shape_vec((height as usize, width as usize), gray.into_raw())
        .map_err(|e| LabelError::FormatError(e.to_string()))
}

/// Persist `label` at `path`, replacing any existing file
///
/// The label shape must match the projection it annotates; the store does
/// not check this.
pub fn save_label(label: &Label, path: &Path) -> Result<(), LabelError> {
    let bytes = encode_label_png(label)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    let written = (|| -> std::io::Result<()> {
        let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
        writer.write_all(&bytes)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    debug!("Saved label {:?} ({}x{})", path, label.ncols(), label.nrows());
    Ok(())
}

/// Read a label previously written by `save_label`
pub fn load_label(path: &Path) -> Result<Label, LabelError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LabelError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    decode_label_png(&bytes)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Maps (acquisition name, image index) to label files under one directory
#[derive(Debug, Clone)]
pub struct LabelStore {
    root: PathBuf,
}

impl LabelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<name>_image<index>.png`
    pub fn path_for(&self, acquisition: &str, image_index: usize) -> PathBuf {
        self.root
            .join(format!("{}_image{}.png", acquisition, image_index))
    }

    pub fn save(&self, acquisition: &str, image_index: usize, label: &Label) -> Result<(), LabelError> {
        save_label(label, &self.path_for(acquisition, image_index))
    }

    pub fn load(&self, acquisition: &str, image_index: usize) -> Result<Label, LabelError> {
        load_label(&self.path_for(acquisition, image_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        let label: Label = array![[0, 1, 1], [1, 0, 0]];

        save_label(&label, &path).unwrap();
        assert_eq!(load_label(&path).unwrap(), label);
    }

    #[test]
    fn test_blank_label_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        let blank = blank_label((4, 7));
        assert_eq!(blank.dim(), (4, 7));
        assert!(blank.iter().all(|&v| v == 0));

        save_label(&blank, &path).unwrap();
        assert_eq!(load_label(&path).unwrap(), blank);
    }

    #[test]
    fn test_save_overwrites_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("label.png");

        save_label(&array![[1, 1], [1, 1]], &path).unwrap();
        save_label(&array![[0, 1], [0, 0]], &path).unwrap();

        assert_eq!(load_label(&path).unwrap(), array![[0, 1], [0, 0]]);
        // No temp files left behind
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_out_of_range_values_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.png");
        let label: Label = array![[0, 7], [255, 1]];

        save_label(&label, &path).unwrap();
        assert_eq!(load_label(&path).unwrap(), label);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_label(&dir.path().join("absent.png"));
        assert!(matches!(result, Err(LabelError::NotFound(_))));
    }

    #[test]
    fn test_load_rejects_garbage_and_color() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.png");
        fs::write(&garbage, b"not a png").unwrap();
        assert!(matches!(load_label(&garbage), Err(LabelError::FormatError(_))));

        let color = dir.path().join("color.png");
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&[255, 0, 0, 0, 255, 0], 2, 1, ExtendedColorType::Rgb8)
            .unwrap();
        fs::write(&color, buf).unwrap();
        assert!(matches!(load_label(&color), Err(LabelError::FormatError(_))));
    }

    #[test]
    fn test_store_paths() {
        let store = LabelStore::new("/data/labels");
        assert_eq!(
            store.path_for("embryo", 3),
            PathBuf::from("/data/labels/embryo_image3.png")
        );
    }

    #[test]
    fn test_store_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = LabelStore::new(dir.path().join("labels"));
        assert!(matches!(store.load("embryo", 0), Err(LabelError::NotFound(_))));

        let label: Label = array![[1, 0], [0, 1]];
        store.save("embryo", 0, &label).unwrap();
        assert!(dir.path().join("labels").join("embryo_image0.png").is_file());
        assert_eq!(store.load("embryo", 0).unwrap(), label);
    }
}
