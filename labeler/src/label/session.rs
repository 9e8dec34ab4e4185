//! Editable label buffer for one image
//!
//! A `LabelSession` owns the working label, counts revisions and tracks
//! whether there are unsaved changes. Readers get immutable snapshots so a
//! render never observes a half-applied edit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::ArrayView2;
use serde::Serialize;
use tracing::{debug, info};

use super::edit::{apply_edit, check_shape, label_from_mask};
use super::store::{blank_label, load_label, save_label};
use super::types::{EditAction, Label, LabelError};

/// Immutable view of a session's label at one revision
#[derive(Debug, Clone)]
pub struct LabelSnapshot {
    pub label: Arc<Label>,
    pub revision: u64,
}

/// Summary returned after each change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelStatus {
    pub revision: u64,
    pub dirty: bool,
    pub foreground_pixels: usize,
}

#[derive(Debug)]
pub struct LabelSession {
    path: PathBuf,
    label: Arc<Label>,
    revision: u64,
    dirty: bool,
}

impl LabelSession {
    /// Open the label persisted at `path`, or start blank if there is none
    ///
    /// `shape` is the shape of the projection being labeled; a stored label
    /// of any other shape is rejected.
    pub fn open(path: impl Into<PathBuf>, shape: (usize, usize)) -> Result<Self, LabelError> {
        let path = path.into();
        let label = match load_label(&path) {
            Ok(label) => {
                check_shape(shape, label.dim())?;
                info!("Loaded existing label {:?}", path);
                label
            }
            Err(LabelError::NotFound(_)) => {
                info!("No label at {:?}, starting blank {:?}", path, shape);
                blank_label(shape)
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            label: Arc::new(label),
            revision: 0,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shape(&self) -> (usize, usize) {
        self.label.dim()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn snapshot(&self) -> LabelSnapshot {
        LabelSnapshot {
            label: Arc::clone(&self.label),
            revision: self.revision,
        }
    }

    pub fn status(&self) -> LabelStatus {
        LabelStatus {
            revision: self.revision,
            dirty: self.dirty,
            foreground_pixels: self.label.iter().filter(|&&v| v != 0).count(),
        }
    }

    /// Paint a canvas stroke; on error the label is unchanged
    pub fn apply(
        &mut self,
        touched: ArrayView2<'_, bool>,
        action: EditAction,
    ) -> Result<LabelSnapshot, LabelError> {
        let edited = apply_edit(&self.label, touched, action)?;
        debug!("Applied {:?} edit to {:?}", action, self.path);
        Ok(self.commit(edited))
    }

    /// Replace the whole label with a segmentation mask
    pub fn replace_with_mask(
        &mut self,
        mask: ArrayView2<'_, bool>,
    ) -> Result<LabelSnapshot, LabelError> {
        check_shape(self.shape(), mask.dim())?;
        Ok(self.commit(label_from_mask(mask)))
    }

    /// Persist the current label and clear the dirty flag
    pub fn save(&mut self) -> Result<LabelSnapshot, LabelError> {
        save_label(&self.label, &self.path)?;
        self.dirty = false;
        info!("Saved label {:?} at revision {}", self.path, self.revision);
        Ok(self.snapshot())
    }

    fn commit(&mut self, label: Label) -> LabelSnapshot {
        self.label = Arc::new(label);
        self.revision += 1;
        self.dirty = true;
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn test_open_missing_starts_blank() {
        let dir = tempfile::tempdir().unwrap();
        let session = LabelSession::open(dir.path().join("new.png"), (3, 4)).unwrap();
        assert_eq!(session.shape(), (3, 4));
        assert_eq!(session.revision(), 0);
        assert!(!session.is_dirty());
        assert!(session.snapshot().label.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_open_rejects_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        save_label(&Array2::zeros((2, 2)), &path).unwrap();

        let result = LabelSession::open(&path, (3, 3));
        assert!(matches!(result, Err(LabelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_edit_save_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");

        let mut session = LabelSession::open(&path, (2, 3)).unwrap();
        let touched = array![[true, true, false], [false, false, false]];
        let snap = session.apply(touched.view(), EditAction::Add).unwrap();
        assert_eq!(snap.revision, 1);
        assert!(session.is_dirty());

        session.save().unwrap();
        assert!(!session.is_dirty());

        let reopened = LabelSession::open(&path, (2, 3)).unwrap();
        assert_eq!(*reopened.snapshot().label, array![[1, 1, 0], [0, 0, 0]]);
    }

    #[test]
    fn test_failed_edit_leaves_label_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LabelSession::open(dir.path().join("l.png"), (2, 2)).unwrap();
        let before = session.snapshot();

        let wrong = Array2::from_elem((3, 3), true);
        assert!(session.apply(wrong.view(), EditAction::Add).is_err());
        assert!(session.replace_with_mask(wrong.view()).is_err());

        let after = session.snapshot();
        assert_eq!(after.revision, before.revision);
        assert_eq!(after.label, before.label);
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_snapshot_is_stable_across_edits() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LabelSession::open(dir.path().join("l.png"), (1, 2)).unwrap();
        let old = session.snapshot();

        session
            .replace_with_mask(array![[true, true]].view())
            .unwrap();
        assert_eq!(*old.label, array![[0, 0]]);
        assert_eq!(*session.snapshot().label, array![[1, 1]]);
        assert_eq!(session.status().foreground_pixels, 2);
    }
}
