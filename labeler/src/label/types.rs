//! Label-related types and error definitions

use std::path::PathBuf;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted per-pixel annotation: 0 = background, 1 = foreground
///
/// Values outside {0, 1} are passed through untouched by the store.
pub type Label = Array2<u8>;

/// Errors that can occur when loading, saving or editing labels
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Label not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid label file: {0}")]
    FormatError(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// What a canvas stroke does to the pixels it touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    /// Set touched pixels to 1
    Add,
    /// Set touched pixels to 0
    Remove,
}

impl EditAction {
    /// Label value written by this action
    pub fn value(self) -> u8 {
        match self {
            EditAction::Add => 1,
            EditAction::Remove => 0,
        }
    }
}
