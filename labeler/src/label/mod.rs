//! Label module for persisting and editing per-image annotations
//!
//! This module provides:
//! - `save_label` / `load_label` and `LabelStore` for PNG persistence
//! - `apply_edit` and mask conversions for canvas strokes
//! - `LabelSession` for the working label of one image

mod edit;
mod session;
mod store;
mod types;

pub use edit::{apply_edit, label_from_mask, mask_from_label, touched_from_png, touched_from_rgba};
pub use session::{LabelSession, LabelSnapshot, LabelStatus};
pub use store::{
    LabelStore, blank_label, decode_label_png, encode_label_png, load_label, save_label,
};
pub use types::{EditAction, Label, LabelError};
