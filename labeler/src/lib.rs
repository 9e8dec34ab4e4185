//! Image Labeler Library
//!
//! Core of the microscopy labeling tool: Z-stack projection, initial-guess
//! segmentation and label persistence, plus the HTTP layer the binary serves.

pub mod acquisition;
pub mod config;
pub mod label;
pub mod projection;
pub mod segmentation;
pub mod server;

// Re-export commonly used types
pub use acquisition::{AcquisitionError, AcquisitionReader, TiffAcquisition};
pub use config::Config;
pub use label::{LabelError, LabelSession, LabelStore};
pub use projection::{ProjectionEngine, ProjectionError, ProjectionOutcome, ProjectionRequest};
pub use segmentation::{SegmentationEngine, SegmentationError, initial_guess};
pub use server::{AppState, labeler_routes};
