//! Projection module for reducing Z-stacks to 2D arrays
//!
//! This module provides:
//! - `ProjectionEngine` for maximum-intensity projection of one selection
//! - `ProjectionOutcome` / `PendingProjection` for the mosaic confirmation step
//! - `ProjectionCache` for reusing projections while the source file is unchanged

mod cache;
mod engine;
mod stack;
mod types;

pub use cache::{ProjectionCache, ProjectionCacheStats, ProjectionKey};
pub use engine::{ProjectionEngine, find_merged_candidates};
pub use stack::ZStack;
pub use types::{
    MergedCandidate, MosaicPolicy, MosaicWarning, PendingProjection, Projection, ProjectionError,
    ProjectionMetadata, ProjectionOutcome, ProjectionRequest,
};
