//! Labeler configuration
//!
//! Configuration is loaded from environment variables; anything unset or
//! unparseable keeps its default.

use std::env;
use std::path::PathBuf;

use crate::projection::MosaicPolicy;
use crate::segmentation::{DEFAULT_MAX_GAP, SegmentationOptions};

/// Main labeler configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Acquisition and label storage
    pub storage: StorageConfig,

    /// Projection configuration
    pub projection: ProjectionConfig,

    /// Initial-guess segmentation defaults
    pub segmentation: SegmentationOptions,
}

/// Where acquisitions are read from and labels written to
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory scanned for TIFF acquisitions
    pub image_dir: PathBuf,
    /// Directory holding `<name>_image<index>.png` labels
    pub label_dir: PathBuf,
}

/// Projection-related configuration
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Skip the confirmation step for mosaic images
    pub allow_mosaic: bool,
    /// Maximum number of cached projections
    pub cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            storage: StorageConfig::default(),
            projection: ProjectionConfig::default(),
            segmentation: SegmentationOptions::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("images"),
            label_dir: PathBuf::from("labels"),
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            allow_mosaic: false,
            cache_size: 16,
        }
    }
}

impl ProjectionConfig {
    /// Mosaic policy for requests that carry no explicit confirmation
    pub fn mosaic_policy(&self) -> MosaicPolicy {
        if self.allow_mosaic {
            MosaicPolicy::Proceed
        } else {
            MosaicPolicy::Ask
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, defaults for missing keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // Server config
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Storage config
        if let Some(dir) = lookup("IMAGE_DIR")
            && !dir.is_empty()
        {
            config.storage.image_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LABEL_DIR")
            && !dir.is_empty()
        {
            config.storage.label_dir = PathBuf::from(dir);
        }

        // Projection config
        if let Some(val) = lookup("ALLOW_MOSAIC") {
            config.projection.allow_mosaic = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(val) = lookup("PROJECTION_CACHE_SIZE")
            && let Ok(size) = val.parse()
        {
            config.projection.cache_size = size;
        }

        // Segmentation config
        if let Some(val) = lookup("SEG_THRESHOLD")
            && let Ok(threshold) = val.parse::<f64>()
        {
            config.segmentation.threshold = Some(threshold);
        }
        if let Some(val) = lookup("SEG_MAX_GAP")
            && let Ok(gap) = val.parse()
        {
            config.segmentation.max_gap = gap;
        }

        config
    }
}
