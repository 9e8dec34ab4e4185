//! Discovery of acquisitions in the image folder
//!
//! A TIFF file is one acquisition named after its stem; a directory holding
//! TIFF files is one acquisition named after the directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use super::tiff_stack::{TiffAcquisition, is_tiff};
use super::types::AcquisitionError;

/// One acquisition found in the image folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionEntry {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// Whether the acquisition is a directory of per-image files
    pub is_directory: bool,
}

/// Image folder scanner
#[derive(Debug, Clone)]
pub struct AcquisitionCatalog {
    image_dir: PathBuf,
}

impl AcquisitionCatalog {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Every acquisition in the folder, sorted by name
    pub fn scan(&self) -> Vec<AcquisitionEntry> {
        let mut found = Vec::new();

        let entries = match std::fs::read_dir(&self.image_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to read image directory {:?}: {}", self.image_dir, e);
                return found;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
            else {
                continue;
            };

            if path.is_dir() && contains_tiff(&path) {
                debug!("Found acquisition directory: {} at {:?}", name, path);
                found.push(AcquisitionEntry {
                    name,
                    path,
                    is_directory: true,
                });
            } else if path.is_file() && is_tiff(&path) {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
                    .unwrap_or(name);
                debug!("Found acquisition file: {} at {:?}", stem, path);
                found.push(AcquisitionEntry {
                    name: stem,
                    path,
                    is_directory: false,
                });
            }
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        info!("Found {} acquisitions in {:?}", found.len(), self.image_dir);
        found
    }

    /// Path of the acquisition called `name`
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return None;
        }
        self.scan()
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.path)
    }

    /// Open the acquisition called `name`
    pub fn open(&self, name: &str) -> Result<TiffAcquisition, AcquisitionError> {
        let path = self
            .find(name)
            .ok_or_else(|| AcquisitionError::NotFound(self.image_dir.join(name)))?;
        TiffAcquisition::open(&path)
    }
}

fn contains_tiff(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| entries.flatten().any(|e| e.path().is_file() && is_tiff(&e.path())))
        .unwrap_or(false)
}
