//! Per-run scratch space for fetched, clipped and computed rasters.
//!
//! The disk flavor is a temporary directory removed on drop, so every exit
//! path of a run releases it.

use agrindex_core::config::WorkingSetStrategy;
use agrindex_core::error::{AgrindexError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug)]
pub struct WorkingSet {
    dir: Option<TempDir>,
}

impl WorkingSet {
    pub fn new(strategy: WorkingSetStrategy) -> Result<Self> {
        match strategy {
            WorkingSetStrategy::Memory => Ok(Self::in_memory()),
            WorkingSetStrategy::Disk => {
                let dir = tempfile::Builder::new().prefix("agrindex-").tempdir()?;
                tracing::debug!(path = %dir.path().display(), "Created working directory");
                Ok(Self { dir: Some(dir) })
            }
        }
    }

    pub fn in_memory() -> Self {
        Self { dir: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Keep an artifact under `name`.
    ///
    /// On disk the bytes are written out and read back, so what the next
    /// stage sees is what was persisted. In memory they pass through.
    pub fn keep(&self, name: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let Some(path) = self.artifact_path(name) else {
            return Ok(bytes);
        };

        let write_error = |e: std::io::Error| AgrindexError::WriteError {
            key: path.display().to_string(),
            reason: e.to_string(),
        };
        std::fs::write(&path, &bytes).map_err(write_error)?;
        std::fs::read(&path).map_err(write_error)
    }

    /// File name for an artifact of one index and band
    pub fn artifact_name(index: &str, band: Option<&str>, stage: &str) -> String {
        match band {
            Some(band) => format!("{}_{}_{}.tif", index, band, stage),
            None => format!("{}_{}.tif", index, stage),
        }
    }

    pub(crate) fn artifact_path(&self, name: &str) -> Option<PathBuf> {
        self.path().map(|p| p.join(name))
    }
}
