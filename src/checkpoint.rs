//! Progress file persistence for pause and resume.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::session::CrawlProgress;

/// File name of the progress checkpoint inside the output directory.
pub const PROGRESS_FILE: &str = ".scraper-progress.json";

/// Failures reading or writing the checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Filesystem access failed.
    #[error("checkpoint io error at {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file exists but is not valid progress JSON.
    #[error("checkpoint at {path} is corrupt: {source}")]
    Corrupt {
        /// File being decoded.
        path: PathBuf,
        /// Decoder error.
        source: serde_json::Error,
    },
}

/// Handle on `<dir>/.scraper-progress.json`.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    /// Checkpoint stored inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(PROGRESS_FILE),
        }
    }

    /// Location of the progress file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a progress file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes `progress` wholesale through a temporary file and rename.
    pub fn save(&self, progress: &CrawlProgress) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let json = serde_json::to_vec_pretty(progress).map_err(|source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| CheckpointError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        tracing::debug!(
            path = %self.path.display(),
            pages = progress.scraped_pages.len(),
            queued = progress.remaining_queue.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Reads the progress file, returning `None` when there is none.
    pub fn load(&self) -> Result<Option<CrawlProgress>, CheckpointError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Removes the progress file if present.
    pub fn delete(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
