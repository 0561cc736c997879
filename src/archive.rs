//! Zips an output directory into `<dir>.zip`.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::checkpoint::PROGRESS_FILE;

/// Failure while building the archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the tree or writing the zip failed.
    #[error("archive io error at {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// Walking the output directory failed.
    #[error("cannot walk output directory: {0}")]
    Walk(#[from] walkdir::Error),
    /// The zip encoder rejected an entry.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// `<dir>.zip` next to `dir`.
pub fn archive_path(dir: &Path) -> PathBuf {
    let normalized: PathBuf = dir
        .components()
        .filter(|part| !matches!(part, Component::CurDir))
        .collect();
    let mut name = OsString::from(normalized.as_os_str());
    name.push(".zip");
    PathBuf::from(name)
}

/// Archives every file under `dir` except the progress checkpoint.
///
/// Returns the archive path.
pub fn zip_dir(dir: &Path) -> Result<PathBuf, ArchiveError> {
    let target = archive_path(dir);
    let file = File::create(&target).map_err(|source| ArchiveError::Io {
        path: target.clone(),
        source,
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut files = 0usize;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        if relative.as_os_str().is_empty()
            || relative.file_name() == Some(OsStr::new(PROGRESS_FILE))
        {
            continue;
        }
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
            continue;
        }
        let bytes = fs::read(entry.path()).map_err(|source| ArchiveError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        zip.start_file(name, options)?;
        zip.write_all(&bytes).map_err(|source| ArchiveError::Io {
            path: target.clone(),
            source,
        })?;
        files += 1;
    }
    zip.finish()?;
    tracing::info!(archive = %target.display(), files, "output archived");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_sits_beside_directory() {
        assert_eq!(
            archive_path(Path::new("output/docs.acme.dev")),
            PathBuf::from("output/docs.acme.dev.zip")
        );
        assert_eq!(
            archive_path(Path::new("./out/")),
            PathBuf::from("out.zip")
        );
    }
}
