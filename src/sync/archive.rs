//! Repository tarball reading

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tar::Archive;
use tracing::trace;

/// A regular file from a repository archive
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    /// Path relative to the repository root
    pub path: String,
    pub content: String,
    pub size: i64,
}

/// Strip the synthetic `<owner>-<repo>-<sha>/` directory GitHub wraps archives in
pub fn normalize_archive_path(name: &str) -> Option<&str> {
    name.split_once('/')
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
}

/// True when any path segment is a skipped directory
pub fn should_skip_path(path: &str, skip_dirs: &[String]) -> bool {
    path.split('/').any(|seg| skip_dirs.iter().any(|d| d == seg))
}

/// Submodule directory name for files under `modules/<name>/`
pub fn submodule_key(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("modules/")?;
    let (key, file) = rest.split_once('/')?;
    (!key.is_empty() && !file.is_empty()).then_some(key)
}

/// Read every retained regular file from a gzipped tarball, in archive order
pub fn read_archive(bytes: &[u8], skip_dirs: &[String]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut files = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| Error::Archive(format!("failed to open archive: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::Archive(format!("failed to read archive: {}", e)))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let Some(path) = normalize_archive_path(&name) else {
            continue;
        };
        if should_skip_path(path, skip_dirs) {
            trace!(path, "Skipping archive entry");
            continue;
        }
        let path = path.to_string();

        let mut raw = Vec::new();
        entry
            .read_to_end(&mut raw)
            .map_err(|e| Error::Archive(format!("failed to read file {}: {}", path, e)))?;
        let size = entry.header().size().unwrap_or(raw.len() as u64) as i64;

        files.push(ArchiveEntry {
            path,
            content: String::from_utf8_lossy(&raw).into_owned(),
            size,
        });
    }

    Ok(files)
}
