//! Library scanning and transcode file housekeeping.
//!
//! These helpers are synchronous; callers on the async runtime wrap the
//! directory walk in `spawn_blocking`.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use transcoder_core::naming;
use walkdir::WalkDir;

/// Transcodes smaller than this are leftovers of a crashed run.
pub const MIN_TRANSCODE_BYTES: u64 = 100;

/// Recursively collect every source file under `input_dir`, sorted.
///
/// A missing input directory yields an empty list; unreadable entries are
/// logged and skipped.
pub fn find_source_files(input_dir: &Path) -> Vec<PathBuf> {
    let root = std::fs::canonicalize(input_dir).unwrap_or_else(|_| input_dir.to_path_buf());
    if !root.is_dir() {
        tracing::warn!(dir = %root.display(), "Input directory does not exist");
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| naming::is_source_file(path))
        .collect();

    files.sort();
    files
}

/// Whether the `.mkv` transcode of `source` already exists.
pub fn has_transcode(source: &Path) -> bool {
    naming::transcode_target(source)
        .map(|target| target.exists())
        .unwrap_or(false)
}

/// Existing transcodes (any extension) of the given sources, deduplicated.
pub fn find_transcoded_files(sources: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .filter_map(|source| naming::transcode_candidates(source).ok())
        .flatten()
        .filter(|candidate| candidate.exists())
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}

/// Remove the `.mkv` transcode of `source` if present.
///
/// Returns the deleted path, or `None` when there was nothing to delete.
pub fn delete_transcode(source: &Path) -> io::Result<Option<PathBuf>> {
    let Ok(target) = naming::transcode_target(source) else {
        return Ok(None);
    };
    match std::fs::remove_file(&target) {
        Ok(()) => {
            tracing::info!(path = %target.display(), "Deleted transcoded file");
            Ok(Some(target))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete transcodes smaller than [`MIN_TRANSCODE_BYTES`] for every source
/// under `input_dir`. Returns the deleted paths.
pub fn cleanup_bad_transcodes(input_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut deleted = Vec::new();
    for source in find_source_files(input_dir) {
        let Ok(target) = naming::transcode_target(&source) else {
            continue;
        };
        let size = match std::fs::metadata(&target) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if size < MIN_TRANSCODE_BYTES {
            tracing::warn!(path = %target.display(), size, "Deleting empty transcode");
            std::fs::remove_file(&target)?;
            deleted.push(target);
        }
    }
    Ok(deleted)
}
