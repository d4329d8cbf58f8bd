//! File naming rules for source media and their transcodes.
//!
//! A source `Movie.mkv` (or `Movie - Original.mkv`) is transcoded into
//! `Movie - Transcoded.mkv` in the same directory. Files that already carry
//! the transcoded suffix are never treated as sources.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Suffix appended to the stem of every transcoded file.
pub const TRANSCODED_SUFFIX: &str = " - Transcoded";

/// Suffix some libraries use to mark the untouched original; stripped
/// before building the transcode name.
pub const ORIGINAL_SUFFIX: &str = " - Original";

/// Container written by the encoder.
pub const TARGET_EXTENSION: &str = "mkv";

/// Extensions picked up by the library scan.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["mp4", "mkv"];

/// Extensions checked when looking for existing transcodes of a source.
pub const TRANSCODED_EXTENSIONS: [&str; 2] = ["mkv", "mp4"];

/// Whether `path` is a source file the scanner should consider.
pub fn is_source_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !ALLOWED_EXTENSIONS.contains(&ext) {
        return false;
    }
    match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => !stem.ends_with(TRANSCODED_SUFFIX),
        None => false,
    }
}

/// The stem of `path` with a trailing [`ORIGINAL_SUFFIX`] removed.
pub fn base_name(path: &Path) -> Result<String, CoreError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CoreError::NotASource(path.to_path_buf()))?;
    Ok(stem.strip_suffix(ORIGINAL_SUFFIX).unwrap_or(stem).to_string())
}

/// Path of the transcode with the given extension for a source file.
pub fn transcoded_path_with_extension(source: &Path, ext: &str) -> Result<PathBuf, CoreError> {
    let base = base_name(source)?;
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(format!("{base}{TRANSCODED_SUFFIX}.{ext}")))
}

/// Path the encoder writes for `source`.
pub fn transcode_target(source: &Path) -> Result<PathBuf, CoreError> {
    transcoded_path_with_extension(source, TARGET_EXTENSION)
}

/// Every possible transcode path for `source`, existing or not.
pub fn transcode_candidates(source: &Path) -> Result<Vec<PathBuf>, CoreError> {
    TRANSCODED_EXTENSIONS
        .iter()
        .map(|ext| transcoded_path_with_extension(source, ext))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_extensions() {
        assert!(is_source_file(Path::new("/media/Movie.mkv")));
        assert!(is_source_file(Path::new("/media/Movie.mp4")));
        assert!(is_source_file(Path::new("/media/Show - Original.mkv")));
    }

    #[test]
    fn rejects_other_extensions_and_transcodes() {
        assert!(!is_source_file(Path::new("/media/Movie.avi")));
        assert!(!is_source_file(Path::new("/media/Movie.MKV")));
        assert!(!is_source_file(Path::new("/media/Movie")));
        assert!(!is_source_file(Path::new("/media/Movie - Transcoded.mkv")));
        assert!(!is_source_file(Path::new("/media/Movie - Transcoded.mp4")));
    }

    #[test]
    fn base_name_strips_original_suffix_once() {
        assert_eq!(base_name(Path::new("a/Movie - Original.mkv")).unwrap(), "Movie");
        assert_eq!(base_name(Path::new("a/Movie.mp4")).unwrap(), "Movie");
        assert_eq!(
            base_name(Path::new("a/Movie - Original - Original.mkv")).unwrap(),
            "Movie - Original"
        );
    }

    #[test]
    fn target_is_mkv_next_to_source() {
        let target = transcode_target(Path::new("/lib/Show/Ep1 - Original.mp4")).unwrap();
        assert_eq!(target, PathBuf::from("/lib/Show/Ep1 - Transcoded.mkv"));
    }

    #[test]
    fn candidates_cover_mkv_and_mp4() {
        let candidates = transcode_candidates(Path::new("/lib/Ep1.mkv")).unwrap();
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/lib/Ep1 - Transcoded.mkv"),
                PathBuf::from("/lib/Ep1 - Transcoded.mp4"),
            ]
        );
    }

    #[test]
    fn base_name_fails_without_stem() {
        assert!(matches!(
            base_name(Path::new("/")),
            Err(CoreError::NotASource(_))
        ));
    }
}
