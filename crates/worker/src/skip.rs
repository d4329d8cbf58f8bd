//! Decide whether a source file can be skipped because all of its subtitles
//! are text based (browsers render those natively, nothing to burn in).
//!
//! Decisions are cached in the skip tracker keyed by path and validated
//! against the file's size and modification time, so unchanged files are
//! not re-probed on every scan.

use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use transcoder_core::ffmpeg::{self, FfmpegError, FfprobeStream, SubtitleClass};
use transcoder_db::models::skip_record::{FileSignature, SkipMetadata, REASON_TEXT_SUBTITLES};
use transcoder_db::repositories::SkipRecordRepo;
use transcoder_db::DbPool;

/// Source of subtitle stream information for a media file.
pub trait SubtitleProber: Send + Sync {
    fn probe(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Vec<FfprobeStream>, FfmpegError>> + Send;
}

/// Probes files with the `ffprobe` binary on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProber;

impl SubtitleProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<Vec<FfprobeStream>, FfmpegError> {
        ffmpeg::probe_subtitle_streams(path).await
    }
}

/// Read the size and modification time of `path`.
pub fn file_signature(path: &Path) -> io::Result<FileSignature> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    Ok(FileSignature {
        size: meta.len(),
        mtime_ns,
    })
}

/// Evaluates and caches skip decisions.
pub struct SkipEvaluator<P> {
    pool: DbPool,
    prober: P,
}

impl<P: SubtitleProber> SkipEvaluator<P> {
    pub fn new(pool: DbPool, prober: P) -> Self {
        Self { pool, prober }
    }

    /// Whether `path` needs no transcode because of text-only subtitles.
    ///
    /// Missing files and probe failures are never skipped. Database errors
    /// are returned so the caller can decide how to treat the file.
    pub async fn should_skip(&self, path: &Path) -> Result<bool, sqlx::Error> {
        let signature = match file_signature(path) {
            Ok(sig) => sig,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot stat file");
                return Ok(false);
            }
        };

        let key = path.to_string_lossy();
        let record = SkipRecordRepo::find_by_path(&self.pool, &key).await?;
        let cached_hit = record
            .as_ref()
            .and_then(|r| r.parsed_metadata())
            .is_some_and(|meta| meta.matches(&signature));
        if cached_hit {
            return Ok(true);
        }

        let streams = match self.prober.probe(path).await {
            Ok(streams) => streams,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to probe subtitles");
                return Ok(false);
            }
        };

        match ffmpeg::classify_subtitles(&streams) {
            SubtitleClass::TextOnly(codecs) => {
                tracing::info!(
                    file = %path.file_name().unwrap_or_default().to_string_lossy(),
                    codecs = %codecs.join(", "),
                    "Skipping transcode: detected browser-readable subtitles",
                );
                let metadata = SkipMetadata::new(signature, codecs);
                SkipRecordRepo::upsert(&self.pool, &key, REASON_TEXT_SUBTITLES, &metadata).await?;
                Ok(true)
            }
            SubtitleClass::None | SubtitleClass::NeedsBurnIn => {
                if record.is_some() {
                    SkipRecordRepo::delete_by_path(&self.pool, &key).await?;
                }
                Ok(false)
            }
        }
    }
}
