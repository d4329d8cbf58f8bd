use std::path::PathBuf;

use transcoder_core::error::CoreError;
use transcoder_core::ffmpeg::FfmpegError;

use crate::config::ConfigError;
use crate::encoder::EncodeError;
use crate::jellyfin::JellyfinError;

/// Errors surfaced by the worker and its maintenance commands.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("VAAPI render device {} not found", .0.display())]
    RenderDeviceMissing(PathBuf),

    #[error("FFmpeg not available: {0}")]
    FfmpegUnavailable(#[source] FfmpegError),

    #[error("Subtitle probe failed: {0}")]
    Probe(#[source] FfmpegError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Jellyfin(#[from] JellyfinError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
