//! The transcoding loop.
//!
//! Each cycle scans the library, refreshes the gauges, transcodes one
//! randomly chosen pending file and asks Jellyfin to rescan. The loop and
//! every sleep in it stop as soon as the cancellation token fires.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio_util::sync::CancellationToken;
use transcoder_core::{ffmpeg, naming};
use transcoder_db::DbPool;

use crate::config::WorkerConfig;
use crate::encoder::{self, EncodeError, EncodeJob};
use crate::error::{WorkerError, WorkerResult};
use crate::jellyfin::JellyfinClient;
use crate::metrics::{ScanCounts, TranscodeMetrics, WorkerState};
use crate::scanner;
use crate::skip::{SkipEvaluator, SubtitleProber};

/// Pause after a file was processed.
pub const BUSY_INTERVAL: Duration = Duration::from_secs(1);

/// Pause when nothing was left to do.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(60);

/// Classification of the library produced by one scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub total: usize,
    pub pending: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

impl ScanResult {
    pub fn counts(&self) -> ScanCounts {
        ScanCounts {
            total: self.total,
            to_process: self.pending.len(),
            skipped: self.skipped.len(),
        }
    }
}

/// How a single file attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Transcoded,
    Interrupted,
    Failed,
}

/// Check the host before entering the loop: the render node must exist and
/// ffmpeg must be runnable.
pub async fn preflight(config: &WorkerConfig) -> WorkerResult<()> {
    if !config.render_device.exists() {
        return Err(WorkerError::RenderDeviceMissing(config.render_device.clone()));
    }
    ffmpeg::check_ffmpeg_available()
        .await
        .map_err(WorkerError::FfmpegUnavailable)
}

pub struct Worker<P> {
    config: WorkerConfig,
    metrics: Arc<TranscodeMetrics>,
    skip: SkipEvaluator<P>,
    prober: P,
    jellyfin: Option<JellyfinClient>,
    encoder_command: Option<(String, Vec<String>)>,
    cancel: CancellationToken,
}

impl<P: SubtitleProber + Clone> Worker<P> {
    pub fn new(
        config: WorkerConfig,
        pool: DbPool,
        metrics: Arc<TranscodeMetrics>,
        prober: P,
        cancel: CancellationToken,
    ) -> WorkerResult<Self> {
        let jellyfin = if config.jellyfin_enabled() {
            Some(JellyfinClient::new(&config.jellyfin_url, &config.jellyfin_api_key)?)
        } else {
            None
        };

        Ok(Self {
            skip: SkipEvaluator::new(pool, prober.clone()),
            prober,
            config,
            metrics,
            jellyfin,
            encoder_command: None,
            cancel,
        })
    }

    /// Run `program leading_args... <ffmpeg args>` instead of ffmpeg.
    ///
    /// Only meant for tests that substitute a fake encoder; the daemon always
    /// runs `ffmpeg` from `PATH`.
    #[doc(hidden)]
    pub fn with_encoder_command(
        mut self,
        program: impl Into<String>,
        leading_args: Vec<String>,
    ) -> Self {
        self.encoder_command = Some((program.into(), leading_args));
        self
    }

    /// Run until cancelled.
    pub async fn run(&self) {
        self.metrics.reset_activity();

        let input_dir = self.config.input_dir.clone();
        let cleanup =
            tokio::task::spawn_blocking(move || scanner::cleanup_bad_transcodes(&input_dir)).await;
        match cleanup {
            Ok(Ok(deleted)) if !deleted.is_empty() => {
                tracing::info!(count = deleted.len(), "Removed bad transcodes on startup");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to clean up bad transcodes on startup");
            }
            Err(e) => tracing::error!(error = %e, "Bad transcode cleanup task failed"),
        }

        while !self.cancel.is_cancelled() {
            if self.process_next().await {
                self.refresh_jellyfin().await;
                self.sleep(BUSY_INTERVAL).await;
            } else {
                tracing::info!(
                    secs = IDLE_INTERVAL.as_secs(),
                    "No files to process, sleeping"
                );
                self.sleep(IDLE_INTERVAL).await;
            }
        }

        tracing::info!("Shutdown requested, cleaning up");
        self.metrics.reset_activity();
    }

    /// Sleep for `duration` or until cancelled, whichever comes first.
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(duration) => {}
        }
    }

    /// Classify every source file in the library.
    ///
    /// Files with an existing transcode are counted only in the total. A
    /// skip evaluation that fails on the database leaves the file pending.
    pub async fn scan(&self) -> WorkerResult<ScanResult> {
        let input_dir = self.config.input_dir.clone();
        let sources =
            tokio::task::spawn_blocking(move || scanner::find_source_files(&input_dir)).await?;

        let mut result = ScanResult {
            total: sources.len(),
            ..Default::default()
        };

        for source in sources {
            if self.cancel.is_cancelled() {
                break;
            }
            if scanner::has_transcode(&source) {
                continue;
            }
            match self.skip.should_skip(&source).await {
                Ok(true) => result.skipped.push(source),
                Ok(false) => result.pending.push(source),
                Err(e) => {
                    tracing::error!(
                        path = %source.display(),
                        error = %e,
                        "Failed to evaluate subtitles"
                    );
                    result.pending.push(source);
                }
            }
        }

        Ok(result)
    }

    /// Run one cycle. Returns `true` when a file was processed.
    pub async fn process_next(&self) -> bool {
        let scan = match self.scan().await {
            Ok(scan) => scan,
            Err(e) => {
                tracing::error!(error = %e, "Library scan failed");
                return false;
            }
        };

        self.metrics.record_scan(scan.counts());

        if scan.pending.is_empty() || self.cancel.is_cancelled() {
            return false;
        }

        tracing::info!(count = scan.pending.len(), "Found files to process");
        let Some(pick) = scan.pending.choose(&mut rand::rng()).cloned() else {
            return false;
        };
        tracing::info!(path = %pick.display(), "Picked random file");

        self.process_file(&pick).await;
        true
    }

    /// Transcode a single file, cleaning up partial output on failure.
    pub async fn process_file(&self, source: &Path) -> FileOutcome {
        let display_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.metrics.set_state(WorkerState::Processing);
        self.metrics.set_current_file(&display_name);

        tracing::info!(file = %display_name, "Processing started");
        let outcome = match self.transcode(source).await {
            Ok(()) => {
                tracing::info!(file = %display_name, "Finished processing");
                FileOutcome::Transcoded
            }
            Err(WorkerError::Encode(EncodeError::Interrupted)) => {
                tracing::warn!(
                    file = %display_name,
                    "Processing interrupted, removing partial transcode"
                );
                self.discard_partial(source);
                FileOutcome::Interrupted
            }
            Err(e) => {
                tracing::error!(file = %display_name, error = %e, "Error processing file");
                self.discard_partial(source);
                FileOutcome::Failed
            }
        };

        self.metrics.record_attempt_finished();
        self.metrics.reset_activity();
        outcome
    }

    async fn transcode(&self, source: &Path) -> WorkerResult<()> {
        let target = naming::transcode_target(source)?;

        let subtitle_indices = if self.config.subtitle_limit > 0 {
            let streams = self.prober.probe(source).await.map_err(WorkerError::Probe)?;
            let selected = ffmpeg::select_burn_in_streams(&streams, self.config.subtitle_limit);
            tracing::info!(streams = ?selected, "Subtitle streams selected for burn-in");
            selected
        } else {
            Vec::new()
        };

        let args = ffmpeg::build_vaapi_args(
            source,
            &target,
            &subtitle_indices,
            &self.config.render_device.to_string_lossy(),
        );
        let mut job = EncodeJob::ffmpeg(args, &self.config.libva_driver);
        if let Some((program, leading_args)) = &self.encoder_command {
            job.program.clone_from(program);
            job.args.splice(0..0, leading_args.iter().cloned());
        }

        encoder::run(&job, &self.cancel).await?;
        Ok(())
    }

    fn discard_partial(&self, source: &Path) {
        if let Err(e) = scanner::delete_transcode(source) {
            tracing::error!(
                path = %source.display(),
                error = %e,
                "Failed to delete partial transcode"
            );
        }
    }

    async fn refresh_jellyfin(&self) {
        let Some(client) = &self.jellyfin else {
            return;
        };
        tracing::info!("Updating Jellyfin libraries");
        match client.refresh_all_libraries().await {
            Ok(count) => tracing::debug!(count, "Jellyfin refresh requests sent"),
            Err(e) => tracing::error!(error = %e, "Failed to update Jellyfin libraries"),
        }
    }
}
