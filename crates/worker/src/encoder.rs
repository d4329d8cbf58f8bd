//! Runs ffmpeg for a single transcode and handles cancellation.
//!
//! ffmpeg is started in its own process group so a shutdown can signal the
//! whole tree (hardware helpers included). On cancellation the group gets
//! SIGTERM, then SIGKILL if it has not exited within the grace period.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use transcoder_core::ffmpeg::ProgressUpdate;

/// How long ffmpeg gets to exit after SIGTERM before it is killed.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while waiting for encoder: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder exited with non-zero status {exit_code:?}")]
    Failed { exit_code: Option<i32> },

    #[error("transcode interrupted by shutdown")]
    Interrupted,
}

/// A fully specified encoder invocation.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl EncodeJob {
    /// An ffmpeg invocation with the VAAPI driver selected.
    pub fn ffmpeg(args: Vec<String>, libva_driver: &str) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            args,
            env: vec![("LIBVA_DRIVER_NAME".to_string(), libva_driver.to_string())],
        }
    }
}

/// Run `job` to completion or until `cancel` fires.
pub async fn run(job: &EncodeJob, cancel: &CancellationToken) -> Result<(), EncodeError> {
    run_with_grace(job, cancel, TERMINATION_GRACE).await
}

/// [`run`] with a configurable termination grace period.
pub async fn run_with_grace(
    job: &EncodeJob,
    cancel: &CancellationToken,
    grace: Duration,
) -> Result<(), EncodeError> {
    let command = format!("{} {}", job.program, job.args.join(" "));
    tracing::info!(command = %command, "Starting encoder");

    let mut cmd = Command::new(&job.program);
    cmd.args(&job.args)
        .envs(job.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| EncodeError::Spawn {
        program: job.program.clone(),
        source,
    })?;

    let progress_task = child
        .stdout
        .take()
        .map(|stdout| tokio::spawn(log_progress(stdout)));

    let outcome = tokio::select! {
        status = child.wait() => status.map_err(EncodeError::from).and_then(check_status),
        () = cancel.cancelled() => {
            tracing::warn!("Shutdown detected, terminating encoder");
            terminate(&mut child, grace).await;
            Err(EncodeError::Interrupted)
        }
    };

    if let Some(task) = progress_task {
        let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
    }

    outcome
}

fn check_status(status: ExitStatus) -> Result<(), EncodeError> {
    if status.success() {
        Ok(())
    } else {
        Err(EncodeError::Failed {
            exit_code: status.code(),
        })
    }
}

/// SIGTERM the child's process group, escalate to SIGKILL after `grace`.
async fn terminate(child: &mut Child, grace: Duration) {
    signal_group(child, Signal::Term);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(?status, "Encoder exited after SIGTERM");
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed waiting for encoder after SIGTERM");
        }
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Encoder did not exit after SIGTERM, sending SIGKILL"
            );
            signal_group(child, Signal::Kill);
            let _ = child.wait().await;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &mut Child, signal: Signal) {
    let Some(pid) = child.id() else {
        return;
    };
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // Safety: kill(2) with a negative pid signals the process group led by
    // the child, which was spawned with `process_group(0)`.
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), sig) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pid, ?signal, error = %err, "Failed to signal encoder process group");
        }
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _signal: Signal) {
    let _ = child.start_kill();
}

/// Forward ffmpeg `-progress` output into the log.
async fn log_progress<R: AsyncRead + Unpin>(stdout: R) {
    let mut lines = BufReader::new(stdout).lines();
    let mut frame = 0u64;
    let mut fps = 0f64;
    let mut out_time = String::new();
    let mut speed = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        match ProgressUpdate::parse_line(&line) {
            Some(ProgressUpdate::Frame(f)) => frame = f,
            Some(ProgressUpdate::Fps(f)) => fps = f,
            Some(ProgressUpdate::OutTime(t)) => out_time = t,
            Some(ProgressUpdate::Speed(s)) => speed = s,
            Some(ProgressUpdate::Status { finished }) => {
                tracing::info!(
                    frame,
                    fps,
                    out_time = %out_time,
                    speed = %speed,
                    finished,
                    "Encoder progress"
                );
            }
            None => {}
        }
    }
}
