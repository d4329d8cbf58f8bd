//! In-process metrics registry with Prometheus text exposition.
//!
//! Gauges are plain atomics; the state enum and the current-file info metric
//! are rendered in the same shape `prometheus_client` produces for `Enum`
//! and `Info` metrics so existing dashboards keep working.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::RwLock;

use transcoder_core::metric_names::{
    CURRENT_FILE, CURRENT_STATE, FILES_SKIPPED, FILES_TO_PROCESS, FILES_TRANSCODED, TOTAL_FILES,
};

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// What the worker is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Processing,
}

impl WorkerState {
    pub const ALL: [WorkerState; 2] = [WorkerState::Idle, WorkerState::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Processing => "processing",
        }
    }
}

/// Counts produced by one library scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub total: usize,
    pub to_process: usize,
    pub skipped: usize,
}

impl ScanCounts {
    /// Files that are neither pending nor skipped already have a transcode.
    pub fn transcoded(&self) -> usize {
        self.total.saturating_sub(self.to_process + self.skipped)
    }
}

/// Shared metrics for the transcoding worker.
#[derive(Debug)]
pub struct TranscodeMetrics {
    total_files: AtomicI64,
    files_to_process: AtomicI64,
    files_transcoded: AtomicI64,
    files_skipped: AtomicI64,
    processing: AtomicBool,
    current_file: RwLock<String>,
}

impl Default for TranscodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeMetrics {
    pub fn new() -> Self {
        Self {
            total_files: AtomicI64::new(0),
            files_to_process: AtomicI64::new(0),
            files_transcoded: AtomicI64::new(0),
            files_skipped: AtomicI64::new(0),
            processing: AtomicBool::new(false),
            current_file: RwLock::new(String::new()),
        }
    }

    /// Overwrite all gauges from a fresh scan.
    pub fn record_scan(&self, counts: ScanCounts) {
        self.total_files.store(counts.total as i64, Ordering::Relaxed);
        self.files_to_process
            .store(counts.to_process as i64, Ordering::Relaxed);
        self.files_skipped.store(counts.skipped as i64, Ordering::Relaxed);
        self.files_transcoded
            .store(counts.transcoded() as i64, Ordering::Relaxed);
    }

    /// Account for a finished attempt: one fewer pending file (never below
    /// zero) and one more transcoded file.
    pub fn record_attempt_finished(&self) {
        let _ = self
            .files_to_process
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                (v > 0).then(|| v - 1)
            });
        self.files_transcoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_state(&self, state: WorkerState) {
        self.processing
            .store(state == WorkerState::Processing, Ordering::Relaxed);
    }

    pub fn state(&self) -> WorkerState {
        if self.processing.load(Ordering::Relaxed) {
            WorkerState::Processing
        } else {
            WorkerState::Idle
        }
    }

    pub fn set_current_file(&self, name: &str) {
        match self.current_file.write() {
            Ok(mut guard) => {
                guard.clear();
                guard.push_str(name);
            }
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                guard.clear();
                guard.push_str(name);
            }
        }
    }

    pub fn current_file(&self) -> String {
        match self.current_file.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Return to `idle` with no current file.
    pub fn reset_activity(&self) {
        self.set_state(WorkerState::Idle);
        self.set_current_file("");
    }

    /// Point-in-time values of the scan gauges.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_files: self.total_files.load(Ordering::Relaxed),
            files_to_process: self.files_to_process.load(Ordering::Relaxed),
            files_transcoded: self.files_transcoded.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
        }
    }

    /// Format metrics in Prometheus exposition format.
    pub fn prometheus_exposition(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        write_gauge(&mut out, TOTAL_FILES, "Total number of files that exist", s.total_files);
        write_gauge(
            &mut out,
            FILES_TO_PROCESS,
            "Total number of files that still need to be processed",
            s.files_to_process,
        );
        write_gauge(
            &mut out,
            FILES_TRANSCODED,
            "Total number of files transcoded",
            s.files_transcoded,
        );
        write_gauge(
            &mut out,
            FILES_SKIPPED,
            "Total number of files skipped because subtitles are browser-readable",
            s.files_skipped,
        );

        let current = self.state();
        let _ = writeln!(out, "# HELP {CURRENT_STATE} Current state of the transcoder");
        let _ = writeln!(out, "# TYPE {CURRENT_STATE} gauge");
        for state in WorkerState::ALL {
            let value = if state == current { 1 } else { 0 };
            let _ = writeln!(
                out,
                "{CURRENT_STATE}{{{CURRENT_STATE}=\"{}\"}} {value}",
                state.as_str()
            );
        }

        let _ = writeln!(out, "# HELP {CURRENT_FILE}_info File currently being processed");
        let _ = writeln!(out, "# TYPE {CURRENT_FILE}_info gauge");
        let _ = writeln!(
            out,
            "{CURRENT_FILE}_info{{file=\"{}\"}} 1",
            escape_label_value(&self.current_file())
        );

        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_files: i64,
    pub files_to_process: i64,
    pub files_transcoded: i64,
    pub files_skipped: i64,
}

fn write_gauge(out: &mut String, name: &str, help: &str, value: i64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}

/// Escape a label value per the exposition format (`\`, `"` and newlines).
fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
