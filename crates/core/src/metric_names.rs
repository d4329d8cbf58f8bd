//! Prometheus metric names exported by the worker.
//!
//! Kept in one place so the exporter, dashboards and tests agree on the
//! exact spelling.

/// Number of source files found by the last scan.
pub const TOTAL_FILES: &str = "transcode_total_files";

/// Source files that still need a transcode.
pub const FILES_TO_PROCESS: &str = "transcode_total_files_to_process";

/// Source files with an existing transcode (or processed this session).
pub const FILES_TRANSCODED: &str = "transcode_total_files_transcoded";

/// Source files skipped because their subtitles are browser-readable.
pub const FILES_SKIPPED: &str = "transcode_total_files_skipped";

/// Enum metric for the worker state (`idle` / `processing`).
pub const CURRENT_STATE: &str = "transcode_current_state";

/// Info metric carrying the file currently being processed.
pub const CURRENT_FILE: &str = "transcode_current_file";
