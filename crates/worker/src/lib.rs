//! `transcoder-worker` -- background VAAPI transcoder for a Jellyfin library.
//!
//! Scans the library for `.mp4` / `.mkv` sources, burns the preferred
//! subtitle streams into an HEVC VAAPI transcode next to each source and
//! asks Jellyfin to rescan afterwards. Sources whose subtitles are all text
//! based are skipped and remembered in a SQLite skip tracker.

pub mod cli;
pub mod commands;
pub mod config;
pub mod encoder;
pub mod error;
pub mod jellyfin;
pub mod metrics;
pub mod scanner;
pub mod server;
pub mod shutdown;
pub mod skip;
pub mod worker;
