//! Domain logic shared by the transcoder binaries: naming rules, ffprobe
//! parsing, subtitle selection and ffmpeg argument construction.

pub mod error;
pub mod ffmpeg;
pub mod metric_names;
pub mod naming;
