//! FFmpeg/FFprobe command construction and output parsing.
//!
//! Everything here is deterministic except [`probe_subtitle_streams`] and
//! [`check_ffmpeg_available`], which shell out to the binaries on `PATH`.

use std::path::Path;

use serde::Deserialize;

/// Subtitle codecs that browsers render natively. Files whose subtitles are
/// all in this set are served as-is and never transcoded.
pub const TEXT_SUBTITLE_CODECS: [&str; 6] = ["subrip", "srt", "webvtt", "ass", "ssa", "text"];

/// Case-insensitive fragments of subtitle titles that are never burned in
/// (karaoke / song lyric tracks).
pub const EXCLUDED_SUBTITLE_TITLES: [&str; 2] = ["sing", "song"];

/// Default maximum number of subtitle streams burned into separate video
/// outputs.
pub const DEFAULT_SUBTITLE_LIMIT: usize = 3;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output for a `-select_streams s` query.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeStream {
    pub index: Option<i32>,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub tags: Option<FfprobeStreamTags>,
}

/// Tags on an ffprobe stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeStreamTags {
    pub language: Option<String>,
    pub title: Option<String>,
}

impl FfprobeStream {
    fn language(&self) -> Option<&str> {
        self.tags.as_ref().and_then(|t| t.language.as_deref())
    }

    fn title(&self) -> &str {
        self.tags
            .as_ref()
            .and_then(|t| t.title.as_deref())
            .unwrap_or_default()
    }

    /// Lowercased codec name, empty when ffprobe omitted it.
    pub fn codec(&self) -> String {
        self.codec_name.as_deref().unwrap_or_default().to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

/// Arguments (excluding the program name) for the subtitle stream probe.
pub fn subtitle_probe_args(path: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-analyzeduration",
        "50G",
        "-probesize",
        "50M",
        "-select_streams",
        "s",
        "-show_entries",
        "stream=index,codec_name,codec_type:stream_tags=language,title",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(path.to_string_lossy().into_owned());
    args
}

/// Parse the stdout of the subtitle probe. Empty output means no streams.
pub fn parse_subtitle_probe(stdout: &str) -> Result<Vec<FfprobeStream>, FfmpegError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<FfprobeOutput>(trimmed)
        .map(|out| out.streams)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {trimmed}")))
}

/// Run `ffprobe` and return the subtitle streams of a media file.
pub async fn probe_subtitle_streams(path: &Path) -> Result<Vec<FfprobeStream>, FfmpegError> {
    let output = tokio::process::Command::new("ffprobe")
        .args(subtitle_probe_args(path))
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_subtitle_probe(&String::from_utf8_lossy(&output.stdout))
}

/// Verify that `ffmpeg` can be executed at all.
pub async fn check_ffmpeg_available() -> Result<(), FfmpegError> {
    tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|_| ())
        .map_err(FfmpegError::NotFound)
}

// ---------------------------------------------------------------------------
// Subtitle classification and selection
// ---------------------------------------------------------------------------

/// Whether a codec name belongs to [`TEXT_SUBTITLE_CODECS`].
pub fn is_text_subtitle(codec: &str) -> bool {
    let codec = codec.to_lowercase();
    TEXT_SUBTITLE_CODECS.contains(&codec.as_str())
}

/// What the subtitle streams of a file mean for transcoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleClass {
    /// The file has no subtitle streams.
    None,
    /// Every subtitle stream is text based. Carries the sorted, deduplicated
    /// codec names.
    TextOnly(Vec<String>),
    /// At least one image based subtitle stream needs burning in.
    NeedsBurnIn,
}

pub fn classify_subtitles(streams: &[FfprobeStream]) -> SubtitleClass {
    if streams.is_empty() {
        return SubtitleClass::None;
    }

    let mut codecs = Vec::with_capacity(streams.len());
    for stream in streams {
        let codec = stream.codec();
        if !is_text_subtitle(&codec) {
            return SubtitleClass::NeedsBurnIn;
        }
        codecs.push(codec);
    }

    codecs.sort();
    codecs.dedup();
    SubtitleClass::TextOnly(codecs)
}

/// Ordering key for subtitle languages: English first, then undetermined,
/// then everything else.
fn language_rank(stream: &FfprobeStream) -> u8 {
    match stream.language() {
        Some("eng") => 0,
        Some("und") => 1,
        _ => 2,
    }
}

fn is_excluded_title(stream: &FfprobeStream) -> bool {
    let title = stream.title().to_lowercase();
    EXCLUDED_SUBTITLE_TITLES
        .iter()
        .any(|fragment| title.contains(fragment))
}

/// Pick the subtitle stream indices to burn in, best first, at most `limit`.
pub fn select_burn_in_streams(streams: &[FfprobeStream], limit: usize) -> Vec<i32> {
    let mut kept: Vec<&FfprobeStream> = streams
        .iter()
        .filter(|s| !is_excluded_title(s))
        .collect();
    // `sort_by_key` is stable, so equal ranks keep container order.
    kept.sort_by_key(|s| language_rank(s));
    kept.into_iter()
        .filter_map(|s| s.index)
        .take(limit)
        .collect()
}

// ---------------------------------------------------------------------------
// Encoder command
// ---------------------------------------------------------------------------

/// AMF/VAAPI `compression_level` value: VBAQ enabled, speed preset, with
/// the validity bit set.
pub fn compression_level() -> u32 {
    const VBAQ: u32 = 16;
    const SPEED_PRESET: u32 = 0;

    ((VBAQ + SPEED_PRESET) << 1) | 1
}

/// Filter chain and output label for burning subtitle stream `stream_index`
/// into output number `output`.
fn burn_in_chain(output: usize, stream_index: i32) -> String {
    format!(
        "[0:v][0:{stream_index}]overlay[burned_{output}];\
         [burned_{output}]format=nv12,hwupload[v_out{output}]"
    )
}

/// Build the full ffmpeg argument list (excluding the program name) for a
/// VAAPI HEVC transcode that burns in the given subtitle streams.
///
/// Every selected subtitle produces its own video output. Without any
/// selected subtitles the source video is mapped directly.
pub fn build_vaapi_args(
    input: &Path,
    output: &Path,
    subtitle_indices: &[i32],
    render_device: &str,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-stats_period".into(),
        "5".into(),
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
        "-analyzeduration".into(),
        "20G".into(),
        "-probesize".into(),
        "20M".into(),
        "-init_hw_device".into(),
        format!("vaapi=va:{render_device}"),
        "-hwaccel_output_format".into(),
        "vaapi".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
    ];

    if subtitle_indices.is_empty() {
        args.extend(["-map".into(), "0:v".into()]);
    } else {
        let chains: Vec<String> = subtitle_indices
            .iter()
            .enumerate()
            .map(|(i, idx)| burn_in_chain(i, *idx))
            .collect();
        args.extend(["-filter_complex".into(), chains.join(";")]);
        for i in 0..subtitle_indices.len() {
            args.extend(["-map".into(), format!("[v_out{i}]")]);
        }
    }

    args.extend(
        [
            "-map",
            "0:a",
            "-c:v",
            "hevc_vaapi",
            "-qp",
            "22",
            "-rc_mode",
            "CQP",
            "-compression_level",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(compression_level().to_string());
    args.extend(["-c:a".into(), "libvorbis".into()]);
    args.push(output.to_string_lossy().into_owned());
    args
}

// ---------------------------------------------------------------------------
// Progress output
// ---------------------------------------------------------------------------

/// One `key=value` line of ffmpeg's `-progress` output that we care about.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Frame(u64),
    Fps(f64),
    OutTime(String),
    Speed(String),
    /// `progress=continue` or `progress=end`; `true` for `end`.
    Status { finished: bool },
}

impl ProgressUpdate {
    /// Parse a single progress line, ignoring keys not modelled here.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key.trim() {
            "frame" => value.parse().ok().map(Self::Frame),
            "fps" => value.parse().ok().map(Self::Fps),
            "out_time" => Some(Self::OutTime(value.to_string())),
            "speed" => Some(Self::Speed(value.to_string())),
            "progress" => Some(Self::Status {
                finished: value == "end",
            }),
            _ => None,
        }
    }
}
