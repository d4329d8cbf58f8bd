//! Shared helpers for worker integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use transcoder_core::ffmpeg::{FfmpegError, FfprobeStream, FfprobeStreamTags};
use transcoder_db::DbPool;
use transcoder_worker::config::WorkerConfig;
use transcoder_worker::skip::SubtitleProber;

/// Create a migrated pool inside `dir`.
pub async fn test_pool(dir: &Path) -> DbPool {
    let pool = transcoder_db::create_pool(&dir.join("skip_tracker.sqlite3"))
        .await
        .expect("pool should open");
    transcoder_db::run_migrations(&pool)
        .await
        .expect("migrations should apply");
    pool
}

/// Worker configuration pointing at `library` with the metrics server and
/// Jellyfin disabled.
pub fn test_config(library: &Path, state_dir: &Path) -> WorkerConfig {
    WorkerConfig {
        input_dir: library.to_path_buf(),
        jellyfin_url: "http://127.0.0.1:1".to_string(),
        jellyfin_api_key: String::new(),
        metrics_port: 0,
        render_device: PathBuf::from("/dev/null"),
        skip_db_path: state_dir.join("skip_tracker.sqlite3"),
        libva_driver: "radeonsi".to_string(),
        subtitle_limit: 3,
    }
}

pub fn subtitle(
    index: i32,
    codec: &str,
    language: Option<&str>,
    title: Option<&str>,
) -> FfprobeStream {
    FfprobeStream {
        index: Some(index),
        codec_name: Some(codec.to_string()),
        codec_type: Some("subtitle".to_string()),
        tags: Some(FfprobeStreamTags {
            language: language.map(str::to_string),
            title: title.map(str::to_string),
        }),
    }
}

/// Prober returning a fixed answer and counting its calls. Answers can be
/// overridden per file name.
#[derive(Clone, Default)]
pub struct FakeProber {
    streams: Arc<Mutex<Option<Vec<FfprobeStream>>>>,
    by_name: Arc<Mutex<HashMap<String, Vec<FfprobeStream>>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeProber {
    pub fn returning(streams: Vec<FfprobeStream>) -> Self {
        let prober = Self::default();
        prober.set(Some(streams));
        prober
    }

    pub fn failing() -> Self {
        Self::default()
    }

    /// `None` makes every probe fail.
    pub fn set(&self, streams: Option<Vec<FfprobeStream>>) {
        *self.streams.lock().unwrap() = streams;
    }

    pub fn set_for(&self, file_name: &str, streams: Vec<FfprobeStream>) {
        self.by_name
            .lock()
            .unwrap()
            .insert(file_name.to_string(), streams);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SubtitleProber for FakeProber {
    async fn probe(&self, path: &Path) -> Result<Vec<FfprobeStream>, FfmpegError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        if let Some(streams) = self.by_name.lock().unwrap().get(&name) {
            return Ok(streams.clone());
        }
        let streams = self.streams.lock().unwrap().clone();
        streams.ok_or_else(|| FfmpegError::ParseError("probe failed".to_string()))
    }
}

pub fn touch(path: &Path, bytes: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, vec![0u8; bytes]).unwrap();
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
