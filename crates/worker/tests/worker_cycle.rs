//! End-to-end worker cycles with a fake prober and a shell script standing in
//! for ffmpeg.
#![cfg(unix)]

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{subtitle, test_config, test_pool, touch, FakeProber};
use tokio_util::sync::CancellationToken;
use transcoder_worker::metrics::{TranscodeMetrics, WorkerState};
use transcoder_worker::worker::{FileOutcome, Worker};

/// Writes 500 bytes to the last argument (the output path), like a
/// successful transcode.
const ENCODE_OK: &str = r#"for last; do :; done
printf 'frame=1\nprogress=end\n'
printf '%0500d' 0 > "$last""#;

/// Leaves a partial output behind and fails.
const ENCODE_FAIL: &str = r#"for last; do :; done; printf 'x' > "$last"; exit 1"#;

/// Leaves a partial output behind and blocks.
const ENCODE_HANG: &str = r#"for last; do :; done; printf 'x' > "$last"; sleep 30"#;

struct Harness {
    _state: tempfile::TempDir,
    library: tempfile::TempDir,
    metrics: Arc<TranscodeMetrics>,
    prober: FakeProber,
    cancel: CancellationToken,
    worker: Worker<FakeProber>,
}

async fn harness(prober: FakeProber, script: &str) -> Harness {
    let state = tempfile::tempdir().unwrap();
    let library = tempfile::tempdir().unwrap();
    let pool = test_pool(state.path()).await;
    let metrics = Arc::new(TranscodeMetrics::new());
    let cancel = CancellationToken::new();

    let worker = Worker::new(
        test_config(library.path(), state.path()),
        pool,
        Arc::clone(&metrics),
        prober.clone(),
        cancel.clone(),
    )
    .unwrap()
    .with_encoder_command("sh", vec!["-c".into(), script.into(), "fake-ffmpeg".into()]);

    Harness {
        _state: state,
        library,
        metrics,
        prober,
        cancel,
        worker,
    }
}

fn image_subs() -> Vec<transcoder_core::ffmpeg::FfprobeStream> {
    vec![subtitle(3, "hdmv_pgs_subtitle", Some("eng"), None)]
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Test: scan classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scan_partitions_library() {
    let prober = FakeProber::returning(image_subs());
    let h = harness(prober, ENCODE_OK).await;
    let lib = h.library.path();

    touch(&lib.join("Done.mkv"), 10);
    touch(&lib.join("Done - Transcoded.mkv"), 500);
    touch(&lib.join("Text.mkv"), 10);
    touch(&lib.join("Season 1/Ep1 - Original.mp4"), 10);
    touch(&lib.join("notes.txt"), 10);
    h.prober.set_for("Text.mkv", vec![subtitle(2, "subrip", Some("eng"), None)]);

    let scan = h.worker.scan().await.unwrap();

    assert_eq!(scan.total, 3);
    assert_eq!(scan.skipped.iter().map(|p| file_name(p)).collect::<Vec<_>>(), vec!["Text.mkv"]);
    assert_eq!(
        scan.pending.iter().map(|p| file_name(p)).collect::<Vec<_>>(),
        vec!["Ep1 - Original.mp4"]
    );
    let counts = scan.counts();
    assert_eq!(
        (counts.total, counts.to_process, counts.skipped, counts.transcoded()),
        (3, 1, 1, 1)
    );
}

#[tokio::test]
async fn nothing_pending_reports_idle_cycle() {
    let h = harness(FakeProber::returning(vec![]), ENCODE_OK).await;
    touch(&h.library.path().join("A.mkv"), 10);
    touch(&h.library.path().join("A - Transcoded.mkv"), 500);

    assert!(!h.worker.process_next().await);
    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.total_files, 1);
    assert_eq!(snapshot.files_to_process, 0);
    assert_eq!(snapshot.files_transcoded, 1);
}

// ---------------------------------------------------------------------------
// Test: processing a file
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_encode_writes_target_and_updates_metrics() {
    let h = harness(FakeProber::returning(image_subs()), ENCODE_OK).await;
    let source = h.library.path().join("Movie - Original.mkv");
    touch(&source, 10);

    assert!(h.worker.process_next().await);

    let target = h.library.path().join("Movie - Transcoded.mkv");
    assert_eq!(std::fs::metadata(&target).unwrap().len(), 500);
    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.files_to_process, 0);
    assert_eq!(snapshot.files_transcoded, 1);
    assert_eq!(h.metrics.state(), WorkerState::Idle);
    assert_eq!(h.metrics.current_file(), "");
}

#[tokio::test]
async fn failed_encode_removes_partial_output() {
    let h = harness(FakeProber::returning(image_subs()), ENCODE_FAIL).await;
    let source = h.library.path().join("Movie.mp4");
    touch(&source, 10);

    assert_eq!(h.worker.process_file(&source).await, FileOutcome::Failed);
    assert!(!h.library.path().join("Movie - Transcoded.mkv").exists());
    assert_eq!(h.metrics.state(), WorkerState::Idle);
}

#[tokio::test]
async fn probe_failure_fails_the_file() {
    let h = harness(FakeProber::failing(), ENCODE_OK).await;
    let source = h.library.path().join("Movie.mkv");
    touch(&source, 10);

    assert_eq!(h.worker.process_file(&source).await, FileOutcome::Failed);
    assert!(!h.library.path().join("Movie - Transcoded.mkv").exists());
}

#[tokio::test]
async fn shutdown_interrupts_encode_and_cleans_up() {
    let h = harness(FakeProber::returning(image_subs()), ENCODE_HANG).await;
    let source = h.library.path().join("Movie.mkv");
    touch(&source, 10);

    let trigger = h.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(10), h.worker.process_file(&source))
        .await
        .expect("encode should stop after cancellation");
    assert_eq!(outcome, FileOutcome::Interrupted);
    assert!(!h.library.path().join("Movie - Transcoded.mkv").exists());
}

// ---------------------------------------------------------------------------
// Test: run loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_cleans_bad_transcodes_and_stops_when_cancelled() {
    let h = harness(FakeProber::returning(image_subs()), ENCODE_OK).await;
    touch(&h.library.path().join("A.mkv"), 10);
    touch(&h.library.path().join("A - Transcoded.mkv"), 20);
    h.cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), h.worker.run())
        .await
        .expect("run should return once cancelled");

    assert!(!h.library.path().join("A - Transcoded.mkv").exists());
    assert_eq!(h.metrics.state(), WorkerState::Idle);
}

#[tokio::test]
async fn run_processes_then_idles_until_cancelled() {
    let h = harness(FakeProber::returning(image_subs()), ENCODE_OK).await;
    touch(&h.library.path().join("A.mkv"), 10);

    let trigger = h.cancel.clone();
    let metrics = Arc::clone(&h.metrics);
    tokio::spawn(async move {
        for _ in 0..200 {
            if metrics.snapshot().files_transcoded == 1 && metrics.state() == WorkerState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        trigger.cancel();
    });

    tokio::time::timeout(Duration::from_secs(10), h.worker.run())
        .await
        .expect("run should return once cancelled");
    assert!(h.library.path().join("A - Transcoded.mkv").exists());
}
