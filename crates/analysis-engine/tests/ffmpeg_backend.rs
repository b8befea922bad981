//! The ffmpeg backend against clips rendered by ffmpeg itself.
//!
//! Every test returns early when `ffmpeg` or `ffprobe` is not installed.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use ghosttrail_analysis::backend::ffmpeg::command_exists;
use ghosttrail_analysis::backend::{FfmpegDecoder, FfprobeAsset};
use ghosttrail_analysis::{AnalysisSession, FrameDecoder, FrameSink};
use ghosttrail_common::clock::ManualClock;
use ghosttrail_common::config::{AnalysisConfig, AppConfig};
use ghosttrail_common::logging::init_test_logging;
use ghosttrail_model::decode::DecodeError;
use ghosttrail_model::frame::{Frame, FrameSize};
use ghosttrail_model::state::AnalysisState;
use ghosttrail_model::time::SampleTime;

/// Render two seconds of the lavfi `source` at 64x48, 10 fps.
fn render_clip(name: &str, source: &str) -> Option<PathBuf> {
    if !command_exists("ffmpeg") || !command_exists("ffprobe") {
        eprintln!("ffmpeg not installed, skipping");
        return None;
    }
    let dir = std::env::temp_dir().join(format!("ghosttrail-ffmpeg-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}.mp4"));
    let separator = if source.contains('=') { ':' } else { '=' };

    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("{source}{separator}size=64x48:rate=10:duration=2"))
        .args(["-c:v", "mpeg4", "-q:v", "2", "-pix_fmt", "yuv420p"])
        .arg(&path)
        .stdin(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success(), "could not render {source}");
    Some(path)
}

/// `count` times a tenth of a second apart, on a 600 tick timescale.
fn times(count: i64) -> Vec<SampleTime> {
    (0..count).map(|i| SampleTime::new(i * 60, 600)).collect()
}

fn collecting_sink() -> (
    FrameSink,
    mpsc::UnboundedReceiver<(SampleTime, Result<Frame, DecodeError>)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = FrameSink::from_fn(move |time, result| {
        let _ = tx.send((time, result));
    });
    (sink, rx)
}

async fn collect(
    rx: &mut mpsc::UnboundedReceiver<(SampleTime, Result<Frame, DecodeError>)>,
    count: usize,
) -> Vec<(SampleTime, Result<Frame, DecodeError>)> {
    let mut results = Vec::with_capacity(count);
    while results.len() < count {
        let next = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("decoder stopped delivering");
        results.push(next.expect("sink dropped early"));
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn extracted_frames_are_abgr_words() {
    let Some(clip) = render_clip("red", "color=c=red") else {
        return;
    };
    let decoder = FfmpegDecoder::on_current_runtime(&clip, &AnalysisConfig::default()).unwrap();
    let (sink, mut rx) = collecting_sink();

    let requested = times(3);
    decoder.request_frames(&requested, FrameSize::new(16, 12), sink);
    let mut results = collect(&mut rx, 3).await;
    results.sort_by_key(|(time, _)| *time);

    for ((time, result), expected) in results.into_iter().zip(requested) {
        assert_eq!(time, expected);
        let frame = result.unwrap();
        assert_eq!(frame.size(), FrameSize::new(16, 12));
        assert_eq!(frame.as_bytes().len(), 16 * 12 * 4);

        let pixel = frame.pixels().nth(16 * 6 + 8).unwrap();
        assert_eq!(pixel.alpha(), 255);
        assert!(pixel.red() > 200, "{pixel:?}");
        assert!(pixel.green() < 60, "{pixel:?}");
        assert!(pixel.blue() < 60, "{pixel:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_all_resolves_queued_requests_as_cancelled() {
    let Some(clip) = render_clip("cancel", "testsrc") else {
        return;
    };
    let config = AnalysisConfig {
        decode_concurrency: 1,
        ..AnalysisConfig::default()
    };
    let decoder = FfmpegDecoder::on_current_runtime(&clip, &config).unwrap();
    let (sink, mut rx) = collecting_sink();

    decoder.request_frames(&times(16), FrameSize::new(32, 24), sink);
    decoder.cancel_all();

    let results = collect(&mut rx, 16).await;
    let cancelled = results
        .iter()
        .filter(|(_, result)| matches!(result, Err(DecodeError::Cancelled)))
        .count();
    // One extraction may already hold the only permit.
    assert!(cancelled >= 15, "only {cancelled} of 16 were cancelled");

    // Requests queued after the cancel are served again.
    let (sink, mut rx) = collecting_sink();
    decoder.request_frames(&times(1), FrameSize::new(32, 24), sink);
    let (_, result) = collect(&mut rx, 1).await.remove(0);
    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn slow_delivery_does_not_stall_the_runtime() {
    let Some(clip) = render_clip("slow", "color=c=blue") else {
        return;
    };
    let decoder = FfmpegDecoder::on_current_runtime(&clip, &AnalysisConfig::default()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = FrameSink::from_fn(move |time, _| {
        std::thread::sleep(Duration::from_millis(300));
        let _ = tx.send(time);
    });
    decoder.request_frames(&times(2), FrameSize::new(16, 12), sink);

    // On this single-threaded runtime the ticker only runs while nothing
    // blocks the thread.
    let mut longest_gap = Duration::ZERO;
    let mut last_tick = Instant::now();
    let mut delivered = 0;
    let deadline = Instant::now() + Duration::from_secs(30);
    while delivered < 2 {
        assert!(Instant::now() < deadline, "frames never arrived");
        tokio::select! {
            Some(_) = rx.recv() => delivered += 1,
            () = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        let now = Instant::now();
        longest_gap = longest_gap.max(now - last_tick);
        last_tick = now;
    }
    assert!(
        longest_gap < Duration::from_millis(200),
        "runtime was blocked for {longest_gap:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_over_real_clip_completes() {
    init_test_logging();
    let Some(clip) = render_clip("session", "testsrc") else {
        return;
    };
    let mut config = AppConfig::default();
    config.analysis.max_samples = 4;
    config.analysis.decode_concurrency = 2;
    let decoder = FfmpegDecoder::on_current_runtime(&clip, &config.analysis).unwrap();
    let session = AnalysisSession::open(
        &FfprobeAsset::new(&clip),
        Arc::new(decoder),
        config,
        Arc::new(ManualClock::new()),
    );
    assert!(session.metadata_error().is_none(), "{:?}", session.metadata_error());
    assert_eq!(session.metadata().natural_size, FrameSize::new(64, 48));
    assert_eq!(session.max_frame_size(), FrameSize::new(32, 24));

    session.start(None).unwrap();
    let state = tokio::time::timeout(Duration::from_secs(60), session.wait_until_finished())
        .await
        .expect("session never finished");

    assert_eq!(state, AnalysisState::Complete);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.planned, 4);
    assert_eq!(snapshot.frames_applied, 4);
    assert_eq!(snapshot.frames_failed, 0);
    assert_eq!(
        session.latest_composite().unwrap().size(),
        FrameSize::new(32, 24)
    );
    assert!(session.encode_png().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_session_drops_late_extractions() {
    let Some(clip) = render_clip("session-cancel", "testsrc") else {
        return;
    };
    let mut config = AppConfig::default();
    config.analysis.max_samples = 12;
    config.analysis.decode_concurrency = 1;
    let decoder = FfmpegDecoder::on_current_runtime(&clip, &config.analysis).unwrap();
    let session = AnalysisSession::open(
        &FfprobeAsset::new(&clip),
        Arc::new(decoder),
        config,
        Arc::new(ManualClock::new()),
    );

    session.start(None).unwrap();
    session.cancel().unwrap();
    let at_cancel = session.snapshot();

    // Give every spawned extraction time to resolve and deliver.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let after = session.snapshot();
    assert_eq!(after.state, AnalysisState::Cancelled);
    assert_eq!(after.frames_applied, at_cancel.frames_applied);
    assert_eq!(after.frames_failed, at_cancel.frames_failed);
    assert_eq!(after.progress, at_cancel.progress);
}
