//! Probing and frame extraction through the ffmpeg command line tools.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};

use ghosttrail_common::config::AnalysisConfig;
use ghosttrail_common::error::{GhostTrailError, GhostTrailResult};
use ghosttrail_model::asset::AssetMetadata;
use ghosttrail_model::decode::DecodeError;
use ghosttrail_model::frame::{Frame, FrameSize};
use ghosttrail_model::time::SampleTime;

use crate::decoder::{AssetProbe, FrameDecoder, FrameSink};

/// Timescale assumed when the stream does not report a usable time base.
const FALLBACK_TIMESCALE: u32 = 600;

/// Whether `binary` can be found on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Reads asset metadata with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeAsset {
    path: PathBuf,
}

impl FfprobeAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AssetProbe for FfprobeAsset {
    fn probe(&self) -> GhostTrailResult<AssetMetadata> {
        if !self.path.exists() {
            return Err(GhostTrailError::FileNotFound {
                path: self.path.clone(),
            });
        }
        let file_size_bytes = std::fs::metadata(&self.path)?.len();

        let fields = run_ffprobe(&self.path)
            .and_then(|json| parse_probe_output(&json))
            .map_err(|e| GhostTrailError::metadata(format!("{e:#}")))?;

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            path = %self.path.display(),
            width = fields.width,
            height = fields.height,
            fps = fields.frame_rate,
            duration_secs = fields.duration_secs,
            "Probed asset"
        );

        Ok(AssetMetadata {
            name,
            file_size_bytes,
            duration_seconds: fields.duration_secs,
            timescale: fields.timescale,
            natural_size: FrameSize::new(fields.width, fields.height),
            nominal_frame_rate: fields.frame_rate,
        })
    }
}

fn run_ffprobe(path: &Path) -> anyhow::Result<String> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,time_base,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .context("failed to run ffprobe, is ffmpeg installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ffprobe failed: {}", stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    time_base: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct ProbeFields {
    width: u32,
    height: u32,
    frame_rate: f64,
    timescale: u32,
    duration_secs: f64,
}

fn parse_probe_output(json: &str) -> anyhow::Result<ProbeFields> {
    let output: ProbeOutput = serde_json::from_str(json).context("unexpected ffprobe output")?;
    let Some(stream) = output.streams.into_iter().next() else {
        bail!("no video stream found");
    };

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        bail!("video stream has no dimensions");
    };

    let frame_rate = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .filter_map(|rate| parse_rate(rate))
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);

    let timescale = stream
        .time_base
        .as_deref()
        .and_then(parse_timescale)
        .unwrap_or(FALLBACK_TIMESCALE);

    let duration_secs = output
        .format
        .and_then(|f| f.duration)
        .or(stream.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .context("could not determine duration")?;

    Ok(ProbeFields {
        width,
        height,
        frame_rate,
        timescale,
        duration_secs,
    })
}

/// Parse "30000/1001" or "25".
fn parse_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => raw.trim().parse().ok(),
    }
}

/// Ticks per second from a time base such as "1/600".
fn parse_timescale(raw: &str) -> Option<u32> {
    let (num, den) = raw.split_once('/')?;
    let num: u32 = num.trim().parse().ok()?;
    let den: u32 = den.trim().parse().ok()?;
    (num == 1 && den > 0).then_some(den)
}

/// Extracts single frames with one `ffmpeg` process per sample.
///
/// At most `concurrency` extractions run at once. Frames come back as raw
/// `abgr`, which is the little-endian byte order of [`Pixel`] words.
///
/// [`Pixel`]: ghosttrail_model::pixel::Pixel
pub struct FfmpegDecoder {
    path: PathBuf,
    runtime: Handle,
    permits: Arc<Semaphore>,
    /// Bumped by `cancel_all`; tasks started under an older value stop.
    cancel_epoch: watch::Sender<u64>,
}

impl FfmpegDecoder {
    pub fn new(
        path: impl Into<PathBuf>,
        concurrency: usize,
        runtime: Handle,
    ) -> GhostTrailResult<Self> {
        if !command_exists("ffmpeg") {
            return Err(GhostTrailError::decode("ffmpeg not found on PATH"));
        }
        let (cancel_epoch, _) = watch::channel(0);
        Ok(Self {
            path: path.into(),
            runtime,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            cancel_epoch,
        })
    }

    /// Size the extraction pool from `config.decode_concurrency`.
    pub fn from_config(
        path: impl Into<PathBuf>,
        config: &AnalysisConfig,
        runtime: Handle,
    ) -> GhostTrailResult<Self> {
        Self::new(path, config.decode_concurrency, runtime)
    }

    /// [`FfmpegDecoder::from_config`] on the runtime the caller is running in.
    pub fn on_current_runtime(
        path: impl Into<PathBuf>,
        config: &AnalysisConfig,
    ) -> GhostTrailResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| GhostTrailError::decode(format!("no tokio runtime: {e}")))?;
        Self::from_config(path, config, runtime)
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn request_frames(&self, times: &[SampleTime], max_size: FrameSize, sink: FrameSink) {
        let epoch = *self.cancel_epoch.borrow();
        tracing::debug!(
            count = times.len(),
            %max_size,
            path = %self.path.display(),
            "Queueing frame extractions"
        );

        for &time in times {
            let path = self.path.clone();
            let permits = Arc::clone(&self.permits);
            let mut cancelled = self.cancel_epoch.subscribe();
            let sink = sink.clone();

            self.runtime.spawn(async move {
                let work = async {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| DecodeError::Cancelled)?;
                    extract_frame(&path, time, max_size).await
                };
                let cancel = async move {
                    let _ = cancelled.wait_for(|current| *current != epoch).await;
                };
                // Dropping `work` kills the ffmpeg child.
                let result = tokio::select! {
                    result = work => result,
                    () = cancel => Err(DecodeError::Cancelled),
                };
                // Applying a frame takes the session lock and runs rayon work.
                let delivered = tokio::task::spawn_blocking(move || sink.deliver(time, result));
                if let Err(e) = delivered.await {
                    tracing::error!(%time, error = %e, "Frame delivery panicked");
                }
            });
        }
    }

    fn cancel_all(&self) {
        self.cancel_epoch.send_modify(|epoch| *epoch += 1);
        tracing::debug!(path = %self.path.display(), "Cancelled pending extractions");
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

async fn extract_frame(
    path: &Path,
    time: SampleTime,
    size: FrameSize,
) -> Result<Frame, DecodeError> {
    if size.is_empty() {
        return Err(DecodeError::failed("requested frame size is empty"));
    }

    let output = tokio::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss"])
        .arg(format!("{:.6}", time.seconds()))
        .arg("-i")
        .arg(path)
        .args(["-frames:v", "1", "-vf"])
        .arg(format!("scale={}:{}", size.width, size.height))
        .args(["-f", "rawvideo", "-pix_fmt", "abgr", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DecodeError::failed(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DecodeError::failed(format!(
            "ffmpeg failed at {time}: {}",
            stderr.trim()
        )));
    }
    if output.stdout.is_empty() {
        return Err(DecodeError::failed(format!("no frame at {time}")));
    }

    Frame::new(size.width, size.height, output.stdout)
}
