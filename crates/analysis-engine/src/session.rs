//! Analysis session management.
//!
//! A session is bound to one asset. Each run plans its sample times, asks the
//! decoder for every frame, and folds results into the trail as they come
//! back. All mutation happens under one mutex; state and progress are mirrored
//! into atomics and a watch channel so observers never contend with decoding.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use ghosttrail_common::clock::{eta_secs, Clock};
use ghosttrail_common::config::{AnalysisConfig, AppConfig, ApplyOrder};
use ghosttrail_common::error::{GhostTrailError, GhostTrailResult};
use ghosttrail_model::asset::AssetMetadata;
use ghosttrail_model::decode::DecodeError;
use ghosttrail_model::frame::{CompositeImage, Frame, FrameSize};
use ghosttrail_model::state::{AnalysisState, TransitionReason, TransitionRecord};
use ghosttrail_model::time::{SamplePlan, SampleTime};
use ghosttrail_processing::{SampleScheduler, TrailAccumulator};

use crate::decoder::{AssetProbe, FrameDecoder, FrameSink};

/// Result of writing the composite automatically when a run completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    Written { path: PathBuf },
    Failed { message: String },
}

/// Point-in-time view of a session for observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: AnalysisState,
    pub progress: f64,
    /// Samples in the current plan.
    pub planned: usize,
    pub frames_applied: usize,
    pub frames_failed: usize,
    /// Results ignored because their time was unplanned or already resolved.
    pub frames_dropped: usize,
    /// Requests still waiting for a result. Zero outside `InProgress`.
    pub outstanding: usize,
    /// Time since `start`, frozen once the run finishes.
    pub elapsed: Duration,
    pub eta_secs: f64,
    pub export: Option<ExportOutcome>,
    /// Wall-clock time (RFC 3339) at which `elapsed` and transition
    /// timestamps are zero.
    pub clock_epoch: String,
}

impl SessionSnapshot {
    fn idle(clock_epoch: &str) -> Self {
        Self {
            state: AnalysisState::NotStarted,
            progress: 0.0,
            planned: 0,
            frames_applied: 0,
            frames_failed: 0,
            frames_dropped: 0,
            outstanding: 0,
            elapsed: Duration::ZERO,
            eta_secs: 0.0,
            export: None,
            clock_epoch: clock_epoch.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    /// Decoded, waiting for earlier samples under [`ApplyOrder::Plan`].
    Buffered,
    Applied,
    Failed,
}

/// Everything belonging to one run.
struct Run {
    generation: u64,
    state: AnalysisState,
    plan: SamplePlan,
    slots: Vec<Slot>,
    buffered: BTreeMap<usize, Frame>,
    next_in_order: usize,
    buffer_limit: usize,
    /// Set once the plan-order buffer overflowed.
    arrival_fallback: bool,
    trail: TrailAccumulator,
    progress: f64,
    resolved: usize,
    frames_failed: usize,
    frames_dropped: usize,
    started_at: Option<Duration>,
    finished_at: Option<Duration>,
    export: Option<ExportOutcome>,
}

impl Run {
    fn new(generation: u64, config: &AnalysisConfig) -> Self {
        Self {
            generation,
            state: AnalysisState::NotStarted,
            plan: SamplePlan::empty(),
            slots: Vec::new(),
            buffered: BTreeMap::new(),
            next_in_order: 0,
            buffer_limit: config.plan_buffer_limit,
            arrival_fallback: false,
            trail: TrailAccumulator::from_config(config),
            progress: 0.0,
            resolved: 0,
            frames_failed: 0,
            frames_dropped: 0,
            started_at: None,
            finished_at: None,
            export: None,
        }
    }

    fn begin(&mut self, plan: SamplePlan, now: Duration) {
        self.slots = vec![Slot::Pending; plan.len()];
        self.plan = plan;
        self.started_at = Some(now);
    }

    fn apply(&mut self, index: usize, frame: Frame) {
        self.trail.apply(frame);
        self.slots[index] = Slot::Applied;
        if let Some(time) = self.plan.get(index) {
            self.progress = self.plan.progress_at(time);
        }
    }

    /// Apply buffered frames up to the first sample still pending.
    fn drain_in_order(&mut self) {
        while let Some(slot) = self.slots.get(self.next_in_order).copied() {
            let index = self.next_in_order;
            match slot {
                Slot::Pending => break,
                Slot::Buffered => {
                    if let Some(frame) = self.buffered.remove(&index) {
                        self.apply(index, frame);
                    }
                }
                Slot::Applied | Slot::Failed => {}
            }
            self.next_in_order += 1;
        }
    }

    fn apply_order(&self, configured: ApplyOrder) -> ApplyOrder {
        if self.arrival_fallback {
            ApplyOrder::Arrival
        } else {
            configured
        }
    }

    /// Apply every buffered frame and switch to arrival order once more
    /// frames are waiting than the limit allows.
    fn enforce_buffer_limit(&mut self) {
        if self.buffered.len() <= self.buffer_limit {
            return;
        }
        tracing::warn!(
            waiting = self.buffered.len(),
            limit = self.buffer_limit,
            blocked_on = ?self.plan.get(self.next_in_order),
            "Plan-order buffer full, applying frames as they arrive"
        );
        for (index, frame) in std::mem::take(&mut self.buffered) {
            self.apply(index, frame);
        }
        self.arrival_fallback = true;
    }

    /// Why this run is done, if it is.
    fn completion(&self) -> Option<TransitionReason> {
        if self.slots.last() == Some(&Slot::Applied) {
            Some(TransitionReason::LastFrameApplied)
        } else if self.resolved == self.plan.len() {
            Some(TransitionReason::AllRequestsResolved)
        } else {
            None
        }
    }

    fn elapsed(&self, now: Duration) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            (Some(start), None) => now.saturating_sub(start),
            _ => Duration::ZERO,
        }
    }
}

struct Inner {
    run: Run,
    transitions: Vec<TransitionRecord>,
}

/// State shared between a session and the sinks it hands out.
pub(crate) struct SessionShared {
    metadata: AssetMetadata,
    config: AppConfig,
    decoder: Arc<dyn FrameDecoder>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    state: AtomicU8,
    progress_bits: AtomicU64,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the transition log and move the run to `to`.
    fn record_transition(&self, inner: &mut Inner, to: AnalysisState, reason: TransitionReason) {
        let from = inner.run.state;
        let at = self.clock.now();
        tracing::info!(
            %from,
            %to,
            ?reason,
            at_ms = at.as_millis() as u64,
            "Analysis state changed"
        );
        inner.run.state = to;
        inner.transitions.push(TransitionRecord {
            from,
            to,
            reason,
            at,
        });
    }

    fn publish(&self, inner: &Inner) {
        let run = &inner.run;
        self.state.store(run.state.as_u8(), Ordering::Release);
        self.progress_bits
            .store(run.progress.to_bits(), Ordering::Release);

        let elapsed = run.elapsed(self.clock.now());
        let in_progress = run.state == AnalysisState::InProgress;
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: run.state,
            progress: run.progress,
            planned: run.plan.len(),
            frames_applied: run.trail.frames_applied(),
            frames_failed: run.frames_failed,
            frames_dropped: run.frames_dropped,
            outstanding: if in_progress {
                run.plan.len() - run.resolved
            } else {
                0
            },
            elapsed,
            eta_secs: if in_progress {
                eta_secs(run.progress, elapsed)
            } else {
                0.0
            },
            export: run.export.clone(),
            clock_epoch: self.clock.epoch_wall().to_string(),
        });
    }

    fn complete(&self, inner: &mut Inner, reason: TransitionReason) {
        self.record_transition(inner, AnalysisState::Complete, reason);

        let run = &mut inner.run;
        run.progress = 1.0;
        run.finished_at = Some(self.clock.now());
        run.buffered.clear();

        tracing::info!(
            applied = run.trail.frames_applied(),
            failed = run.frames_failed,
            planned = run.plan.len(),
            "Analysis complete"
        );

        if let Some(path) = &self.config.output.auto_export_path {
            let outcome = match run.trail.composite() {
                Some(composite) => match ghosttrail_render::export_png(composite, path) {
                    Ok(written) => ExportOutcome::Written { path: written },
                    Err(e) => ExportOutcome::Failed {
                        message: e.to_string(),
                    },
                },
                None => ExportOutcome::Failed {
                    message: "no frames were applied".to_string(),
                },
            };
            if let ExportOutcome::Failed { message } = &outcome {
                tracing::warn!(path = %path.display(), %message, "Automatic export failed");
            }
            run.export = Some(outcome);
        }
    }

    pub(crate) fn on_frame_result(
        &self,
        generation: u64,
        time: SampleTime,
        result: Result<Frame, DecodeError>,
    ) {
        let mut inner = self.lock();
        let run = &mut inner.run;

        if run.generation != generation {
            tracing::debug!(%time, generation, "Ignoring result from an earlier run");
            return;
        }
        if run.state != AnalysisState::InProgress {
            tracing::debug!(
                %time,
                state = %run.state,
                "Ignoring result outside a running analysis"
            );
            return;
        }
        let Some(index) = run.plan.index_of(time) else {
            tracing::warn!(%time, "Ignoring result for a time that was never requested");
            run.frames_dropped += 1;
            self.publish(&inner);
            return;
        };
        if run.slots[index] != Slot::Pending {
            tracing::warn!(%time, "Ignoring duplicate result");
            run.frames_dropped += 1;
            self.publish(&inner);
            return;
        }

        run.resolved += 1;
        let order = run.apply_order(self.config.analysis.apply_order);
        match result {
            Err(e) => {
                tracing::warn!(%time, error = %e, "Frame could not be decoded, skipping");
                run.slots[index] = Slot::Failed;
                run.frames_failed += 1;
            }
            Ok(frame) => match order {
                ApplyOrder::Arrival => run.apply(index, frame),
                ApplyOrder::Plan => {
                    run.slots[index] = Slot::Buffered;
                    run.buffered.insert(index, frame);
                }
            },
        }
        if order == ApplyOrder::Plan {
            run.drain_in_order();
            run.enforce_buffer_limit();
        }

        tracing::debug!(
            %time,
            progress = run.progress,
            resolved = run.resolved,
            planned = run.plan.len(),
            "Frame result handled"
        );

        if let Some(reason) = run.completion() {
            self.complete(&mut inner, reason);
        }
        self.publish(&inner);
    }
}

/// Trail analysis of one video asset.
pub struct AnalysisSession {
    shared: Arc<SessionShared>,
    metadata_error: Option<String>,
}

impl AnalysisSession {
    /// Bind a session to the asset behind `probe`.
    ///
    /// A failing probe does not prevent construction: the session carries
    /// empty metadata (so any run plans nothing) and reports the failure
    /// through [`AnalysisSession::metadata_error`].
    pub fn open(
        probe: &dyn AssetProbe,
        decoder: Arc<dyn FrameDecoder>,
        config: AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (metadata, metadata_error) = match probe.probe() {
            Ok(metadata) => (metadata, None),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read asset metadata");
                (AssetMetadata::empty(), Some(e.to_string()))
            }
        };

        tracing::info!(
            asset = %metadata.name,
            size = %metadata.natural_size,
            duration_secs = metadata.duration_seconds,
            decoder = decoder.name(),
            clock_epoch = clock.epoch_wall(),
            "Opened analysis session"
        );

        let (snapshot_tx, _) = watch::channel(SessionSnapshot::idle(clock.epoch_wall()));
        let inner = Inner {
            run: Run::new(0, &config.analysis),
            transitions: Vec::new(),
        };

        Self {
            shared: Arc::new(SessionShared {
                metadata,
                config,
                decoder,
                clock,
                inner: Mutex::new(inner),
                state: AtomicU8::new(AnalysisState::NotStarted.as_u8()),
                progress_bits: AtomicU64::new(0f64.to_bits()),
                snapshot_tx,
            }),
            metadata_error,
        }
    }

    pub fn metadata(&self) -> &AssetMetadata {
        &self.shared.metadata
    }

    /// Why metadata could not be read, if it could not.
    pub fn metadata_error(&self) -> Option<&str> {
        self.metadata_error.as_deref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.shared.config
    }

    /// Size every requested frame must fit in.
    pub fn max_frame_size(&self) -> FrameSize {
        self.shared
            .metadata
            .natural_size
            .downscaled(self.shared.config.analysis.downscale_divisor)
    }

    /// Begin a run over the first `requested_secs` of the asset, or all of
    /// it. Returns once the decode requests are queued.
    pub fn start(&self, requested_secs: Option<f64>) -> GhostTrailResult<()> {
        let shared = &self.shared;
        let (times, max_size, sink) = {
            let mut inner = shared.lock();
            if inner.run.state != AnalysisState::NotStarted {
                return Err(GhostTrailError::invalid_state("start", inner.run.state));
            }
            shared.config.analysis.validate()?;

            let plan = SampleScheduler::from_config(&shared.config.analysis)
                .plan_for(&shared.metadata, requested_secs);
            let max_size = self.max_frame_size();
            inner.run.begin(plan, shared.clock.now());
            shared.record_transition(
                &mut inner,
                AnalysisState::InProgress,
                TransitionReason::Started,
            );

            tracing::info!(
                samples = inner.run.plan.len(),
                %max_size,
                requested_secs = ?requested_secs,
                "Analysis started"
            );

            if inner.run.plan.is_empty() {
                shared.complete(&mut inner, TransitionReason::EmptyPlan);
                shared.publish(&inner);
                return Ok(());
            }
            shared.publish(&inner);

            let sink = FrameSink::new(Arc::downgrade(shared), inner.run.generation);
            (inner.run.plan.times().to_vec(), max_size, sink)
        };

        // Decoders may deliver synchronously, so the lock is released first.
        shared.decoder.request_frames(&times, max_size, sink);

        if self.state() == AnalysisState::Cancelled {
            shared.decoder.cancel_all();
        }
        Ok(())
    }

    /// Stop the running analysis. The composite keeps whatever was drawn.
    pub fn cancel(&self) -> GhostTrailResult<()> {
        let shared = &self.shared;
        {
            let mut inner = shared.lock();
            if inner.run.state != AnalysisState::InProgress {
                return Err(GhostTrailError::invalid_state("cancel", inner.run.state));
            }
            shared.record_transition(
                &mut inner,
                AnalysisState::Cancelled,
                TransitionReason::Cancelled,
            );
            inner.run.finished_at = Some(shared.clock.now());
            inner.run.buffered.clear();
            shared.publish(&inner);
        }
        shared.decoder.cancel_all();
        Ok(())
    }

    /// Discard a finished run so the session can start again.
    pub fn reset(&self) -> GhostTrailResult<()> {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if !inner.run.state.is_terminal() {
            return Err(GhostTrailError::invalid_state("reset", inner.run.state));
        }
        shared.record_transition(&mut inner, AnalysisState::NotStarted, TransitionReason::Reset);
        let generation = inner.run.generation + 1;
        inner.run = Run::new(generation, &shared.config.analysis);
        shared.publish(&inner);
        Ok(())
    }

    pub fn state(&self) -> AnalysisState {
        AnalysisState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn progress(&self) -> f64 {
        f64::from_bits(self.shared.progress_bits.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Receive a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Sample times of the current run.
    pub fn plan(&self) -> SamplePlan {
        self.shared.lock().run.plan.clone()
    }

    /// Copy of the trail drawn so far.
    pub fn latest_composite(&self) -> Option<CompositeImage> {
        self.shared.lock().run.trail.composite().cloned()
    }

    pub fn transitions(&self) -> Vec<TransitionRecord> {
        self.shared.lock().transitions.clone()
    }

    /// Wait until the current run is cancelled or complete.
    pub async fn wait_until_finished(&self) -> AnalysisState {
        let mut rx = self.subscribe();
        let outcome = rx.wait_for(|snapshot| snapshot.state.is_terminal()).await;
        match outcome {
            Ok(snapshot) => snapshot.state,
            // The sender lives as long as `self`.
            Err(_) => self.state(),
        }
    }

    /// Encode the current composite as PNG.
    pub fn encode_png(&self) -> GhostTrailResult<Vec<u8>> {
        let composite = self.composite_for_export()?;
        ghosttrail_render::encode_png(&composite)
    }

    /// Write the current composite to `path` as PNG.
    pub fn export_png(&self, path: impl AsRef<Path>) -> GhostTrailResult<PathBuf> {
        let composite = self.composite_for_export()?;
        ghosttrail_render::export_png(&composite, path.as_ref())
    }

    fn composite_for_export(&self) -> GhostTrailResult<CompositeImage> {
        self.latest_composite()
            .ok_or_else(|| GhostTrailError::encoding("no composite to export yet"))
    }
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("asset", &self.shared.metadata.name)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}
