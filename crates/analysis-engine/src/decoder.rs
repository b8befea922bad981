//! Seams to the outside world: asset probing and frame decoding.
//!
//! A session never decodes video itself. It hands a list of sample times to
//! a [`FrameDecoder`], which delivers each result through the [`FrameSink`]
//! it was given, from whatever thread it likes and in whatever order.

use std::sync::{Arc, Weak};

use ghosttrail_common::error::GhostTrailResult;
use ghosttrail_model::asset::AssetMetadata;
use ghosttrail_model::decode::DecodeError;
use ghosttrail_model::frame::{Frame, FrameSize};
use ghosttrail_model::time::SampleTime;

use crate::session::SessionShared;

/// Reads the metadata of a video asset.
pub trait AssetProbe {
    fn probe(&self) -> GhostTrailResult<AssetMetadata>;
}

/// Already-known metadata probes to itself.
impl AssetProbe for AssetMetadata {
    fn probe(&self) -> GhostTrailResult<AssetMetadata> {
        Ok(self.clone())
    }
}

/// Asynchronous frame extraction.
///
/// Implementations must not block in [`FrameDecoder::request_frames`] for
/// longer than it takes to queue the work, and may deliver results
/// concurrently from several threads.
pub trait FrameDecoder: Send + Sync {
    /// Queue one extraction per time. Every frame must fit in `max_size`.
    /// Each request should eventually produce exactly one result on `sink`.
    fn request_frames(&self, times: &[SampleTime], max_size: FrameSize, sink: FrameSink);

    /// Withdraw every outstanding request. Best effort; requests may still
    /// complete afterwards.
    fn cancel_all(&self);

    /// Backend name for logging.
    fn name(&self) -> &str;
}

type ResultCallback = dyn Fn(SampleTime, Result<Frame, DecodeError>) + Send + Sync;

/// Where a decoder sends results for one analysis run.
///
/// Cheap to clone and safe to use from any thread. Results sent after the
/// session was dropped, cancelled, finished or reset are discarded.
#[derive(Clone)]
pub struct FrameSink {
    target: SinkTarget,
}

#[derive(Clone)]
enum SinkTarget {
    Session {
        session: Weak<SessionShared>,
        generation: u64,
    },
    Callback(Arc<ResultCallback>),
}

impl FrameSink {
    pub(crate) fn new(session: Weak<SessionShared>, generation: u64) -> Self {
        Self {
            target: SinkTarget::Session {
                session,
                generation,
            },
        }
    }

    /// A sink that hands every result to `callback`, for driving a decoder
    /// without a session.
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(SampleTime, Result<Frame, DecodeError>) + Send + Sync + 'static,
    {
        Self {
            target: SinkTarget::Callback(Arc::new(callback)),
        }
    }

    /// Hand over the result for `time`.
    pub fn deliver(&self, time: SampleTime, result: Result<Frame, DecodeError>) {
        match &self.target {
            SinkTarget::Session {
                session,
                generation,
            } => match session.upgrade() {
                Some(session) => session.on_frame_result(*generation, time, result),
                None => tracing::debug!(%time, "Session gone, dropping frame result"),
            },
            SinkTarget::Callback(callback) => callback(time, result),
        }
    }

    /// The session run this sink belongs to, if it belongs to one.
    pub fn generation(&self) -> Option<u64> {
        match &self.target {
            SinkTarget::Session { generation, .. } => Some(*generation),
            SinkTarget::Callback(_) => None,
        }
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            SinkTarget::Session {
                session,
                generation,
            } => f
                .debug_struct("FrameSink")
                .field("generation", generation)
                .field("attached", &(session.strong_count() > 0))
                .finish(),
            SinkTarget::Callback(_) => f.debug_struct("FrameSink").finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_sink_receives_results() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = FrameSink::from_fn({
            let seen = Arc::clone(&seen);
            move |time, result| seen.lock().unwrap().push((time, result.is_ok()))
        });
        assert_eq!(sink.generation(), None);

        let time = SampleTime::new(300, 600);
        sink.clone().deliver(time, Err(DecodeError::Cancelled));
        assert_eq!(*seen.lock().unwrap(), vec![(time, false)]);
    }

    #[test]
    fn test_detached_session_sink_drops_results() {
        let sink = FrameSink::new(Weak::new(), 7);
        assert_eq!(sink.generation(), Some(7));
        sink.deliver(SampleTime::new(0, 600), Err(DecodeError::Cancelled));
        assert!(format!("{sink:?}").contains("attached: false"));
    }
}
