//! GhostTrail Analysis Engine
//!
//! Runs analysis sessions over one video asset: plans sample times, requests
//! frames from a decoder, and folds the results into a motion trail.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               AnalysisSession                │
//! │  ┌───────────┐  request   ┌───────────────┐  │
//! │  │ Scheduler │──────────▶│ FrameDecoder   │  │
//! │  └───────────┘            └───────┬───────┘  │
//! │                      FrameSink    │          │
//! │  ┌───────────────────────────────▼───────┐  │
//! │  │  clean ─▶ combine ─▶ CompositeImage   │  │
//! │  └───────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod decoder;
pub mod session;

pub use decoder::{AssetProbe, FrameDecoder, FrameSink};
pub use session::*;
