//! GhostTrail Data Model
//!
//! Defines the data contracts shared by every GhostTrail crate:
//! - **Pixel:** 32-bit packed RGBA word and its in-memory layout
//! - **Frame / CompositeImage:** decoded images and the trail accumulator
//! - **SampleTime / SamplePlan:** rational timeline positions to extract
//! - **AssetMetadata:** what the surrounding application knows about a video
//! - **AnalysisState:** session lifecycle and its transition records
//! - **DecodeError:** per-frame failures reported by decoders

pub mod asset;
pub mod decode;
pub mod frame;
pub mod pixel;
pub mod state;
pub mod time;

pub use asset::*;
pub use decode::*;
pub use frame::*;
pub use pixel::*;
pub use state::*;
pub use time::*;
