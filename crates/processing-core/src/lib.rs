//! GhostTrail Processing Core
//!
//! Turns sampled video frames into a motion trail:
//! - **Scheduler:** choose evenly spaced sample times within a budget
//! - **Pixel codec:** coordinate access and the background predicate
//! - **Cleaner:** make background pixels transparent
//! - **Compositor:** layer cleaned frames with source-over blending
//! - **Trail:** the clean-then-layer accumulator a session drives
//!
//! This crate is pure computation: no I/O, and no threads of its own beyond
//! the rayon pool.

pub mod cleaner;
pub mod compositor;
pub mod pixel_codec;
pub mod scheduler;
pub mod trail;

pub use cleaner::FrameCleaner;
pub use scheduler::SampleScheduler;
pub use trail::TrailAccumulator;
