//! GhostTrail Common Utilities
//!
//! Shared infrastructure for all GhostTrail crates:
//! - Error types and result aliases
//! - Injectable clock for deterministic timing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
