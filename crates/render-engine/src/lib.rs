//! GhostTrail Render Engine
//!
//! Turns a composite into a still image on disk.
//!
//! ```text
//! CompositeImage (premultiplied ABGR words)
//!        │
//!        ├── unpremultiply ──▶ straight RGBA8
//!        │
//!        ▼
//!   PNG encode ──▶ temp file ──▶ rename ──▶ trail.png
//! ```

pub mod export;

pub use export::*;
