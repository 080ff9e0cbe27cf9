//! Depth-aware AR anchor viewer.
//!
//! Composites virtual objects over a camera color feed and occludes them
//! behind real-world geometry using a per-frame depth map. Taps are resolved
//! against ray-cast hits to place anchors; a bounded anchor collection feeds
//! the occlusion-aware renderer once per displayed frame.

pub mod anchors;
pub mod app;
pub mod hit;
pub mod renderer;
pub mod status;
pub mod tap;
pub mod ui;
pub mod uv;
