//! Output module
//!
//! Browser-facing outputs of the viewer:
//! - Viewer page with the Avaturn iframe (HTTP)
//! - Scene event stream (SSE)

pub mod browser;
pub mod sse;
