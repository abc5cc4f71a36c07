//! Rendering surfaces: the engine seam, the per-request session wrapper and built-in engines.

/// Headless Chrome/Chromium engine.
pub mod chrome;
/// Engine and surface traits.
pub mod engine;
/// Per-request surface session.
pub mod session;
/// In-process SVG engine.
pub mod svg;
