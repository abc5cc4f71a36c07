//! Frame capture: batched capture against a surface session, staged as lossless PNGs.

/// Batched, bounded-concurrency capture loop.
pub mod coordinator;
/// Per-request staging directory and orphan sweep.
pub mod staging;
