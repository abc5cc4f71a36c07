//! Video assembly: the assembler seam and the system-ffmpeg implementation.

/// Assembler trait and job description.
pub mod assembler;
/// System `ffmpeg` assembler.
pub mod ffmpeg;
