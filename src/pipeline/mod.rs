//! Request orchestration: validation, session, capture, assembly and cleanup.

/// Lifecycle events and observers.
pub mod events;
/// The generation state machine.
pub mod orchestrator;
/// Request description.
pub mod request;
