//! Core evaluation engine: windowed counting, cooldown gating, the per-event
//! evaluation pipeline, and the alert emitter.

pub mod clock;
pub mod cooldown;
pub mod emitter;
pub mod pipeline;
pub mod window;
