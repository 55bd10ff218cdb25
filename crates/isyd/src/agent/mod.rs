//! Command orchestration.

pub mod engine;

pub use engine::{CommandEngine, FALLBACK_MESSAGE};
