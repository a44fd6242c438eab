//! Segmentation and prompt-chaining engine.
//!
//! Pure functions that turn time-aligned analysis data (transcript spans,
//! beat timestamps, an energy curve) into an ordered list of generation
//! requests. No I/O happens here; the `mvgen-plan` binary wraps the engine
//! for the remote runner.

pub mod error;
pub mod plan;
pub mod prompt;
pub mod segment;

pub use error::{SceneError, SceneResult};
pub use plan::{frame_count, plan_generation, PlanRequest};
pub use prompt::{mood_descriptor, normalize_energies, PromptChainer, DEFAULT_PALETTE};
pub use segment::segment;
