//! preset-engine library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::engine::{EngineOptions, PresetEngine};
pub use application::resolve_subject::ResolveOutcome;
pub use application::stage_edits::{SaveTarget, StagingSession};
