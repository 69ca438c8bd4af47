//! Application layer use cases for the preset engine.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the pure rules in `preset-core`
//! (schema, resolver, cache) and the infrastructure that touches disks and
//! users.  Use cases here orchestrate the two to fulfil one user goal each.
//!
//! # Sub-modules
//!
//! - **`settings_context`** – The single owner of the live settings bundle,
//!   its persistence and the refresh signal.
//!
//! - **`apply_preset`** – Merges a preset into the live settings
//!   (`baseline ⊕ preset ⊕ globals`).
//!
//! - **`resolve_subject`** – Runs on every note change: resolve, load with
//!   fall-through, and commit unless a newer change got there first.
//!
//! - **`stage_edits`** – The preset editor's staging buffer with debounced
//!   live preview.
//!
//! - **`manage_presets`** – Create, rename, delete, bind, export and import.
//!
//! - **`engine`** – The facade wiring all of the above together.

pub mod apply_preset;
pub mod engine;
pub mod manage_presets;
pub mod resolve_subject;
pub mod settings_context;
pub mod stage_edits;
