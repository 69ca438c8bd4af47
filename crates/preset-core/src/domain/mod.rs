//! Domain entities for the preset engine.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! Code in outer layers (the store, the applier, the CLI) depends on these
//! types, but the domain never depends on them.  That keeps the merge rules
//! and the global-key isolation testable without touching a disk.

/// Typed settings schema: full bundle, partial bundle, key tags, global keys.
pub mod settings;

/// The `Preset` entity and preset-name rules.
pub mod preset;

/// Folder/tag → preset mapping tables.
pub mod mapping;
