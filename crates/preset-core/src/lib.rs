//! # preset-core
//!
//! Shared library for the card-view preset engine containing the typed
//! settings schema, preset entities, folder/tag mapping tables, the preset
//! resolver, the LRU preset cache and the export/import codec.
//!
//! It has zero dependencies on file systems, async runtimes or UI frameworks;
//! everything here can be unit-tested in isolation.
//!
//! # Architecture overview (for beginners)
//!
//! A *preset* is a named bundle of card-view display settings (card width,
//! layout, sort order, ...).  Users bind presets to folders or tags, and when
//! they open a note the engine decides which preset applies to it.
//!
//! - **`domain`** – The settings schema (`SettingsBundle`, `PartialSettings`,
//!   the enumerated `SettingKey` tags and the fixed set of *global* keys that
//!   presets may never touch), the `Preset` entity and the `MappingTables`.
//!
//! - **`resolution`** – The longest-prefix resolver that maps a subject path
//!   to a preset name, and the generation counter used to discard stale
//!   resolutions when the user switches notes quickly.
//!
//! - **`cache`** – A bounded least-recently-used cache of parsed presets.
//!
//! - **`transfer`** – Serialisation of one or many presets to a single text
//!   blob and validated parsing of such blobs back into presets.

pub mod cache;
pub mod domain;
pub mod error;
pub mod resolution;
pub mod transfer;

// Re-export the most-used types at the crate root so callers can write
// `preset_core::Preset` instead of `preset_core::domain::preset::Preset`.
pub use cache::{PresetCache, DEFAULT_CACHE_CAPACITY};
pub use domain::mapping::{normalize_subject, MappingTables, ROOT_FOLDER};
pub use domain::preset::{is_default_name, validate_name, Preset, DEFAULT_PRESET_NAME};
pub use domain::settings::{
    CardLayout, PartialSettings, SettingField, SettingKey, SettingScope, SettingsBundle,
    SortField, GLOBAL_KEYS,
};
pub use error::PresetError;
pub use resolution::generation::{Generation, GenerationCounter};
pub use resolution::resolver::{ancestors, candidates, resolve};
