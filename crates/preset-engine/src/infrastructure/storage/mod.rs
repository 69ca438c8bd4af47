//! Storage infrastructure: preset files and host configuration.
//!
//! - `backend` – the [`backend::StorageBackend`] trait and the file system
//!   implementation rooted at the vault directory.
//! - `memory` – in-memory backend and settings persistence used by tests.
//! - `preset_store` – one JSON file per preset, fronted by the LRU cache.
//! - `config` – the TOML host configuration file, which also persists the
//!   live settings bundle.

pub mod backend;
pub mod config;
pub mod memory;
pub mod preset_store;
