//! Durable preset store with a write-through LRU cache.
//!
//! Each preset lives in its own JSON file `<folder>/<name>.json`, where
//! `<folder>` is the vault-relative preset folder from the global settings
//! (`card-presets` by default):
//!
//! ```json
//! {
//!   "name": "work",
//!   "description": "Desk setup",
//!   "settings": { "cardWidth": 350, "layoutMode": "grid" },
//!   "isDefault": false
//! }
//! ```
//!
//! # Read outcomes
//!
//! `read` distinguishes exactly two failures:
//!
//! - [`PresetError::NotFound`]: no file for that name.
//! - [`PresetError::Corrupt`]: the file exists but is not valid JSON, lacks
//!   `name` or `settings`, has values of the wrong type, or its embedded
//!   name disagrees with its file name.
//!
//! Both are "try the next candidate" for the resolver.
//!
//! # Caching
//!
//! Every successful read and every write goes through the [`PresetCache`],
//! so the cache always holds the latest written version of a preset.
//! Deletes invalidate the entry and moving the preset folder clears the
//! whole cache.
//!
//! Writes, deletes and folder moves bump a store-wide epoch while holding
//! the cache lock.  A read caches what it loaded only if the epoch is the
//! same as before its backend call, so bytes fetched before a concurrent
//! write or delete never replace the newer state.
//!
//! # Locking
//!
//! The cache sits behind a `tokio::sync::Mutex` and the folder behind a
//! `tokio::sync::RwLock`.  Neither lock is held across a backend call, so a
//! slow disk never blocks cache hits for other presets.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use preset_core::cache::CacheStats;
use preset_core::domain::preset::DEFAULT_PRESET_NAME;
use preset_core::{validate_name, Preset, PresetCache, PresetError, SettingsBundle};

use super::backend::{StorageBackend, StorageError};

/// File extension of preset files.
pub const PRESET_FILE_EXTENSION: &str = "json";

/// Persistent preset store.
pub struct PresetStore {
    backend: Arc<dyn StorageBackend>,
    folder: RwLock<PathBuf>,
    cache: Mutex<PresetCache>,
    epoch: AtomicU64,
}

impl PresetStore {
    /// Creates a store over `backend` with presets kept in `folder`.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        folder: impl Into<PathBuf>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            backend,
            folder: RwLock::new(folder.into()),
            cache: Mutex::new(PresetCache::new(cache_capacity)),
            epoch: AtomicU64::new(0),
        }
    }

    /// The current preset folder.
    pub async fn folder(&self) -> PathBuf {
        self.folder.read().await.clone()
    }

    /// Points the store at a new folder and drops every cached preset.
    ///
    /// Files are not moved; presets in the old folder stay where they are.
    pub async fn update_folder(&self, folder: impl Into<PathBuf>) {
        let folder = folder.into();
        *self.folder.write().await = folder.clone();
        let mut cache = self.cache.lock().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        cache.clear();
        drop(cache);
        info!("preset folder is now {}", folder.display());
    }

    /// Names of every preset in the folder, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the folder cannot be listed.
    pub async fn list(&self) -> Result<Vec<String>, PresetError> {
        let folder = self.folder().await;
        let files = self
            .backend
            .list(&folder)
            .await
            .map_err(|e| PresetError::Storage(e.to_string()))?;

        let mut names: Vec<String> = files
            .iter()
            .filter(|path| {
                path.extension().and_then(|e| e.to_str()) == Some(PRESET_FILE_EXTENSION)
            })
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()))
            .filter(|stem| !stem.starts_with('.'))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Loads one preset, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] or [`PresetError::Corrupt`].
    pub async fn read(&self, name: &str) -> Result<Preset, PresetError> {
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(_) => return Err(PresetError::NotFound(name.to_string())),
        };

        let epoch = {
            let mut cache = self.cache.lock().await;
            if let Some(preset) = cache.get(name) {
                return Ok(preset);
            }
            self.epoch.load(Ordering::Acquire)
        };

        let path = self.path_for(name).await;
        let raw = match self.backend.read(&path).await {
            Ok(raw) => raw,
            Err(StorageError::NotFound(_)) => return Err(PresetError::NotFound(name.to_string())),
            Err(e) => {
                return Err(PresetError::Corrupt {
                    name: name.to_string(),
                    reason: format!("unreadable: {e}"),
                })
            }
        };

        let preset = parse_preset_file(name, &raw)?;
        debug!("loaded preset '{name}' from {}", path.display());

        let mut cache = self.cache.lock().await;
        if self.epoch.load(Ordering::Acquire) == epoch {
            if let Some(evicted) = cache.put(name, preset.clone()) {
                debug!("evicted '{evicted}' to make room for '{name}'");
            }
        } else {
            debug!("store changed while '{name}' was loading; not caching it");
        }
        Ok(preset)
    }

    /// Returns `true` if a file exists for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the backend cannot be queried.
    pub async fn exists(&self, name: &str) -> Result<bool, PresetError> {
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(_) => return Ok(false),
        };
        if self.cache.lock().await.contains(name) {
            return Ok(true);
        }
        let path = self.path_for(name).await;
        self.backend
            .exists(&path)
            .await
            .map_err(|e| PresetError::Storage(e.to_string()))
    }

    /// Creates or replaces the preset's file and mirrors it into the cache.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::InvalidName`], [`PresetError::Encode`] or
    /// [`PresetError::Storage`].
    pub async fn write(&self, preset: &Preset) -> Result<(), PresetError> {
        let name = validate_name(&preset.name)?.to_string();
        let json =
            serde_json::to_string_pretty(preset).map_err(|e| PresetError::Encode(e.to_string()))?;

        let path = self.path_for(&name).await;
        self.backend
            .write(&path, &json)
            .await
            .map_err(|e| PresetError::Storage(e.to_string()))?;

        debug!("saved preset '{name}' to {}", path.display());
        self.cache_put(&name, preset.clone()).await;
        Ok(())
    }

    /// Deletes the preset's file and its cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] if there is no such file, or
    /// [`PresetError::Storage`] for other failures.
    pub async fn delete(&self, name: &str) -> Result<(), PresetError> {
        let name = validate_name(name).map_err(|_| PresetError::NotFound(name.to_string()))?;
        self.invalidate(name).await;

        let path = self.path_for(name).await;
        let deleted = self.backend.delete(&path).await;
        // A read that started between the first invalidation and the delete
        // may have cached the old file.
        self.invalidate(name).await;
        match deleted {
            Ok(()) => {
                debug!("deleted preset '{name}'");
                Ok(())
            }
            Err(StorageError::NotFound(_)) => Err(PresetError::NotFound(name.to_string())),
            Err(e) => Err(PresetError::Storage(e.to_string())),
        }
    }

    /// Loads the default preset, regenerating it from the baseline template
    /// when it is missing, corrupt or out of step with the template.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if a regenerated default cannot be
    /// written.
    pub async fn ensure_default(&self) -> Result<Preset, PresetError> {
        let template = Preset::default_preset();
        let expected = SettingsBundle::default().preset_projection();

        match self.read(DEFAULT_PRESET_NAME).await {
            Ok(stored) if stored.is_default && stored.settings == expected => return Ok(stored),
            Ok(_) => warn!("default preset differs from the baseline template; regenerating"),
            Err(PresetError::NotFound(_)) => info!("default preset missing; creating it"),
            Err(e) => warn!("default preset unusable ({e}); regenerating"),
        }

        self.write(&template).await?;
        Ok(template)
    }

    /// Returns `true` if `name` is currently cached.
    pub async fn is_cached(&self, name: &str) -> bool {
        self.cache.lock().await.contains(name)
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    async fn path_for(&self, name: &str) -> PathBuf {
        preset_path(&self.folder().await, name)
    }

    async fn cache_put(&self, name: &str, preset: Preset) {
        let mut cache = self.cache.lock().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        if let Some(evicted) = cache.put(name, preset) {
            debug!("evicted '{evicted}' to make room for '{name}'");
        }
    }

    async fn invalidate(&self, name: &str) {
        let mut cache = self.cache.lock().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        cache.invalidate(name);
    }
}

/// Path of the file holding `name` inside `folder`.
pub fn preset_path(folder: &Path, name: &str) -> PathBuf {
    folder.join(format!("{name}.{PRESET_FILE_EXTENSION}"))
}

/// Parses a preset file, enforcing the fields every stored preset must have.
fn parse_preset_file(name: &str, raw: &str) -> Result<Preset, PresetError> {
    let corrupt = |reason: String| PresetError::Corrupt {
        name: name.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| corrupt("top level is not an object".to_string()))?;
    if !matches!(object.get("name"), Some(Value::String(_))) {
        return Err(corrupt("missing required field `name`".to_string()));
    }
    if !matches!(object.get("settings"), Some(Value::Object(_))) {
        return Err(corrupt("missing required field `settings`".to_string()));
    }

    let mut preset: Preset = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
    if preset.name != name {
        return Err(corrupt(format!(
            "file is named '{name}' but contains preset '{}'",
            preset.name
        )));
    }
    preset.is_default = name == DEFAULT_PRESET_NAME;
    Ok(preset)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
