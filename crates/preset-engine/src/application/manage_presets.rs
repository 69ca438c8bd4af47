//! Use case: create, edit, rename, delete, bind and transfer presets.
//!
//! Every operation that touches the default preset checks
//! [`preset_core::domain::preset::ensure_mutable`] before any I/O, so a
//! rejected request leaves both the preset files and the live settings
//! untouched.
//!
//! Operations that change which preset *should* be live keep the live
//! settings consistent:
//!
//! - updating the last active preset re-applies it,
//! - renaming it updates `lastActivePreset` and every mapping,
//! - deleting it (or the global preset) re-applies `"default"`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use preset_core::domain::preset::{ensure_mutable, DEFAULT_PRESET_NAME};
use preset_core::transfer::{export_preset, export_presets, parse_import};
use preset_core::{is_default_name, validate_name, PartialSettings, Preset, PresetError};

use super::apply_preset::PresetApplier;
use super::settings_context::SettingsContext;
use crate::infrastructure::notify::{Notice, Notifier};
use crate::infrastructure::storage::preset_store::PresetStore;

/// What a delete changed besides removing the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    /// Subjects whose active preset fell back to `"default"`.
    pub reassigned: Vec<String>,
    /// Whether `"default"` was re-applied because the deleted preset was
    /// live or global.
    pub reapplied_default: bool,
}

/// Names written by an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: Vec<String>,
    pub overwritten: Vec<String>,
}

/// Preset CRUD, bindings and transfer.
pub struct PresetManager {
    store: Arc<PresetStore>,
    ctx: Arc<SettingsContext>,
    applier: Arc<PresetApplier>,
    notifier: Arc<dyn Notifier>,
}

impl PresetManager {
    pub fn new(
        store: Arc<PresetStore>,
        ctx: Arc<SettingsContext>,
        applier: Arc<PresetApplier>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            ctx,
            applier,
            notifier,
        }
    }

    /// Names of every stored preset.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the folder cannot be listed.
    pub async fn list(&self) -> Result<Vec<String>, PresetError> {
        self.store.list().await
    }

    /// Loads one preset.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] or [`PresetError::Corrupt`].
    pub async fn get(&self, name: &str) -> Result<Preset, PresetError> {
        self.applier.load(name).await
    }

    /// Makes sure the default preset exists and matches the template.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if it had to be written and could not be.
    pub async fn ensure_default(&self) -> Result<Preset, PresetError> {
        self.store.ensure_default().await
    }

    /// Creates a new preset.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Protected`], [`PresetError::InvalidName`] or
    /// [`PresetError::AlreadyExists`] before writing anything.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        settings: PartialSettings,
    ) -> Result<Preset, PresetError> {
        let preset = Preset::new(name, description, settings)?;
        if self.store.exists(&preset.name).await? {
            return Err(PresetError::AlreadyExists(preset.name));
        }
        self.store.write(&preset).await?;
        info!("created preset '{}'", preset.name);
        self.notifier
            .notify(Notice::info(format!("Created preset '{}'", preset.name)));
        Ok(preset)
    }

    /// Creates a preset holding the current live settings.
    ///
    /// # Errors
    ///
    /// See [`PresetManager::create`].
    pub async fn create_from_live(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Preset, PresetError> {
        let settings = self.ctx.read(|live| live.preset_projection()).await;
        self.create(name, description, settings).await
    }

    /// Copies `source` under `new_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] / [`PresetError::Corrupt`] for the
    /// source, or any error of [`PresetManager::create`].
    pub async fn clone_preset(&self, source: &str, new_name: &str) -> Result<Preset, PresetError> {
        let original = self.get(source).await?;
        let description = if original.description.is_empty() {
            format!("Copy of {}", original.name)
        } else {
            original.description.clone()
        };
        self.create(new_name, &description, original.settings).await
    }

    /// Overwrites an existing preset's settings (and optionally description).
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Protected`] before any I/O for the default
    /// preset, and [`PresetError::NotFound`] if it does not exist.
    pub async fn update(
        &self,
        name: &str,
        settings: PartialSettings,
        description: Option<&str>,
    ) -> Result<Preset, PresetError> {
        ensure_mutable(name)?;
        let existing = self.store.read(name).await?;
        let description = description
            .map(str::to_string)
            .unwrap_or(existing.description);
        let preset = Preset::new(&existing.name, description, settings)?;
        self.store.write(&preset).await?;

        if self.is_last_active(&preset.name).await {
            self.applier.apply(&preset.name).await?;
        }
        info!("updated preset '{}'", preset.name);
        Ok(preset)
    }

    /// Renames a preset, carrying every mapping and `lastActivePreset` along.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Protected`] if either name is the default
    /// preset's, [`PresetError::AlreadyExists`] if `new` is taken and
    /// [`PresetError::NotFound`] if `old` does not exist.
    pub async fn rename(&self, old: &str, new: &str) -> Result<Preset, PresetError> {
        ensure_mutable(old)?;
        ensure_mutable(new)?;
        let original = self.store.read(old).await?;
        let renamed = original.renamed(new)?;
        if renamed.name == original.name {
            return Ok(original);
        }
        if self.store.exists(&renamed.name).await? {
            return Err(PresetError::AlreadyExists(renamed.name));
        }

        self.store.write(&renamed).await?;
        self.store.delete(&original.name).await?;

        let (old_name, new_name) = (original.name.as_str(), renamed.name.as_str());
        self.ctx
            .modify(|live| {
                live.mappings_mut().rename_preset(old_name, new_name);
                if live.last_active_preset.as_deref() == Some(old_name) {
                    live.last_active_preset = Some(new_name.to_string());
                }
                Some(())
            })
            .await?;

        info!("renamed preset '{old_name}' to '{new_name}'");
        self.notifier.notify(Notice::info(format!(
            "Renamed preset '{old_name}' to '{new_name}'"
        )));
        Ok(renamed)
    }

    /// Deletes a preset and repairs every reference to it.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Protected`] before any I/O for the default
    /// preset and [`PresetError::NotFound`] if there is no such preset.
    pub async fn delete(&self, name: &str) -> Result<DeleteReport, PresetError> {
        ensure_mutable(name)?;
        let name = validate_name(name)?.to_string();
        self.store.delete(&name).await?;

        let cascade = self
            .ctx
            .modify(|live| {
                let was_global = live.mappings().global_preset.as_deref() == Some(name.as_str());
                let was_active = live.last_active_preset.as_deref() == Some(name.as_str());
                let reassigned = live.mappings_mut().remove_preset(&name);
                Some((reassigned, was_global || was_active))
            })
            .await?;
        let (reassigned, needs_default) = cascade.unwrap_or_default();

        if needs_default {
            self.applier.apply(DEFAULT_PRESET_NAME).await?;
        }

        info!("deleted preset '{name}'");
        self.notifier
            .notify(Notice::info(format!("Deleted preset '{name}'")));
        Ok(DeleteReport {
            reassigned,
            reapplied_default: needs_default,
        })
    }

    /// Binds `preset` to a folder or tag.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] if the preset does not exist.
    pub async fn assign_folder(&self, subject: &str, preset: &str) -> Result<(), PresetError> {
        let preset = self.require(preset).await?;
        self.ctx
            .modify(|live| {
                live.mappings_mut().assign(subject, &preset);
                Some(())
            })
            .await?;
        info!("bound preset '{preset}' to {subject}");
        Ok(())
    }

    /// Removes the binding of a folder or tag.  Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the settings cannot be persisted.
    pub async fn unassign_folder(&self, subject: &str) -> Result<bool, PresetError> {
        let removed = self
            .ctx
            .modify(|live| Some(live.mappings_mut().unassign(subject)))
            .await?;
        Ok(removed.unwrap_or(false))
    }

    /// Sets or clears the global fallback preset.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] if the preset does not exist.
    pub async fn set_global(&self, preset: Option<&str>) -> Result<(), PresetError> {
        let preset = match preset {
            Some(name) => Some(self.require(name).await?),
            None => None,
        };
        self.ctx
            .modify(|live| {
                live.mappings_mut().set_global(preset.as_deref());
                Some(())
            })
            .await?;
        Ok(())
    }

    /// Turns automatic preset application on or off.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the settings cannot be persisted.
    pub async fn set_auto_apply(&self, enabled: bool) -> Result<(), PresetError> {
        self.ctx
            .modify(|live| {
                live.auto_apply_presets = enabled;
                Some(())
            })
            .await
            .map(|_| ())
    }

    /// Moves the store to a different preset folder.
    ///
    /// Existing files are not copied.  The cache is cleared and a default
    /// preset is created in the new folder if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::InvalidName`] for an empty folder, or
    /// [`PresetError::Storage`].
    pub async fn update_folder(&self, folder: &str) -> Result<(), PresetError> {
        let folder = folder.trim();
        if folder.is_empty() {
            return Err(PresetError::InvalidName {
                name: folder.to_string(),
                reason: "preset folder must not be empty".to_string(),
            });
        }

        self.store.update_folder(PathBuf::from(folder)).await;
        self.ctx
            .modify(|live| {
                live.preset_folder = folder.to_string();
                Some(())
            })
            .await?;
        self.store.ensure_default().await?;
        Ok(())
    }

    /// Serialises one preset.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`], [`PresetError::Corrupt`] or
    /// [`PresetError::Encode`].
    pub async fn export(&self, name: &str) -> Result<String, PresetError> {
        export_preset(&self.get(name).await?)
    }

    /// Serialises every loadable user preset.  The default preset is left
    /// out (every vault regenerates its own) and corrupt files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] or [`PresetError::Encode`].
    pub async fn export_all(&self) -> Result<String, PresetError> {
        let mut presets = Vec::new();
        for name in self.store.list().await? {
            if is_default_name(&name) {
                continue;
            }
            match self.get(&name).await {
                Ok(preset) => presets.push(preset),
                Err(e) => warn!("skipping '{name}' in export: {e}"),
            }
        }
        export_presets(&presets)
    }

    /// Imports presets from an export blob.
    ///
    /// All validation happens before the first write: a malformed blob, an
    /// entry named like the default preset, or (without `overwrite`) a name
    /// that already exists rejects the whole import.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::InvalidImport`], [`PresetError::Protected`],
    /// [`PresetError::AlreadyExists`] or [`PresetError::Storage`].
    pub async fn import(&self, blob: &str, overwrite: bool) -> Result<ImportReport, PresetError> {
        let presets = match parse_import(blob) {
            Ok(presets) => presets,
            Err(e) => {
                self.notifier
                    .notify(Notice::error(format!("Import rejected: {e}")));
                return Err(e);
            }
        };

        if presets.iter().any(|preset| is_default_name(&preset.name)) {
            return Err(PresetError::Protected(DEFAULT_PRESET_NAME.to_string()));
        }

        let mut existing = Vec::new();
        for preset in &presets {
            if self.store.exists(&preset.name).await? {
                if !overwrite {
                    return Err(PresetError::AlreadyExists(preset.name.clone()));
                }
                existing.push(preset.name.clone());
            }
        }

        let mut report = ImportReport::default();
        for preset in &presets {
            self.store.write(preset).await?;
            if existing.contains(&preset.name) {
                report.overwritten.push(preset.name.clone());
            } else {
                report.created.push(preset.name.clone());
            }
        }

        let live_name = self.ctx.read(|live| live.last_active_preset.clone()).await;
        if let Some(live_name) = live_name.filter(|n| report.overwritten.contains(n)) {
            self.applier.apply(&live_name).await?;
        }

        info!(
            "imported {} preset(s), {} overwritten",
            presets.len(),
            report.overwritten.len()
        );
        self.notifier
            .notify(Notice::info(format!("Imported {} preset(s)", presets.len())));
        Ok(report)
    }

    async fn is_last_active(&self, name: &str) -> bool {
        self.ctx
            .read(|live| live.last_active_preset.as_deref() == Some(name))
            .await
    }

    /// Returns the canonical name of a preset that must exist.
    async fn require(&self, name: &str) -> Result<String, PresetError> {
        if is_default_name(name) {
            return Ok(self.store.ensure_default().await?.name);
        }
        let name = validate_name(name).map_err(|_| PresetError::NotFound(name.to_string()))?;
        if self.store.exists(name).await? {
            Ok(name.to_string())
        } else {
            Err(PresetError::NotFound(name.to_string()))
        }
    }
}
