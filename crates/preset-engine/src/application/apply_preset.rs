//! Use case: apply a preset to the live settings.
//!
//! # Merge rule
//!
//! Applying preset `P` never layers it on top of whatever happens to be live.
//! The new live bundle is always rebuilt from scratch:
//!
//! ```text
//! live' = baseline ⊕ P.settings(without global keys) ⊕ globals(live)
//! live'.lastActivePreset = P.name
//! ```
//!
//! - Starting from the baseline template means a key the preset does not
//!   mention falls back to its template value rather than keeping the
//!   previous preset's value.  Applying the same preset twice yields the
//!   same result no matter what was live before.
//! - The global keys (`presetFolder`, `autoApplyPresets`, `presetMappings`)
//!   are carried over from the current live bundle.  A preset file that
//!   somehow contains them is ignored for those keys and a warning logged.
//! - `lastActivePreset` is written by the applier itself and is therefore
//!   not part of the carried-over globals.

use std::sync::Arc;

use tracing::{info, warn};

use preset_core::{
    is_default_name, PartialSettings, Preset, PresetError, SettingKey, SettingsBundle,
};

use super::settings_context::SettingsContext;
use crate::infrastructure::notify::{Notice, Notifier};
use crate::infrastructure::storage::preset_store::PresetStore;

/// Result of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPreset {
    pub name: String,
    /// Global keys found in the preset and ignored.
    pub ignored_keys: Vec<SettingKey>,
}

/// Builds the live bundle that results from applying `overlay` as `name`.
pub fn merge_preset(
    baseline: &SettingsBundle,
    live: &SettingsBundle,
    overlay: &PartialSettings,
    name: &str,
) -> SettingsBundle {
    let mut preserved = live.global_snapshot();
    preserved.remove(SettingKey::LastActivePreset);

    let mut next = SettingsBundle::compose(baseline, overlay, &preserved);
    next.last_active_preset = Some(name.to_string());
    next
}

/// Loads presets and merges them into the live settings.
pub struct PresetApplier {
    store: Arc<PresetStore>,
    ctx: Arc<SettingsContext>,
    notifier: Arc<dyn Notifier>,
}

impl PresetApplier {
    pub fn new(
        store: Arc<PresetStore>,
        ctx: Arc<SettingsContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            ctx,
            notifier,
        }
    }

    /// Loads `name` and makes it live.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] or [`PresetError::Corrupt`] when the
    /// preset cannot be loaded, after notifying the user; live settings are
    /// left exactly as they were.  Returns [`PresetError::Storage`] if the
    /// new settings could not be persisted.
    pub async fn apply(&self, name: &str) -> Result<AppliedPreset, PresetError> {
        let preset = match self.load(name).await {
            Ok(preset) => preset,
            Err(e) => {
                warn!("cannot apply preset '{name}': {e}");
                self.notifier
                    .notify(Notice::error(format!("Could not apply preset '{name}': {e}")));
                return Err(e);
            }
        };

        let applied = self.commit_if(&preset, || true).await?;
        Ok(applied.unwrap_or_else(|| AppliedPreset {
            name: preset.name.clone(),
            ignored_keys: Vec::new(),
        }))
    }

    /// Loads a preset.  The default preset is regenerated if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] or [`PresetError::Corrupt`].
    pub async fn load(&self, name: &str) -> Result<Preset, PresetError> {
        if is_default_name(name) {
            self.store.ensure_default().await
        } else {
            self.store.read(name).await
        }
    }

    /// Merges `preset` into the live settings if `still_wanted` holds at
    /// commit time.
    ///
    /// `still_wanted` is evaluated under the settings write lock, so nothing
    /// can change between the check and the write.  Returns `None` when it
    /// refused the commit.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the new settings could not be
    /// persisted.
    pub async fn commit_if<F>(
        &self,
        preset: &Preset,
        still_wanted: F,
    ) -> Result<Option<AppliedPreset>, PresetError>
    where
        F: FnOnce() -> bool,
    {
        let ignored_keys = preset.settings.global_keys_present();
        let baseline = self.ctx.baseline();

        let committed = self
            .ctx
            .modify(|live| {
                if !still_wanted() {
                    return None;
                }
                *live = merge_preset(baseline, live, &preset.settings, &preset.name);
                Some(())
            })
            .await?;

        if committed.is_none() {
            return Ok(None);
        }
        if !ignored_keys.is_empty() {
            warn!(
                "preset '{}' contains global keys {:?}; they were ignored",
                preset.name, ignored_keys
            );
        }
        info!("applied preset '{}'", preset.name);
        Ok(Some(AppliedPreset {
            name: preset.name.clone(),
            ignored_keys,
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::settings_context::SettingsPersistence;
    use crate::infrastructure::notify::recording::RecordingNotifier;
    use crate::infrastructure::notify::{MockNotifier, NoticeLevel};
    use crate::infrastructure::storage::memory::{MemoryBackend, MemorySettingsStore};
    use preset_core::CardLayout;

    struct Fixture {
        backend: Arc<MemoryBackend>,
        ctx: Arc<SettingsContext>,
        applier: PresetApplier,
    }

    fn fixture_with(notifier: Arc<dyn Notifier>, live: SettingsBundle) -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(PresetStore::new(backend.clone(), "card-presets", 8));
        let persistence: Arc<dyn SettingsPersistence> = Arc::new(MemorySettingsStore::new());
        let ctx = Arc::new(SettingsContext::new(live, persistence));
        let applier = PresetApplier::new(store, Arc::clone(&ctx), notifier);
        Fixture {
            backend,
            ctx,
            applier,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(RecordingNotifier::new()), SettingsBundle::default())
    }

    #[test]
    fn test_merge_starts_from_baseline_not_from_live() {
        // Arrange – live carries a value the overlay does not mention
        let baseline = SettingsBundle::default();
        let mut live = SettingsBundle::default();
        live.card_height = 999;
        let mut overlay = PartialSettings::default();
        overlay.card_width = Some(400);

        // Act
        let next = merge_preset(&baseline, &live, &overlay, "wide");

        // Assert
        assert_eq!(next.card_width, 400);
        assert_eq!(next.card_height, baseline.card_height);
        assert_eq!(next.last_active_preset.as_deref(), Some("wide"));
    }

    #[test]
    fn test_merge_keeps_globals_even_if_overlay_names_them() {
        let baseline = SettingsBundle::default();
        let mut live = SettingsBundle::default();
        live.preset_folder = "mine".to_string();
        live.auto_apply_presets = false;
        live.preset_mappings.assign("A", "x");
        let mut overlay = PartialSettings::default();
        overlay.preset_folder = Some("/tmp/evil".to_string());
        overlay.auto_apply_presets = Some(true);

        let next = merge_preset(&baseline, &live, &overlay, "x");

        assert_eq!(next.preset_folder, "mine");
        assert!(!next.auto_apply_presets);
        assert_eq!(next.preset_mappings, live.preset_mappings);
    }

    #[tokio::test]
    async fn test_apply_writes_merged_settings_and_last_active() {
        // Arrange
        let f = fixture();
        f.backend.insert_raw(
            "card-presets/grid.json",
            r#"{"name":"grid","settings":{"layoutMode":"grid","cardGap":4}}"#,
        );

        // Act
        let applied = f.applier.apply("grid").await.unwrap();

        // Assert
        let live = f.ctx.snapshot().await;
        assert_eq!(applied.name, "grid");
        assert_eq!(live.layout_mode, CardLayout::Grid);
        assert_eq!(live.card_gap, 4);
        assert_eq!(live.last_active_preset.as_deref(), Some("grid"));
    }

    #[tokio::test]
    async fn test_apply_same_preset_twice_is_idempotent() {
        let f = fixture();
        f.backend.insert_raw(
            "card-presets/grid.json",
            r#"{"name":"grid","settings":{"layoutMode":"grid"}}"#,
        );

        f.applier.apply("grid").await.unwrap();
        let first = f.ctx.snapshot().await;
        let revision = f.ctx.revision();
        f.applier.apply("grid").await.unwrap();

        assert_eq!(f.ctx.snapshot().await, first);
        assert_eq!(f.ctx.revision(), revision);
    }

    #[tokio::test]
    async fn test_apply_missing_preset_notifies_and_leaves_live_untouched() {
        // Arrange
        let mut mock = MockNotifier::new();
        mock.expect_notify()
            .withf(|n| n.level == NoticeLevel::Error && n.message.contains("ghost"))
            .times(1)
            .return_const(());
        let mut live = SettingsBundle::default();
        live.card_width = 321;
        let f = fixture_with(Arc::new(mock), live.clone());

        // Act
        let result = f.applier.apply("ghost").await;

        // Assert
        assert_eq!(result, Err(PresetError::NotFound("ghost".to_string())));
        assert_eq!(f.ctx.snapshot().await, live);
    }

    #[tokio::test]
    async fn test_apply_ignores_and_reports_global_keys_in_file() {
        let f = fixture();
        f.backend.insert_raw(
            "card-presets/sneaky.json",
            r#"{"name":"sneaky","settings":{"cardWidth":300,"autoApplyPresets":false}}"#,
        );

        let applied = f.applier.apply("sneaky").await.unwrap();

        assert_eq!(applied.ignored_keys, vec![SettingKey::AutoApplyPresets]);
        assert!(f.ctx.snapshot().await.auto_apply_presets);
    }

    #[tokio::test]
    async fn test_apply_default_regenerates_missing_file() {
        let f = fixture();

        let applied = f.applier.apply("default").await.unwrap();

        assert_eq!(applied.name, "default");
        assert!(f.backend.contents("card-presets/default.json").is_some());
    }

    #[tokio::test]
    async fn test_commit_if_refuses_when_guard_fails() {
        let f = fixture();
        let preset = Preset::default_preset();

        let result = f.applier.commit_if(&preset, || false).await.unwrap();

        assert!(result.is_none());
        assert_eq!(f.ctx.snapshot().await.last_active_preset, None);
    }
}
