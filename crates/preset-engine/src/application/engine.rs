//! The engine facade: one object wiring store, settings, applier, resolver,
//! manager and staging together.
//!
//! Hosts construct a [`PresetEngine`] once at startup, call
//! [`PresetEngine::bootstrap`], then forward note changes to
//! [`PresetEngine::on_subject_changed`] and open the editor through
//! [`PresetEngine::begin_editing`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use preset_core::{PresetError, SettingsBundle, DEFAULT_CACHE_CAPACITY};

use super::apply_preset::{AppliedPreset, PresetApplier};
use super::manage_presets::PresetManager;
use super::resolve_subject::{ResolveOutcome, SubjectResolver};
use super::settings_context::{SettingsContext, SettingsPersistence};
use super::stage_edits::{EditGate, StagingSession, DEFAULT_DEBOUNCE};
use crate::infrastructure::notify::Notifier;
use crate::infrastructure::storage::backend::StorageBackend;
use crate::infrastructure::storage::config::EngineConfig;
use crate::infrastructure::storage::preset_store::PresetStore;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub cache_capacity: usize,
    pub debounce: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            cache_capacity: config.cache_capacity,
            debounce: Duration::from_millis(config.debounce_ms),
        }
    }
}

/// The preset engine.
pub struct PresetEngine {
    ctx: Arc<SettingsContext>,
    store: Arc<PresetStore>,
    notifier: Arc<dyn Notifier>,
    applier: Arc<PresetApplier>,
    resolver: SubjectResolver,
    manager: PresetManager,
    gate: Arc<EditGate>,
    debounce: Duration,
}

impl PresetEngine {
    /// Wires an engine over `backend`, starting from the persisted
    /// `settings`.  Presets are read from `settings.preset_folder`.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        settings: SettingsBundle,
        persistence: Arc<dyn SettingsPersistence>,
        notifier: Arc<dyn Notifier>,
        options: EngineOptions,
    ) -> Self {
        let store = Arc::new(PresetStore::new(
            backend,
            settings.preset_folder.clone(),
            options.cache_capacity,
        ));
        let ctx = Arc::new(SettingsContext::new(settings, persistence));
        let gate = Arc::new(EditGate::new());
        let applier = Arc::new(PresetApplier::new(
            Arc::clone(&store),
            Arc::clone(&ctx),
            Arc::clone(&notifier),
        ));
        let resolver = SubjectResolver::new(
            Arc::clone(&applier),
            Arc::clone(&ctx),
            Arc::clone(&notifier),
            Arc::clone(&gate),
        );
        let manager = PresetManager::new(
            Arc::clone(&store),
            Arc::clone(&ctx),
            Arc::clone(&applier),
            Arc::clone(&notifier),
        );

        Self {
            ctx,
            store,
            notifier,
            applier,
            resolver,
            manager,
            gate,
            debounce: options.debounce,
        }
    }

    /// Prepares the preset folder: the default preset is created (or
    /// repaired) so resolution always has something to fall back on.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the default preset cannot be written.
    pub async fn bootstrap(&self) -> Result<(), PresetError> {
        self.store.ensure_default().await?;
        let presets = self.store.list().await?;
        info!(
            "preset engine ready: {} preset(s) in {}",
            presets.len(),
            self.store.folder().await.display()
        );
        Ok(())
    }

    /// The note (or tag) in view changed.  See [`SubjectResolver`].
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the new settings could not be
    /// persisted.
    pub async fn on_subject_changed(
        &self,
        subject: Option<&str>,
    ) -> Result<ResolveOutcome, PresetError> {
        self.resolver.on_subject_changed(subject).await
    }

    /// Which preset `subject` resolves to, without applying it.
    pub async fn resolve(&self, subject: Option<&str>) -> String {
        self.resolver.resolve_name(subject).await
    }

    /// Applies a preset by name, regardless of mappings.
    ///
    /// # Errors
    ///
    /// See [`PresetApplier::apply`].
    pub async fn apply(&self, name: &str) -> Result<AppliedPreset, PresetError> {
        self.applier.apply(name).await
    }

    /// Opens the preset editor.  Subject changes are deferred until it ends.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::EditSession`] if an editor is already open.
    pub async fn begin_editing(&self) -> Result<StagingSession, PresetError> {
        StagingSession::open(
            Arc::clone(&self.store),
            Arc::clone(&self.ctx),
            Arc::clone(&self.notifier),
            Arc::clone(&self.gate),
            self.debounce,
        )
        .await
    }

    /// Closes the editor (flushing pending edits) and resolves any subject
    /// that changed while it was open.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if settings could not be persisted.
    pub async fn finish_editing(
        &self,
        session: StagingSession,
    ) -> Result<Option<ResolveOutcome>, PresetError> {
        session.close().await?;
        drop(session);
        self.resume_resolution().await
    }

    /// Discards the editor's changes and resolves any deferred subject.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if settings could not be persisted.
    pub async fn cancel_editing(
        &self,
        session: StagingSession,
    ) -> Result<Option<ResolveOutcome>, PresetError> {
        session.discard().await?;
        drop(session);
        self.resume_resolution().await
    }

    /// Resolves the subject deferred while editing, if any.  Hosts that
    /// close sessions themselves call this afterwards.
    ///
    /// # Errors
    ///
    /// See [`PresetEngine::on_subject_changed`].
    pub async fn resume_resolution(&self) -> Result<Option<ResolveOutcome>, PresetError> {
        if self.gate.is_open() {
            return Ok(None);
        }
        self.resolver.resume().await
    }

    /// Returns `true` while an editor is open.
    pub fn is_editing(&self) -> bool {
        self.gate.is_open()
    }

    pub fn manager(&self) -> &PresetManager {
        &self.manager
    }

    pub fn store(&self) -> &Arc<PresetStore> {
        &self.store
    }

    pub fn context(&self) -> &Arc<SettingsContext> {
        &self.ctx
    }

    /// A copy of the live settings.
    pub async fn settings(&self) -> SettingsBundle {
        self.ctx.snapshot().await
    }

    /// Refresh signal; changes whenever the live settings change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.ctx.subscribe()
    }
}
