//! Use case: the active note changed; apply the preset that belongs to it.
//!
//! # Flow
//!
//! 1. Take a [`Generation`] so later requests can supersede this one.
//! 2. If auto-apply is off, stop ([`ResolveOutcome::Disabled`]).
//! 3. If an editing session is open, remember the subject and stop
//!    ([`ResolveOutcome::Paused`]); it is resolved when editing ends.
//! 4. Walk the resolver's candidate list (deepest mapped folder first, then
//!    the global preset, then `"default"`) and load the first preset that
//!    is neither missing nor corrupt.
//! 5. Commit it, but only if no newer request has started in the meantime.
//!    Otherwise the result is dropped ([`ResolveOutcome::Stale`]).
//!
//! Steps 4 and 5 never fail for lack of a preset: the default preset is
//! regenerated when missing, and if even that cannot be written the
//! built-in template is applied from memory.

use std::sync::Arc;

use tracing::{debug, error, warn};

use preset_core::{candidates, resolve, Generation, GenerationCounter, Preset, PresetError};

use super::apply_preset::PresetApplier;
use super::settings_context::SettingsContext;
use super::stage_edits::EditGate;
use crate::infrastructure::notify::{Notice, Notifier};

/// What happened to one subject change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The named preset is now live.
    Applied { name: String, generation: Generation },
    /// A newer subject change started first; this result was dropped.
    Stale { generation: Generation },
    /// An editing session is open; the subject will be resolved later.
    Paused,
    /// Auto-apply is turned off.
    Disabled,
}

/// Turns subject changes into preset applications.
pub struct SubjectResolver {
    applier: Arc<PresetApplier>,
    ctx: Arc<SettingsContext>,
    notifier: Arc<dyn Notifier>,
    gate: Arc<EditGate>,
    generations: GenerationCounter,
}

impl SubjectResolver {
    pub fn new(
        applier: Arc<PresetApplier>,
        ctx: Arc<SettingsContext>,
        notifier: Arc<dyn Notifier>,
        gate: Arc<EditGate>,
    ) -> Self {
        Self {
            applier,
            ctx,
            notifier,
            gate,
            generations: GenerationCounter::new(),
        }
    }

    /// The preset name `subject` resolves to under the current mappings,
    /// without loading or applying anything.
    pub async fn resolve_name(&self, subject: Option<&str>) -> String {
        self.ctx
            .read(|live| resolve(subject, live.mappings()))
            .await
    }

    /// Handles a subject change.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] only if the applied settings could
    /// not be persisted.
    pub async fn on_subject_changed(
        &self,
        subject: Option<&str>,
    ) -> Result<ResolveOutcome, PresetError> {
        let generation = self.generations.begin();

        let (auto_apply, names) = self
            .ctx
            .read(|live| (live.auto_apply_presets, candidates(subject, live.mappings())))
            .await;
        if !auto_apply {
            debug!("auto-apply disabled; ignoring subject {subject:?}");
            return Ok(ResolveOutcome::Disabled);
        }
        if self.gate.is_open() {
            debug!("editing in progress; deferring subject {subject:?}");
            self.gate.defer(subject);
            return Ok(ResolveOutcome::Paused);
        }

        let preset = self.load_first(&names).await;
        let committed = self
            .applier
            .commit_if(&preset, || {
                self.generations.is_current(generation) && !self.gate.is_open()
            })
            .await?;

        match committed {
            Some(applied) => Ok(ResolveOutcome::Applied {
                name: applied.name,
                generation,
            }),
            None if self.generations.is_current(generation) && self.gate.is_open() => {
                self.gate.defer(subject);
                Ok(ResolveOutcome::Paused)
            }
            None => {
                debug!("resolution {generation} superseded by {}", self.generations.latest());
                Ok(ResolveOutcome::Stale { generation })
            }
        }
    }

    /// Resolves the subject deferred while editing, if there is one.
    ///
    /// # Errors
    ///
    /// See [`SubjectResolver::on_subject_changed`].
    pub async fn resume(&self) -> Result<Option<ResolveOutcome>, PresetError> {
        match self.gate.take_deferred() {
            Some(subject) => {
                let subject = Some(subject.as_str()).filter(|s| !s.is_empty());
                self.on_subject_changed(subject).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// The most recently issued generation.
    pub fn latest_generation(&self) -> Generation {
        self.generations.latest()
    }

    async fn load_first(&self, names: &[String]) -> Preset {
        for name in names {
            match self.applier.load(name).await {
                Ok(preset) => return preset,
                Err(e) => {
                    warn!("preset '{name}' unavailable ({e}); trying next candidate");
                    self.notifier.notify(Notice::warning(format!(
                        "Preset '{name}' could not be loaded: {e}"
                    )));
                }
            }
        }
        error!("no candidate preset could be loaded; using the built-in default");
        Preset::default_preset()
    }
}
