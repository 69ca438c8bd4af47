//! Use case: edit a preset in a staging buffer with live preview.
//!
//! While the preset editor is open, the user's changes go into a
//! [`StagingSession`] buffer rather than straight into a preset file.  The
//! buffer is mirrored into the live settings so the card view previews the
//! edit, but nothing is written to the preset store until the user picks
//! **Save as**.
//!
//! # Debounced mirroring (for beginners)
//!
//! Dragging a slider produces dozens of `update_field` calls per second.
//! Mirroring and persisting each one would hammer the settings file, so the
//! mirror is *debounced*: every update re-arms a timer, and only when the
//! timer runs out without another update (300 ms by default) is the buffer
//! mirrored, once.
//!
//! ```text
//! update ─┐   update ─┐   update ─┐
//!         ▼           ▼           ▼
//!   [timer 1 ✗]  [timer 2 ✗]  [timer 3 ──── 300 ms ────▶ mirror + save]
//! ```
//!
//! Each armed timer carries a token; a timer whose token is no longer the
//! latest does nothing when it fires.  [`StagingSession::close`] mirrors any
//! pending value immediately so closing the editor never loses the last
//! edit.
//!
//! # Pausing resolution
//!
//! An open session holds the [`EditGate`].  While it is held, note changes
//! do not apply presets; the latest subject is remembered and resolved once
//! the session ends.  Otherwise opening a different note mid-edit would
//! replace the preview under the user's hands.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use preset_core::domain::preset::DEFAULT_PRESET_NAME;
use preset_core::{
    is_default_name, PartialSettings, Preset, PresetError, SettingField, SettingsBundle,
};

use super::apply_preset::merge_preset;
use super::settings_context::SettingsContext;
use crate::infrastructure::notify::{Notice, Notifier};
use crate::infrastructure::storage::preset_store::PresetStore;

/// Quiet window used when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Where a newly saved preset should be bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// Save only; no mapping changes.
    None,
    /// Bind the preset to a folder or tag.
    Folder(String),
    /// Make the preset the global fallback.
    Global,
}

// ── Edit gate ─────────────────────────────────────────────────────────────────

/// Tracks whether an editing session is open and which subject arrived
/// while it was.
///
/// Sessions are identified by a number so that a stale handle releasing
/// the gate cannot close a newer session.
#[derive(Debug, Default)]
pub struct EditGate {
    holder: AtomicU64,
    next_id: AtomicU64,
    deferred: StdMutex<Option<String>>,
}

impl EditGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a session holds the gate.
    pub fn is_open(&self) -> bool {
        self.holder.load(Ordering::Acquire) != 0
    }

    fn try_acquire(&self) -> Option<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.holder
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| id)
    }

    fn release(&self, id: u64) {
        let _ = self
            .holder
            .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Remembers `subject` as the one to resolve when the gate opens up.
    /// A later call replaces an earlier one.
    pub fn defer(&self, subject: Option<&str>) {
        *self.deferred.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(subject.unwrap_or_default().to_string());
    }

    /// Takes the remembered subject, if any.
    pub fn take_deferred(&self) -> Option<String> {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

// ── Session state ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct StagingState {
    buffer: Option<PartialSettings>,
    /// Live settings to restore on discard.
    snapshot: SettingsBundle,
    pending: bool,
    timer_token: u64,
    closed: bool,
    mirrors: u64,
}

struct StagingShared {
    ctx: Arc<SettingsContext>,
    state: Mutex<StagingState>,
    /// Set when the session handle is dropped; pending timers then do nothing.
    abandoned: AtomicBool,
}

impl StagingShared {
    /// Copies the buffer into the live settings, keeping every global key.
    async fn mirror(&self, state: &mut StagingState) -> Result<(), PresetError> {
        state.pending = false;
        let buffer = match &state.buffer {
            Some(buffer) => buffer.clone(),
            None => return Ok(()),
        };
        state.mirrors += 1;

        let baseline = self.ctx.baseline();
        self.ctx
            .modify(|live| {
                let preserved = live.global_snapshot();
                *live = SettingsBundle::compose(baseline, &buffer, &preserved);
                Some(())
            })
            .await?;
        debug!("staged edits mirrored to live settings");
        Ok(())
    }
}

/// An open preset editor.
///
/// Obtained from [`crate::application::engine::PresetEngine::begin_editing`].
pub struct StagingSession {
    id: u64,
    shared: Arc<StagingShared>,
    store: Arc<PresetStore>,
    notifier: Arc<dyn Notifier>,
    gate: Arc<EditGate>,
    debounce: Duration,
}

impl StagingSession {
    /// Opens a session and seeds the buffer from the last active preset,
    /// or the default preset if there is none or it no longer loads.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::EditSession`] if another session is open, or
    /// [`PresetError::Storage`] if even the default preset cannot be
    /// produced.
    pub async fn open(
        store: Arc<PresetStore>,
        ctx: Arc<SettingsContext>,
        notifier: Arc<dyn Notifier>,
        gate: Arc<EditGate>,
        debounce: Duration,
    ) -> Result<Self, PresetError> {
        let id = gate.try_acquire().ok_or_else(|| {
            PresetError::EditSession("another editing session is already open".to_string())
        })?;

        let snapshot = ctx.snapshot().await;
        let seed_name = snapshot
            .last_active_preset
            .clone()
            .unwrap_or_else(|| DEFAULT_PRESET_NAME.to_string());

        let seed = match load(&store, &seed_name).await {
            Ok(preset) => Ok(preset),
            Err(e) if e.is_fallthrough() => {
                warn!("cannot seed editor from '{seed_name}' ({e}); using default");
                store.ensure_default().await
            }
            Err(e) => Err(e),
        };
        let seed = match seed {
            Ok(seed) => seed,
            Err(e) => {
                gate.release(id);
                return Err(e);
            }
        };

        let buffer = projection(ctx.baseline(), &seed.settings);
        info!("editing session opened from preset '{}'", seed.name);

        let shared = Arc::new(StagingShared {
            ctx,
            state: Mutex::new(StagingState {
                buffer: Some(buffer),
                snapshot,
                pending: false,
                timer_token: 0,
                closed: false,
                mirrors: 0,
            }),
            abandoned: AtomicBool::new(false),
        });

        Ok(Self {
            id,
            shared,
            store,
            notifier,
            gate,
            debounce,
        })
    }

    /// The current buffer, or `None` once the session was discarded.
    pub async fn buffer(&self) -> Option<PartialSettings> {
        self.shared.state.lock().await.buffer.clone()
    }

    /// Returns `true` while an edit is waiting for its debounce window.
    pub async fn has_pending_flush(&self) -> bool {
        self.shared.state.lock().await.pending
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.state.lock().await.closed
    }

    /// Number of times the buffer has been mirrored into live settings.
    pub async fn mirror_count(&self) -> u64 {
        self.shared.state.lock().await.mirrors
    }

    /// Replaces the buffer with a stored preset and previews it at once.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] / [`PresetError::Corrupt`] (after
    /// notifying the user; the buffer is unchanged) or
    /// [`PresetError::EditSession`] if the session is closed.
    pub async fn apply_preview(&self, name: &str) -> Result<(), PresetError> {
        let mut state = self.shared.state.lock().await;
        ensure_open(&state)?;

        let preset = match load(&self.store, name).await {
            Ok(preset) => preset,
            Err(e) => {
                self.notifier
                    .notify(Notice::error(format!("Could not load preset '{name}': {e}")));
                return Err(e);
            }
        };

        state.buffer = Some(projection(self.shared.ctx.baseline(), &preset.settings));
        state.timer_token += 1;
        self.shared.mirror(&mut state).await
    }

    /// Resets the buffer to the default preset and previews it.
    ///
    /// # Errors
    ///
    /// See [`StagingSession::apply_preview`].
    pub async fn revert_to_default(&self) -> Result<(), PresetError> {
        self.apply_preview(DEFAULT_PRESET_NAME).await
    }

    /// Records one edit and (re)arms the debounce timer.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::GlobalKey`] for global keys, which no preset
    /// may carry, or [`PresetError::EditSession`] if the session is closed.
    pub async fn update_field(&self, field: SettingField) -> Result<(), PresetError> {
        let key = field.key();
        if key.is_global() {
            return Err(PresetError::GlobalKey(key.wire_name().to_string()));
        }

        let mut state = self.shared.state.lock().await;
        ensure_open(&state)?;
        state
            .buffer
            .get_or_insert_with(PartialSettings::default)
            .set(field);
        state.pending = true;
        state.timer_token += 1;
        self.arm_timer(state.timer_token);
        Ok(())
    }

    /// Mirrors a pending edit now instead of waiting for the timer.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the live settings could not be
    /// persisted.
    pub async fn flush(&self) -> Result<(), PresetError> {
        let mut state = self.shared.state.lock().await;
        if !state.pending {
            return Ok(());
        }
        state.timer_token += 1;
        self.shared.mirror(&mut state).await
    }

    /// Writes the buffer as a new (or replaced) preset, makes it the active
    /// preset and optionally binds it.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Protected`] for the default preset's name and
    /// [`PresetError::InvalidName`] for unusable names, both before any
    /// I/O.  Returns [`PresetError::Storage`] if the file cannot be written.
    pub async fn save_as(
        &self,
        name: &str,
        description: &str,
        target: SaveTarget,
    ) -> Result<Preset, PresetError> {
        let mut state = self.shared.state.lock().await;
        ensure_open(&state)?;

        let buffer = state.buffer.clone().unwrap_or_default();
        let preset = Preset::new(name, description, buffer)?;

        if let Err(e) = self.store.write(&preset).await {
            self.notifier
                .notify(Notice::error(format!("Could not save preset '{}': {e}", preset.name)));
            return Err(e);
        }

        state.pending = false;
        state.timer_token += 1;

        let baseline = self.shared.ctx.baseline();
        self.shared
            .ctx
            .modify(|live| {
                let mut next = merge_preset(baseline, live, &preset.settings, &preset.name);
                match &target {
                    SaveTarget::None => {}
                    SaveTarget::Folder(subject) => {
                        next.mappings_mut().assign(subject, &preset.name);
                    }
                    SaveTarget::Global => next.mappings_mut().set_global(Some(&preset.name)),
                }
                *live = next;
                Some(())
            })
            .await?;

        state.snapshot = self.shared.ctx.snapshot().await;
        info!("saved preset '{}' ({target:?})", preset.name);
        self.notifier
            .notify(Notice::info(format!("Saved preset '{}'", preset.name)));
        Ok(preset)
    }

    /// Ends the session, mirroring any pending edit first.
    ///
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the final mirror could not be
    /// persisted; the session is closed regardless.
    pub async fn close(&self) -> Result<(), PresetError> {
        let mut state = self.shared.state.lock().await;
        if state.closed {
            return Ok(());
        }
        let flushed = if state.pending {
            state.timer_token += 1;
            self.shared.mirror(&mut state).await
        } else {
            Ok(())
        };
        state.closed = true;
        self.gate.release(self.id);
        debug!("editing session closed");
        flushed
    }

    /// Ends the session without saving and restores the live settings to
    /// what they were when it opened (or at the last save).
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if the restored settings could not be
    /// persisted; the session is closed regardless.
    pub async fn discard(&self) -> Result<(), PresetError> {
        let mut state = self.shared.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.buffer = None;
        state.pending = false;
        state.timer_token += 1;
        state.closed = true;

        let restore = state.snapshot.preset_projection();
        let baseline = self.shared.ctx.baseline();
        let restored = self
            .shared
            .ctx
            .modify(|live| {
                let preserved = live.global_snapshot();
                *live = SettingsBundle::compose(baseline, &restore, &preserved);
                Some(())
            })
            .await;

        self.gate.release(self.id);
        debug!("editing session discarded");
        restored.map(|_| ())
    }

    fn arm_timer(&self, token: u64) {
        let shared = Arc::clone(&self.shared);
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = shared.state.lock().await;
            if state.timer_token != token
                || !state.pending
                || state.closed
                || shared.abandoned.load(Ordering::Acquire)
            {
                return;
            }
            if let Err(e) = shared.mirror(&mut state).await {
                warn!("debounced mirror failed: {e}");
            }
        });
    }
}

impl Drop for StagingSession {
    fn drop(&mut self) {
        // Pending edits of an unclosed session are dropped with it.
        self.shared.abandoned.store(true, Ordering::Release);
        self.gate.release(self.id);
    }
}

fn ensure_open(state: &StagingState) -> Result<(), PresetError> {
    if state.closed {
        Err(PresetError::EditSession("session is closed".to_string()))
    } else {
        Ok(())
    }
}

/// Every preset-scoped value `settings` resolves to over the baseline.
fn projection(baseline: &SettingsBundle, settings: &PartialSettings) -> PartialSettings {
    SettingsBundle::compose(baseline, settings, &PartialSettings::default()).preset_projection()
}

async fn load(store: &PresetStore, name: &str) -> Result<Preset, PresetError> {
    if is_default_name(name) {
        store.ensure_default().await
    } else {
        store.read(name).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
