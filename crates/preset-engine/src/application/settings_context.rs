//! The single owner of the live settings bundle.
//!
//! Every component that changes what the card view displays (the applier,
//! the staging session, the preset manager) goes through one
//! [`SettingsContext`] handle instead of touching a shared global.  The
//! context:
//!
//! 1. holds the live bundle behind a `tokio::sync::RwLock`,
//! 2. persists it through a [`SettingsPersistence`] after each change, and
//! 3. bumps a revision number on a `tokio::sync::watch` channel so the view
//!    knows to re-render.
//!
//! # Conditional commits
//!
//! [`SettingsContext::modify`] runs a closure against a copy of the live
//! bundle while holding the write lock.  The closure may refuse the change
//! by returning `None`; this is how a resolution that has gone stale backs
//! out without a window in which a newer request could slip in between the
//! staleness check and the write.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error};

use preset_core::{PresetError, SettingsBundle};

use crate::infrastructure::storage::config::ConfigError;

/// Durable home of the live settings bundle.
#[async_trait]
pub trait SettingsPersistence: Send + Sync {
    /// Saves the complete bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the bundle cannot be written and
    /// [`ConfigError::Serialize`] when it cannot be encoded.
    async fn save(&self, settings: &SettingsBundle) -> Result<(), ConfigError>;
}

/// Handle to the live settings.
pub struct SettingsContext {
    live: RwLock<SettingsBundle>,
    baseline: SettingsBundle,
    revision: watch::Sender<u64>,
    persistence: Arc<dyn SettingsPersistence>,
}

impl SettingsContext {
    /// Creates a context whose live bundle starts as `initial`.
    pub fn new(initial: SettingsBundle, persistence: Arc<dyn SettingsPersistence>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            live: RwLock::new(initial),
            baseline: SettingsBundle::default(),
            revision,
            persistence,
        }
    }

    /// The baseline template every merge starts from.
    pub fn baseline(&self) -> &SettingsBundle {
        &self.baseline
    }

    /// A copy of the live bundle.
    pub async fn snapshot(&self) -> SettingsBundle {
        self.live.read().await.clone()
    }

    /// Reads from the live bundle without copying all of it.
    pub async fn read<R>(&self, f: impl FnOnce(&SettingsBundle) -> R) -> R {
        let live = self.live.read().await;
        f(&*live)
    }

    /// Subscribes to refresh signals.  The value is the revision number.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Number of refresh signals emitted so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Applies `f` to the live bundle.
    ///
    /// `f` works on a copy.  If it returns `None` the copy is dropped and
    /// nothing happens.  If it returns `Some` and the copy differs from the
    /// live bundle, the copy becomes live, is persisted, and a refresh is
    /// signalled.  The value inside `Some` is passed through to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Storage`] if persisting fails.  The in-memory
    /// change and the refresh signal still happen in that case, so the view
    /// keeps showing what the user chose.
    pub async fn modify<F, R>(&self, f: F) -> Result<Option<R>, PresetError>
    where
        F: FnOnce(&mut SettingsBundle) -> Option<R>,
    {
        let mut live = self.live.write().await;
        let mut next = live.clone();
        let result = match f(&mut next) {
            Some(result) => result,
            None => return Ok(None),
        };
        if next == *live {
            return Ok(Some(result));
        }

        *live = next;
        let saved = self.persistence.save(&live).await;
        self.revision.send_modify(|rev| *rev += 1);
        debug!("live settings changed (revision {})", self.revision());
        drop(live);

        saved.map_err(|e| {
            error!("failed to persist settings: {e}");
            PresetError::Storage(e.to_string())
        })?;
        Ok(Some(result))
    }

    /// Replaces the live bundle wholesale.
    ///
    /// # Errors
    ///
    /// See [`SettingsContext::modify`].
    pub async fn replace(&self, next: SettingsBundle) -> Result<(), PresetError> {
        self.modify(move |live| {
            *live = next;
            Some(())
        })
        .await
        .map(|_| ())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::memory::MemorySettingsStore;

    fn context() -> (SettingsContext, Arc<MemorySettingsStore>) {
        let store = Arc::new(MemorySettingsStore::new());
        let persistence: Arc<dyn SettingsPersistence> = store.clone();
        let ctx = SettingsContext::new(SettingsBundle::default(), persistence);
        (ctx, store)
    }

    #[tokio::test]
    async fn test_modify_persists_and_signals_refresh() {
        // Arrange
        let (ctx, store) = context();
        let mut rx = ctx.subscribe();

        // Act
        ctx.modify(|s| {
            s.card_width = 400;
            Some(())
        })
        .await
        .unwrap();

        // Assert
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(store.save_count(), 1);
        assert_eq!(ctx.snapshot().await.card_width, 400);
    }

    #[tokio::test]
    async fn test_rejected_modify_changes_nothing() {
        let (ctx, store) = context();

        let result = ctx
            .modify(|s| {
                s.card_width = 1;
                None::<()>
            })
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(ctx.snapshot().await.card_width, 250);
        assert_eq!(store.save_count(), 0);
        assert_eq!(ctx.revision(), 0);
    }

    #[tokio::test]
    async fn test_no_op_modify_neither_saves_nor_refreshes() {
        let (ctx, store) = context();

        let result = ctx.modify(|_| Some(7)).await.unwrap();

        assert_eq!(result, Some(7));
        assert_eq!(store.save_count(), 0);
        assert_eq!(ctx.revision(), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_change_and_reports_storage_error() {
        // Arrange
        let (ctx, store) = context();
        store.set_fail(true);

        // Act
        let result = ctx
            .replace(SettingsBundle {
                font_size: 20,
                ..SettingsBundle::default()
            })
            .await;

        // Assert
        match result {
            Err(PresetError::Storage(message)) => {
                assert!(message.contains("simulated settings save failure"));
            }
            other => panic!("expected a storage error, got {other:?}"),
        }
        assert_eq!(ctx.snapshot().await.font_size, 20);
        assert_eq!(ctx.revision(), 1);
    }
}
