//! In-memory storage doubles.
//!
//! [`MemoryBackend`] stands in for the vault directory and
//! [`MemorySettingsStore`] for the host settings file.  Both record what was
//! done to them so tests can assert on read counts, save counts and the exact
//! bytes written, and both can be told to misbehave (slow reads, failing
//! writes) to exercise error and race handling.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use preset_core::SettingsBundle;

use super::backend::{StorageBackend, StorageError};
use super::config::ConfigError;
use crate::application::settings_context::SettingsPersistence;

/// A [`StorageBackend`] backed by a map from path to contents.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: Mutex<BTreeMap<PathBuf, String>>,
    read_delays: Mutex<HashMap<PathBuf, Duration>>,
    reads: AtomicUsize,
    lookups: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places raw contents at `path`, bypassing the write counter.
    pub fn insert_raw(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .expect("lock poisoned")
            .insert(path.into(), contents.into());
    }

    /// Returns the current contents of `path`, if any.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .lock()
            .expect("lock poisoned")
            .get(path.as_ref())
            .cloned()
    }

    /// Every path currently stored.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Makes every read of `path` sleep for `delay` before returning.
    pub fn set_read_delay(&self, path: impl Into<PathBuf>, delay: Duration) {
        self.read_delays
            .lock()
            .expect("lock poisoned")
            .insert(path.into(), delay);
    }

    /// Makes every subsequent write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `read` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `exists` calls served so far.
    pub fn exists_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of successful `write` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, path: &Path) -> Result<String, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .read_delays
            .lock()
            .expect("lock poisoned")
            .get(path)
            .copied();
        // Contents are taken when the read starts; a delayed read returns
        // what was there at that moment, like a slow disk would.
        let contents = self.contents(path);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        contents.ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(ErrorKind::Other, "simulated write failure"),
            });
        }
        self.insert_raw(path, contents);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self
            .files
            .lock()
            .expect("lock poisoned")
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect())
    }

    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .lock()
            .expect("lock poisoned")
            .contains_key(path))
    }

    async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        self.files
            .lock()
            .expect("lock poisoned")
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }
}

// ── Settings persistence double ───────────────────────────────────────────────

/// A [`SettingsPersistence`] that keeps every saved bundle.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saves: Mutex<Vec<SettingsBundle>>,
    fail: AtomicBool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().expect("lock poisoned").len()
    }

    /// The most recently saved bundle.
    pub fn last_saved(&self) -> Option<SettingsBundle> {
        self.saves.lock().expect("lock poisoned").last().cloned()
    }

    /// Makes every subsequent save fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsPersistence for MemorySettingsStore {
    async fn save(&self, settings: &SettingsBundle) -> Result<(), ConfigError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConfigError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(ErrorKind::Other, "simulated settings save failure"),
            });
        }
        self.saves
            .lock()
            .expect("lock poisoned")
            .push(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_only_returns_direct_children() {
        // Arrange
        let backend = MemoryBackend::new();
        backend.insert_raw("card-presets/a.json", "{}");
        backend.insert_raw("card-presets/nested/b.json", "{}");
        backend.insert_raw("other/c.json", "{}");

        // Act
        let files = backend.list(Path::new("card-presets")).await.unwrap();

        // Assert
        assert_eq!(files, vec![PathBuf::from("card-presets/a.json")]);
    }

    #[tokio::test]
    async fn test_failing_writes_leave_contents_untouched() {
        let backend = MemoryBackend::new();
        backend.insert_raw("p/a.json", "old");
        backend.set_fail_writes(true);

        let result = backend.write(Path::new("p/a.json"), "new").await;

        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(backend.contents("p/a.json").as_deref(), Some("old"));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reads_are_counted() {
        let backend = MemoryBackend::new();
        backend.insert_raw("p/a.json", "x");

        backend.read(Path::new("p/a.json")).await.unwrap();
        let _ = backend.read(Path::new("p/missing.json")).await;

        assert_eq!(backend.read_count(), 2);
    }

    #[test]
    fn test_settings_store_failure_is_reported() {
        let store = MemorySettingsStore::new();
        store.set_fail(true);

        tokio_test::assert_err!(tokio_test::block_on(store.save(&SettingsBundle::default())));
        assert_eq!(store.save_count(), 0);

        store.set_fail(false);
        tokio_test::assert_ok!(tokio_test::block_on(store.save(&SettingsBundle::default())));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_settings_store_records_saves() {
        let store = MemorySettingsStore::new();
        let mut bundle = SettingsBundle::default();
        bundle.card_width = 999;

        store.save(&bundle).await.unwrap();

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.last_saved().unwrap().card_width, 999);
    }
}
