//! Pluggable blob storage underneath the preset store.
//!
//! The store only ever needs five primitives: read a text blob, write it,
//! list a directory, test for existence and delete.  Hiding them behind the
//! [`StorageBackend`] trait lets the application run against the real vault
//! directory ([`FsBackend`]) in production and against an in-memory map
//! ([`super::memory::MemoryBackend`]) in tests.
//!
//! # Paths
//!
//! Every path handed to a backend is *relative* to the backend's root (the
//! vault).  `FsBackend` joins it onto its root directory; the memory backend
//! uses it as a map key verbatim.
//!
//! # Atomic writes
//!
//! `FsBackend::write` first writes a sibling temp file named with a random
//! UUID and then renames it over the target.  A crash mid-write therefore
//! leaves either the old preset or the new one, never a truncated file that
//! would later load as `Corrupt`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Error type for backend operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing exists at the path.
    #[error("no such file: {0}")]
    NotFound(PathBuf),

    /// Any other file system failure.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == ErrorKind::NotFound {
            StorageError::NotFound(path.to_path_buf())
        } else {
            StorageError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Text blob storage addressed by relative paths.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Reads the whole blob at `path`.
    async fn read(&self, path: &Path) -> Result<String, StorageError>;

    /// Creates or replaces the blob at `path`, creating parent directories.
    async fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError>;

    /// Lists the files directly inside `dir`.  A missing directory is empty.
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError>;

    async fn exists(&self, path: &Path) -> Result<bool, StorageError>;

    /// Deletes the blob at `path`.
    ///
    /// Returns [`StorageError::NotFound`] if there is nothing to delete.
    async fn delete(&self, path: &Path) -> Result<(), StorageError>;
}

// ── File system backend ───────────────────────────────────────────────────────

/// Backend rooted at a directory on the local file system.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn read(&self, path: &Path) -> Result<String, StorageError> {
        let full = self.full(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| StorageError::from_io(&full, e))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError> {
        let full = self.full(path);
        if let Some(dir) = full.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::from_io(dir, e))?;
        }

        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = full.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        tokio::fs::write(&temp, contents)
            .await
            .map_err(|e| StorageError::from_io(&temp, e))?;
        if let Err(e) = tokio::fs::rename(&temp, &full).await {
            // Leave no stray temp file behind on failure.
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::from_io(&full, e));
        }
        debug!("wrote {} bytes to {}", contents.len(), full.display());
        Ok(())
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let full = self.full(dir);
        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from_io(&full, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(&full, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                files.push(dir.join(entry.file_name()));
            }
        }
        files.sort();
        Ok(files)
    }

    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let full = self.full(path);
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| StorageError::from_io(&full, e))
    }

    async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        let full = self.full(path);
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| StorageError::from_io(&full, e))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
