//! Error taxonomy shared by every preset operation.
//!
//! The variants mirror the outcomes callers must distinguish:
//!
//! - `NotFound` / `Corrupt` are *read* outcomes.  The resolver treats both as
//!   "try the next candidate"; the applier surfaces them as a notice.
//! - `AlreadyExists` is only produced by `create`; overwriting an existing
//!   non-default preset through save-as is not an error.
//! - `Protected` is raised before any I/O when something tries to edit,
//!   rename or delete the `"default"` preset.
//! - `InvalidImport` rejects an import blob as a whole; nothing is written.

use thiserror::Error;

/// Error type for preset store, manager and codec operations.
///
/// All payloads are owned strings so the error can be cloned into notices
/// and compared in tests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PresetError {
    /// No backing file exists for the named preset.
    #[error("preset not found: {0}")]
    NotFound(String),

    /// The backing file exists but could not be parsed or lacks required fields.
    #[error("preset '{name}' is corrupt: {reason}")]
    Corrupt { name: String, reason: String },

    /// A create was requested for a name that is already taken.
    #[error("preset already exists: {0}")]
    AlreadyExists(String),

    /// The default preset cannot be edited, renamed or deleted.
    #[error("preset '{0}' is protected and cannot be modified")]
    Protected(String),

    /// The import payload is malformed.
    #[error("invalid import: {0}")]
    InvalidImport(String),

    /// The preset name is empty or not usable as a file name.
    #[error("invalid preset name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Global keys are not part of any preset.
    #[error("'{0}' is a global setting and cannot be stored in a preset")]
    GlobalKey(String),

    /// The editing session is closed, or another one is already open.
    #[error("editing session: {0}")]
    EditSession(String),

    /// A preset could not be encoded for storage or export.
    #[error("failed to encode preset: {0}")]
    Encode(String),

    /// The storage backend failed while reading, writing or deleting.
    #[error("storage error: {0}")]
    Storage(String),
}

impl PresetError {
    /// Returns `true` for the outcomes the resolver falls through on.
    pub fn is_fallthrough(&self) -> bool {
        matches!(self, PresetError::NotFound(_) | PresetError::Corrupt { .. })
    }
}
