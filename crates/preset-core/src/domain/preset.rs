//! The `Preset` entity.
//!
//! A preset is a named, partial settings bundle that never contains global
//! keys.  Exactly one preset, `"default"`, is flagged `is_default`; it mirrors
//! the baseline template and cannot be renamed, edited or deleted.

use serde::{Deserialize, Serialize};

use crate::domain::settings::{PartialSettings, SettingsBundle};
use crate::error::PresetError;

/// Name of the immutable default preset.
pub const DEFAULT_PRESET_NAME: &str = "default";

/// Longest accepted preset name, in characters.
pub const MAX_PRESET_NAME_LEN: usize = 100;

/// Characters that would make a preset name unusable as a file name.
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// A named settings bundle.
///
/// Serialized as `{ "name", "description", "settings", "isDefault" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub settings: PartialSettings,
    #[serde(default)]
    pub is_default: bool,
}

impl Preset {
    /// Creates a user preset.
    ///
    /// The name is trimmed and validated, and any global keys in `settings`
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::InvalidName`] for unusable names and
    /// [`PresetError::Protected`] for the default preset's name.
    pub fn new(
        name: &str,
        description: impl Into<String>,
        settings: PartialSettings,
    ) -> Result<Self, PresetError> {
        let name = validate_name(name)?;
        ensure_mutable(name)?;
        Ok(Self {
            name: name.to_string(),
            description: description.into(),
            settings: settings.without_global_keys(),
            is_default: false,
        })
    }

    /// The default preset, regenerated from the baseline template.
    pub fn default_preset() -> Self {
        Self {
            name: DEFAULT_PRESET_NAME.to_string(),
            description: "Default card view settings".to_string(),
            settings: SettingsBundle::default().preset_projection(),
            is_default: true,
        }
    }

    /// Returns `true` for the default preset.
    pub fn is_protected(&self) -> bool {
        self.is_default || is_default_name(&self.name)
    }

    /// Returns a copy under a different name, never flagged as default.
    pub fn renamed(&self, name: &str) -> Result<Self, PresetError> {
        Preset::new(name, self.description.clone(), self.settings.clone())
    }
}

/// Returns `true` if `name` designates the default preset.
///
/// Case-insensitive so `"Default.json"` cannot shadow `"default.json"` on
/// case-insensitive file systems.
pub fn is_default_name(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(DEFAULT_PRESET_NAME)
}

/// Rejects any mutation of the default preset.
///
/// # Errors
///
/// Returns [`PresetError::Protected`] when `name` is the default preset.
pub fn ensure_mutable(name: &str) -> Result<(), PresetError> {
    if is_default_name(name) {
        Err(PresetError::Protected(DEFAULT_PRESET_NAME.to_string()))
    } else {
        Ok(())
    }
}

/// Validates a preset name and returns it trimmed.
///
/// # Errors
///
/// Returns [`PresetError::InvalidName`] if the name is empty, too long,
/// starts with a dot, or contains path separators or control characters.
pub fn validate_name(name: &str) -> Result<&str, PresetError> {
    let trimmed = name.trim();
    let invalid = |reason: &str| PresetError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if trimmed.chars().count() > MAX_PRESET_NAME_LEN {
        return Err(invalid("name is too long"));
    }
    if trimmed.starts_with('.') {
        return Err(invalid("name must not start with a dot"));
    }
    if trimmed
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_NAME_CHARS.contains(&c))
    {
        return Err(invalid("name contains characters not allowed in file names"));
    }
    Ok(trimmed)
}
