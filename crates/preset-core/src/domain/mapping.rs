//! Folder/tag → preset mapping tables.
//!
//! Three tables live inside the global settings (key `presetMappings`), not in
//! preset files:
//!
//! - `folder_presets`: subject → ordered list of candidate preset names.  In
//!   practice each list holds one entry, but the model allows several.
//! - `active_folder_presets`: subject → the preset currently selected there.
//!   This is what the resolver consults.
//! - `global_preset`: the preset used when no subject mapping applies.
//!
//! A *subject* is a vault folder (`Projects/Alpha`) or a tag
//! (`#project/alpha`).  Both are stored normalised, see [`normalize_subject`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::preset::DEFAULT_PRESET_NAME;

/// Normalised name of the vault root folder.
pub const ROOT_FOLDER: &str = "/";

/// Persisted mapping tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MappingTables {
    pub folder_presets: BTreeMap<String, Vec<String>>,
    pub active_folder_presets: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_preset: Option<String>,
}

/// Normalises a folder path or tag.
///
/// Backslashes become `/`, empty and `.` segments are dropped, and the vault
/// root (empty path or `/`) becomes [`ROOT_FOLDER`].
pub fn normalize_subject(subject: &str) -> String {
    let normalized = subject
        .trim()
        .replace('\\', "/")
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if normalized.is_empty() {
        ROOT_FOLDER.to_string()
    } else {
        normalized
    }
}

impl MappingTables {
    /// Returns `true` when no subject has an active preset.
    pub fn is_empty(&self) -> bool {
        self.active_folder_presets.is_empty()
    }

    /// The preset active for exactly `subject`, without walking ancestors.
    pub fn active_for(&self, subject: &str) -> Option<&str> {
        self.active_folder_presets
            .get(&normalize_subject(subject))
            .map(String::as_str)
    }

    /// The global preset, or `"default"` when none is set.
    pub fn global_or_default(&self) -> &str {
        self.global_preset
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_PRESET_NAME)
    }

    /// Binds `preset` to `subject` and records it as a candidate.
    pub fn assign(&mut self, subject: &str, preset: &str) {
        let key = normalize_subject(subject);
        let candidates = self.folder_presets.entry(key.clone()).or_default();
        if !candidates.iter().any(|name| name == preset) {
            candidates.push(preset.to_string());
        }
        self.active_folder_presets.insert(key, preset.to_string());
    }

    /// Removes every mapping for `subject`. Returns `true` if one existed.
    pub fn unassign(&mut self, subject: &str) -> bool {
        let key = normalize_subject(subject);
        let had_candidates = self.folder_presets.remove(&key).is_some();
        let had_active = self.active_folder_presets.remove(&key).is_some();
        had_candidates || had_active
    }

    pub fn set_global(&mut self, preset: Option<&str>) {
        self.global_preset = preset.map(str::to_string);
    }

    /// Returns `true` if any table mentions `preset`.
    pub fn references(&self, preset: &str) -> bool {
        self.global_preset.as_deref() == Some(preset)
            || self.active_folder_presets.values().any(|name| name == preset)
            || self
                .folder_presets
                .values()
                .any(|names| names.iter().any(|name| name == preset))
    }

    /// Rewrites every reference to `old` so it points at `new`.
    pub fn rename_preset(&mut self, old: &str, new: &str) {
        if self.global_preset.as_deref() == Some(old) {
            self.global_preset = Some(new.to_string());
        }
        for name in self.active_folder_presets.values_mut() {
            if name == old {
                *name = new.to_string();
            }
        }
        for names in self.folder_presets.values_mut() {
            for name in names.iter_mut() {
                if name == old {
                    *name = new.to_string();
                }
            }
            dedup_preserving_order(names);
        }
    }

    /// Cleans up after `preset` was deleted.
    ///
    /// Active entries and the global pointer that named it are reassigned to
    /// `"default"`; it is dropped from candidate lists.  Returns the subjects
    /// whose active preset changed.
    pub fn remove_preset(&mut self, preset: &str) -> Vec<String> {
        if self.global_preset.as_deref() == Some(preset) {
            self.global_preset = Some(DEFAULT_PRESET_NAME.to_string());
        }

        let mut reassigned = Vec::new();
        for (subject, name) in self.active_folder_presets.iter_mut() {
            if name == preset {
                *name = DEFAULT_PRESET_NAME.to_string();
                reassigned.push(subject.clone());
            }
        }

        for (subject, names) in self.folder_presets.iter_mut() {
            names.retain(|name| name != preset);
            if reassigned.contains(subject) && !names.iter().any(|n| n == DEFAULT_PRESET_NAME) {
                names.push(DEFAULT_PRESET_NAME.to_string());
            }
        }
        self.folder_presets.retain(|_, names| !names.is_empty());

        reassigned
    }
}

fn dedup_preserving_order(names: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(names.len());
    names.retain(|name| {
        if seen.contains(name) {
            false
        } else {
            seen.push(name.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subject_trims_separators() {
        assert_eq!(normalize_subject("/Projects/Alpha/"), "Projects/Alpha");
        assert_eq!(normalize_subject("Projects\\Alpha"), "Projects/Alpha");
        assert_eq!(normalize_subject("./Projects//Alpha"), "Projects/Alpha");
    }

    #[test]
    fn test_normalize_subject_maps_empty_to_root() {
        assert_eq!(normalize_subject(""), ROOT_FOLDER);
        assert_eq!(normalize_subject("/"), ROOT_FOLDER);
    }

    #[test]
    fn test_assign_sets_active_and_candidate() {
        let mut tables = MappingTables::default();
        tables.assign("Projects/", "research");

        assert_eq!(tables.active_for("Projects"), Some("research"));
        assert_eq!(tables.folder_presets["Projects"], vec!["research"]);
    }

    #[test]
    fn test_assign_twice_keeps_single_candidate_entry() {
        let mut tables = MappingTables::default();
        tables.assign("Projects", "research");
        tables.assign("Projects", "work");
        tables.assign("Projects", "research");

        assert_eq!(tables.folder_presets["Projects"], vec!["research", "work"]);
        assert_eq!(tables.active_for("Projects"), Some("research"));
    }

    #[test]
    fn test_unassign_removes_both_tables() {
        let mut tables = MappingTables::default();
        tables.assign("Projects", "research");

        assert!(tables.unassign("Projects"));
        assert!(tables.is_empty());
        assert!(tables.folder_presets.is_empty());
        assert!(!tables.unassign("Projects"));
    }

    #[test]
    fn test_global_or_default_falls_back() {
        let mut tables = MappingTables::default();
        assert_eq!(tables.global_or_default(), DEFAULT_PRESET_NAME);
        tables.set_global(Some("wide"));
        assert_eq!(tables.global_or_default(), "wide");
    }

    #[test]
    fn test_rename_preset_rewrites_all_references() {
        let mut tables = MappingTables::default();
        tables.assign("A", "old");
        tables.assign("B", "new");
        tables.assign("B", "old");
        tables.set_global(Some("old"));

        tables.rename_preset("old", "new");

        assert!(!tables.references("old"));
        assert_eq!(tables.global_preset.as_deref(), Some("new"));
        assert_eq!(tables.folder_presets["B"], vec!["new"]);
    }

    #[test]
    fn test_remove_preset_reassigns_to_default() {
        // Arrange
        let mut tables = MappingTables::default();
        tables.assign("A", "gone");
        tables.assign("B", "kept");
        tables.set_global(Some("gone"));

        // Act
        let reassigned = tables.remove_preset("gone");

        // Assert
        assert_eq!(reassigned, vec!["A".to_string()]);
        assert_eq!(tables.active_for("A"), Some(DEFAULT_PRESET_NAME));
        assert_eq!(tables.folder_presets["A"], vec![DEFAULT_PRESET_NAME]);
        assert_eq!(tables.global_preset.as_deref(), Some(DEFAULT_PRESET_NAME));
        assert_eq!(tables.active_for("B"), Some("kept"));
        assert!(!tables.references("gone"));
    }

    #[test]
    fn test_mapping_tables_json_shape() {
        let mut tables = MappingTables::default();
        tables.assign("#project/alpha", "work");
        let json = serde_json::to_value(&tables).unwrap();
        assert_eq!(json["activeFolderPresets"]["#project/alpha"], "work");
        assert!(json.get("globalPreset").is_none());
    }
}
