//! Subject path → preset name.
//!
//! # Algorithm
//!
//! 1. An empty subject, or mapping tables with no active entries at all,
//!    resolve to the global preset (or `"default"` if none is set).
//! 2. Otherwise the ancestor chain is walked from most to least specific:
//!
//! ```text
//! Projects/Alpha/sub/note.md
//! Projects/Alpha/sub
//! Projects/Alpha        ← first hit wins
//! Projects
//! /
//! ```
//!
//!    The first ancestor with an active preset wins, so a deeper folder's
//!    explicit choice shadows its parents.
//! 3. No hit falls back to the global preset, then to `"default"`.
//!
//! Resolution never fails.  Whether the named preset actually loads is the
//! caller's concern; [`candidates`] lists every fallback in order so the
//! caller can fall through on `NotFound` / `Corrupt`.

use crate::domain::mapping::{normalize_subject, MappingTables, ROOT_FOLDER};
use crate::domain::preset::DEFAULT_PRESET_NAME;

/// Returns the subject itself, then each parent, most specific first.
///
/// Folder chains end with the vault root `/`; tag chains (`#a/b`) end at the
/// top-level tag.
pub fn ancestors(subject: &str) -> Vec<String> {
    let normalized = normalize_subject(subject);
    if normalized == ROOT_FOLDER {
        return vec![ROOT_FOLDER.to_string()];
    }

    let mut chain = Vec::new();
    let mut current = normalized.as_str();
    loop {
        chain.push(current.to_string());
        match current.rfind('/') {
            Some(idx) => current = &current[..idx],
            None => break,
        }
    }

    if !normalized.starts_with('#') {
        chain.push(ROOT_FOLDER.to_string());
    }
    chain
}

/// Resolves the single preset name that applies to `subject`.
pub fn resolve(subject: Option<&str>, mappings: &MappingTables) -> String {
    let subject = match subject.map(str::trim).filter(|s| !s.is_empty()) {
        Some(subject) => subject,
        None => return mappings.global_or_default().to_string(),
    };
    if mappings.is_empty() {
        return mappings.global_or_default().to_string();
    }

    ancestors(subject)
        .iter()
        .find_map(|ancestor| active_preset(mappings, ancestor))
        .unwrap_or_else(|| mappings.global_or_default())
        .to_string()
}

/// Every preset name worth trying for `subject`, best first.
///
/// Matching ancestors in walk order, then the global preset, then
/// `"default"`.  Names appear once and the list ends at the first
/// `"default"`, since the default preset always loads.
pub fn candidates(subject: Option<&str>, mappings: &MappingTables) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    if let Some(subject) = subject.map(str::trim).filter(|s| !s.is_empty()) {
        for ancestor in ancestors(subject) {
            if let Some(name) = active_preset(mappings, &ancestor) {
                push(name);
            }
        }
    }
    push(mappings.global_or_default());
    push(DEFAULT_PRESET_NAME);

    if let Some(pos) = names.iter().position(|n| n == DEFAULT_PRESET_NAME) {
        names.truncate(pos + 1);
    }
    names
}

fn active_preset<'a>(mappings: &'a MappingTables, ancestor: &str) -> Option<&'a str> {
    mappings
        .active_folder_presets
        .get(ancestor)
        .map(String::as_str)
        .filter(|name| !name.trim().is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
