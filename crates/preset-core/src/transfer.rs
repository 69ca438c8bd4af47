//! Export and import of presets as a single text blob.
//!
//! Two shapes are produced and accepted:
//!
//! ```json
//! { "name": "work", "description": "", "settings": { "cardWidth": 350 }, "isDefault": false }
//! ```
//!
//! ```json
//! { "version": 1, "presets": [ { "name": "work", ... }, { "name": "wide", ... } ] }
//! ```
//!
//! Parsing is all-or-nothing: every entry is validated (`name` present and
//! usable, `settings` present and an object, full typed parse succeeds, no
//! duplicate names) before any preset is returned, so a caller can never
//! partially apply a malformed import.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::preset::{validate_name, Preset};
use crate::error::PresetError;

/// Version written into multi-preset exports.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PresetSet {
    version: u32,
    presets: Vec<Preset>,
}

/// Serialises one preset.
///
/// # Errors
///
/// Returns [`PresetError::Encode`] if serialisation fails.
pub fn export_preset(preset: &Preset) -> Result<String, PresetError> {
    serde_json::to_string_pretty(preset).map_err(|e| PresetError::Encode(e.to_string()))
}

/// Serialises a set of presets.
///
/// # Errors
///
/// Returns [`PresetError::Encode`] if serialisation fails.
pub fn export_presets(presets: &[Preset]) -> Result<String, PresetError> {
    let set = PresetSet {
        version: EXPORT_FORMAT_VERSION,
        presets: presets.to_vec(),
    };
    serde_json::to_string_pretty(&set).map_err(|e| PresetError::Encode(e.to_string()))
}

/// Parses an export blob into presets.
///
/// Global keys found in an entry's settings are dropped.  The `isDefault`
/// flag of imported entries is ignored; only the store decides which preset
/// is the default.
///
/// # Errors
///
/// Returns [`PresetError::InvalidImport`] describing the first problem found.
pub fn parse_import(blob: &str) -> Result<Vec<Preset>, PresetError> {
    let root: Value = serde_json::from_str(blob)
        .map_err(|e| PresetError::InvalidImport(format!("not valid JSON: {e}")))?;

    let entries: Vec<Value> = match root {
        Value::Object(mut map) => match map.remove("presets") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(PresetError::InvalidImport(
                    "`presets` must be an array".to_string(),
                ))
            }
            None => vec![Value::Object(map)],
        },
        Value::Array(items) => items,
        _ => {
            return Err(PresetError::InvalidImport(
                "expected a preset object or a preset set".to_string(),
            ))
        }
    };

    if entries.is_empty() {
        return Err(PresetError::InvalidImport("contains no presets".to_string()));
    }

    let mut presets: Vec<Preset> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let preset = parse_entry(index, entry)?;
        if presets.iter().any(|p| p.name == preset.name) {
            return Err(PresetError::InvalidImport(format!(
                "preset '{}' appears more than once",
                preset.name
            )));
        }
        presets.push(preset);
    }
    Ok(presets)
}

fn parse_entry(index: usize, entry: Value) -> Result<Preset, PresetError> {
    let object = entry.as_object().ok_or_else(|| {
        PresetError::InvalidImport(format!("entry {index} is not an object"))
    })?;

    let name = match object.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => {
            return Err(PresetError::InvalidImport(format!(
                "entry {index}: `name` must be a string"
            )))
        }
        None => {
            return Err(PresetError::InvalidImport(format!(
                "entry {index}: missing required field `name`"
            )))
        }
    };

    match object.get("settings") {
        Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(PresetError::InvalidImport(format!(
                "preset '{name}': `settings` must be an object"
            )))
        }
        None => {
            return Err(PresetError::InvalidImport(format!(
                "preset '{name}': missing required field `settings`"
            )))
        }
    }

    let valid_name = validate_name(&name)
        .map_err(|e| PresetError::InvalidImport(e.to_string()))?
        .to_string();

    let mut preset: Preset = serde_json::from_value(entry)
        .map_err(|e| PresetError::InvalidImport(format!("preset '{name}': {e}")))?;
    preset.name = valid_name;
    preset.is_default = false;

    let stripped = preset.settings.strip_global_keys();
    if !stripped.is_empty() {
        warn!(
            "import of preset '{}' dropped global keys: {:?}",
            preset.name, stripped
        );
    }
    Ok(preset)
}
