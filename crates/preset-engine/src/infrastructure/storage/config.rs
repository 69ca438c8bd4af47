//! TOML-based persistence of the host configuration.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\CardView\config.toml`
//! - Linux:    `~/.config/cardview/config.toml`
//! - macOS:    `~/Library/Application Support/CardView/config.toml`
//!
//! The file has two sections.  `[engine]` tunes the engine itself; the
//! `[settings]` table is the live card-view settings bundle, including the
//! global keys (preset folder, auto-apply flag, last active preset and the
//! preset mapping tables):
//!
//! ```toml
//! [engine]
//! cache_capacity = 50
//! debounce_ms = 300
//! log_level = "info"
//!
//! [settings]
//! cardWidth = 350
//! layoutMode = "grid"
//! presetFolder = "card-presets"
//! lastActivePreset = "work"
//!
//! [settings.presetMappings.activeFolderPresets]
//! "Projects/Alpha" = "work"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file, and the whole
//! `[settings]` table falls back to the baseline template.  A missing file is
//! therefore a valid first-run configuration.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use preset_core::{SettingsBundle, DEFAULT_CACHE_CAPACITY};

use crate::application::settings_context::SettingsPersistence;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub settings: SettingsBundle,
}

/// Tuning knobs for the engine itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Schema version string; bump when breaking changes are introduced.
    #[serde(default = "default_version")]
    pub version: String,
    /// Maximum number of parsed presets kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Quiet window before staged edits are mirrored into live settings.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_version() -> String {
    "1.0".to_string()
}
fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_capacity: default_cache_capacity(),
            debounce_ms: default_debounce_ms(),
            log_level: default_log_level(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `CardView` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("CardView"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("cardview"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("CardView")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Settings persistence ──────────────────────────────────────────────────────

/// Writes the live settings back into the `[settings]` table of a config
/// file, keeping its `[engine]` section.
#[derive(Debug, Clone)]
pub struct TomlSettingsFile {
    path: PathBuf,
    engine: EngineConfig,
}

impl TomlSettingsFile {
    pub fn new(path: impl Into<PathBuf>, engine: EngineConfig) -> Self {
        Self {
            path: path.into(),
            engine,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsPersistence for TomlSettingsFile {
    async fn save(&self, settings: &SettingsBundle) -> Result<(), ConfigError> {
        let config = AppConfig {
            engine: self.engine.clone(),
            settings: settings.clone(),
        };
        let content = toml::to_string_pretty(&config)?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ConfigError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!("settings saved to {}", self.path.display());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use preset_core::CardLayout;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("preset_config_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    // ── AppConfig defaults ────────────────────────────────────────────────────

    #[test]
    fn test_engine_config_defaults() {
        // Arrange / Act
        let cfg = EngineConfig::default();

        // Assert
        assert_eq!(cfg.cache_capacity, 50);
        assert_eq!(cfg.debounce_ms, 300);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_app_config_default_settings_are_baseline() {
        assert_eq!(AppConfig::default().settings, SettingsBundle::default());
    }

    // ── TOML round-trip ───────────────────────────────────────────────────────

    #[test]
    fn test_app_config_with_mappings_round_trips() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.engine.debounce_ms = 150;
        cfg.settings.card_width = 350;
        cfg.settings.layout_mode = CardLayout::Grid;
        cfg.settings.last_active_preset = Some("work".to_string());
        cfg.settings.preset_mappings.assign("Projects/Alpha", "work");
        cfg.settings.preset_mappings.set_global(Some("wide"));

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_settings_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[engine]
cache_capacity = 5

[settings]
cardWidth = 400
autoApplyPresets = false
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.engine.cache_capacity, 5);
        assert_eq!(cfg.engine.debounce_ms, 300);
        assert_eq!(cfg.settings.card_width, 400);
        assert!(!cfg.settings.auto_apply_presets);
        assert_eq!(cfg.settings.card_height, 300);
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    // ── load / save ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip() {
        // Arrange
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.engine.log_level = "debug".to_string();
        cfg.settings.font_size = 18;

        // Act
        save_config_to(&path, &cfg).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_toml_settings_file_keeps_engine_section() {
        // Arrange
        let path = temp_path();
        let mut engine = EngineConfig::default();
        engine.cache_capacity = 7;
        let file = TomlSettingsFile::new(&path, engine);
        let mut settings = SettingsBundle::default();
        settings.card_gap = 42;

        // Act
        file.save(&settings).await.expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded.engine.cache_capacity, 7);
        assert_eq!(loaded.settings.card_gap, 42);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
    }
}
