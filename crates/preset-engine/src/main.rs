//! Card-view preset engine: command-line entry point.
//!
//! Runs the preset engine against a vault directory on disk so presets,
//! bindings and the live settings can be inspected and changed without the
//! host application.
//!
//! # Usage
//!
//! ```text
//! preset-engine [OPTIONS] <COMMAND>
//!
//! Commands:
//!   list                     List stored presets
//!   show <NAME>              Print one preset as JSON
//!   settings                 Print the live settings as JSON
//!   resolve <SUBJECT>        Print the preset a folder/tag/note resolves to
//!   open <SUBJECT>           Resolve and apply, as when a note is opened
//!   apply <NAME>             Apply a preset by name
//!   create <NAME>            Create a preset from the live settings
//!   clone <SOURCE> <NAME>    Copy a preset
//!   rename <OLD> <NEW>       Rename a preset
//!   delete <NAME>            Delete a preset
//!   assign <SUBJECT> <NAME>  Bind a preset to a folder or tag
//!   unassign <SUBJECT>       Remove a binding
//!   set-global [NAME]        Set (or clear) the global preset
//!   auto-apply <true|false>  Turn automatic application on or off
//!   move-folder <FOLDER>     Change the vault-relative preset folder
//!   edit                     Stage edits, then save them as a preset
//!   export [NAME]            Export one or all presets
//!   import <FILE>            Import presets from an export file
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable           | Default                    | Description                  |
//! |--------------------|----------------------------|------------------------------|
//! | `CARDVIEW_CONFIG`  | platform config directory  | Path of `config.toml`        |
//! | `CARDVIEW_VAULT`   | `.`                        | Vault root directory         |
//! | `RUST_LOG`         | `[engine] log_level`       | Log filter                   |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use preset_core::{PartialSettings, SettingKey};
use preset_engine::application::settings_context::SettingsPersistence;
use preset_engine::infrastructure::notify::{Notifier, TracingNotifier};
use preset_engine::infrastructure::storage::backend::{FsBackend, StorageBackend};
use preset_engine::infrastructure::storage::config::{
    config_file_path, load_config_from, save_config_to, TomlSettingsFile,
};
use preset_engine::{EngineOptions, PresetEngine, SaveTarget};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Card-view preset engine.
#[derive(Debug, Parser)]
#[command(
    name = "preset-engine",
    about = "Manage and resolve card-view settings presets",
    version
)]
struct Cli {
    /// Path of the configuration file holding engine options and live settings.
    #[arg(long, env = "CARDVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Vault root directory; the preset folder is relative to it.
    #[arg(long, default_value = ".", env = "CARDVIEW_VAULT")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List stored presets.
    List,
    /// Print one preset as JSON.
    Show { name: String },
    /// Print the live settings as JSON.
    Settings,
    /// Print the preset a folder, tag or note path resolves to.
    Resolve { subject: String },
    /// Resolve and apply, as when a note is opened.
    Open { subject: String },
    /// Apply a preset by name.
    Apply { name: String },
    /// Create a preset from the live settings.
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Copy a preset under a new name.
    #[command(name = "clone")]
    Duplicate { source: String, name: String },
    /// Rename a preset; bindings follow.
    Rename { old: String, new: String },
    /// Delete a preset; bindings fall back to the default preset.
    Delete { name: String },
    /// Bind a preset to a folder or tag.
    Assign { subject: String, preset: String },
    /// Remove the binding of a folder or tag.
    Unassign { subject: String },
    /// Set the global preset, or clear it when no name is given.
    SetGlobal { preset: Option<String> },
    /// Turn automatic preset application on or off.
    AutoApply {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Change the vault-relative preset folder.
    MoveFolder { folder: String },
    /// Stage edits in the editor buffer, then save or keep them.
    Edit {
        /// Start from this preset instead of the last active one.
        #[arg(long)]
        from: Option<String>,
        /// Setting to change, as `key=value` (e.g. `cardWidth=320`).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Save the result under this name.
        #[arg(long)]
        save_as: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Bind the saved preset to this folder or tag.
        #[arg(long, conflicts_with = "global")]
        folder: Option<String>,
        /// Make the saved preset the global preset.
        #[arg(long)]
        global: bool,
    },
    /// Export one preset, or all of them.
    Export {
        name: Option<String>,
        /// Write to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import presets from an export file.
    Import {
        file: PathBuf,
        /// Replace presets that already exist.
        #[arg(long)]
        overwrite: bool,
    },
}

/// Parses `key=value` pairs into a partial settings bundle.
///
/// Values are read as JSON when possible (`320`, `true`) and as plain
/// strings otherwise (`grid`).
fn parse_assignments(pairs: &[String]) -> anyhow::Result<PartialSettings> {
    let mut object = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("expected KEY=VALUE, got '{pair}'"))?;
        let key = key.trim();
        match SettingKey::from_wire_name(key) {
            Some(k) if k.is_global() => bail!("'{key}' is a global setting"),
            Some(_) => {}
            None => bail!("unknown setting '{key}'"),
        }
        let value = serde_json::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        object.insert(key.to_string(), value);
    }
    serde_json::from_value(Value::Object(object)).context("invalid setting value")
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => config_file_path().context("cannot locate the config directory")?,
    };
    let config = load_config_from(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.engine.log_level)),
        )
        .init();

    let backend: Arc<dyn StorageBackend> = Arc::new(FsBackend::new(&cli.vault));
    let persistence: Arc<dyn SettingsPersistence> = Arc::new(TomlSettingsFile::new(
        &config_path,
        config.engine.clone(),
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let engine = PresetEngine::new(
        backend,
        config.settings.clone(),
        persistence,
        notifier,
        EngineOptions::from(&config.engine),
    );
    if !config_path.exists() {
        save_config_to(&config_path, &config)
            .with_context(|| format!("failed to create {}", config_path.display()))?;
        info!("wrote default config to {}", config_path.display());
    }
    engine.bootstrap().await?;
    info!("using config {}", config_path.display());

    run(&engine, cli.command).await
}

async fn run(engine: &PresetEngine, command: Command) -> anyhow::Result<()> {
    let manager = engine.manager();
    match command {
        Command::List => {
            for name in manager.list().await? {
                println!("{name}");
            }
        }
        Command::Show { name } => println!("{}", manager.export(&name).await?),
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&engine.settings().await)?)
        }
        Command::Resolve { subject } => println!("{}", engine.resolve(Some(&subject)).await),
        Command::Open { subject } => {
            let outcome = engine.on_subject_changed(Some(&subject)).await?;
            println!("{outcome:?}");
        }
        Command::Apply { name } => {
            let applied = engine.apply(&name).await?;
            println!("applied {}", applied.name);
        }
        Command::Create { name, description } => {
            let preset = manager.create_from_live(&name, &description).await?;
            println!("created {}", preset.name);
        }
        Command::Duplicate { source, name } => {
            let preset = manager.clone_preset(&source, &name).await?;
            println!("created {}", preset.name);
        }
        Command::Rename { old, new } => {
            let preset = manager.rename(&old, &new).await?;
            println!("renamed to {}", preset.name);
        }
        Command::Delete { name } => {
            let report = manager.delete(&name).await?;
            for subject in report.reassigned {
                println!("{subject} now uses default");
            }
        }
        Command::Assign { subject, preset } => manager.assign_folder(&subject, &preset).await?,
        Command::Unassign { subject } => {
            if !manager.unassign_folder(&subject).await? {
                println!("{subject} had no binding");
            }
        }
        Command::SetGlobal { preset } => manager.set_global(preset.as_deref()).await?,
        Command::AutoApply { enabled } => manager.set_auto_apply(enabled).await?,
        Command::MoveFolder { folder } => manager.update_folder(&folder).await?,
        Command::Edit {
            from,
            set,
            save_as,
            description,
            folder,
            global,
        } => {
            let edits = parse_assignments(&set)?;
            let session = engine.begin_editing().await?;
            if let Some(from) = from {
                session.apply_preview(&from).await?;
            }
            for key in SettingKey::ALL {
                if let Some(field) = edits.get(*key) {
                    session.update_field(field).await?;
                }
            }
            if let Some(name) = save_as {
                let target = match (folder, global) {
                    (Some(folder), _) => SaveTarget::Folder(folder),
                    (None, true) => SaveTarget::Global,
                    (None, false) => SaveTarget::None,
                };
                let preset = session.save_as(&name, &description, target).await?;
                println!("saved {}", preset.name);
            }
            engine.finish_editing(session).await?;
        }
        Command::Export { name, out } => {
            let blob = match name {
                Some(name) => manager.export(&name).await?,
                None => manager.export_all().await?,
            };
            match out {
                Some(path) => tokio::fs::write(&path, blob)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{blob}"),
            }
        }
        Command::Import { file, overwrite } => {
            let blob = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = manager.import(&blob, overwrite).await?;
            println!(
                "imported {} new, {} overwritten",
                report.created.len(),
                report.overwritten.len()
            );
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use preset_core::CardLayout;

    #[test]
    fn test_cli_vault_defaults_to_current_dir() {
        let cli = Cli::parse_from(["preset-engine", "list"]);
        assert_eq!(cli.vault, PathBuf::from("."));
    }

    #[test]
    fn test_cli_parses_edit_with_repeated_set() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "preset-engine",
            "edit",
            "--set",
            "cardWidth=320",
            "--set",
            "layoutMode=grid",
            "--save-as",
            "narrow",
            "--global",
        ]);

        // Assert
        match cli.command {
            Command::Edit {
                set, save_as, global, ..
            } => {
                assert_eq!(set.len(), 2);
                assert_eq!(save_as.as_deref(), Some("narrow"));
                assert!(global);
            }
            other => panic!("expected edit, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_folder_and_global_conflict() {
        let result = Cli::try_parse_from([
            "preset-engine",
            "edit",
            "--folder",
            "A",
            "--global",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_auto_apply_takes_explicit_value() {
        let cli = Cli::parse_from(["preset-engine", "auto-apply", "false"]);
        assert!(matches!(cli.command, Command::AutoApply { enabled: false }));
    }

    #[test]
    fn test_parse_assignments_reads_json_and_bare_strings() {
        let parsed = parse_assignments(&[
            "cardWidth=320".to_string(),
            "layoutMode=grid".to_string(),
            "showTags=false".to_string(),
        ])
        .unwrap();

        assert_eq!(parsed.card_width, Some(320));
        assert_eq!(parsed.layout_mode, Some(CardLayout::Grid));
        assert_eq!(parsed.show_tags, Some(false));
    }

    #[test]
    fn test_parse_assignments_rejects_global_and_unknown_keys() {
        assert!(parse_assignments(&["presetFolder=x".to_string()]).is_err());
        assert!(parse_assignments(&["nope=1".to_string()]).is_err());
        assert!(parse_assignments(&["cardWidth".to_string()]).is_err());
        assert!(parse_assignments(&["cardWidth=wide".to_string()]).is_err());
    }
}
