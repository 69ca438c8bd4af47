//! Integration tests for the preset editor: debounced mirroring, flushing on
//! close, discarding, saving, and how subject changes behave while a
//! session is open.
//!
//! Timer-driven tests run with a paused clock so the debounce window is
//! crossed deterministically.

use std::sync::Arc;
use std::time::Duration;

use preset_core::{PartialSettings, PresetError, SettingField, SettingsBundle};
use preset_engine::infrastructure::notify::recording::RecordingNotifier;
use preset_engine::infrastructure::notify::NoticeLevel;
use preset_engine::infrastructure::storage::memory::{MemoryBackend, MemorySettingsStore};
use preset_engine::{EngineOptions, PresetEngine, ResolveOutcome, SaveTarget};

async fn engine() -> (PresetEngine, Arc<MemorySettingsStore>, Arc<RecordingNotifier>) {
    let saves = Arc::new(MemorySettingsStore::new());
    let notices = Arc::new(RecordingNotifier::new());
    let engine = PresetEngine::new(
        Arc::new(MemoryBackend::new()),
        SettingsBundle::default(),
        saves.clone(),
        notices.clone(),
        EngineOptions::default(),
    );
    engine.bootstrap().await.expect("bootstrap");
    (engine, saves, notices)
}

fn width(width: u32) -> PartialSettings {
    PartialSettings {
        card_width: Some(width),
        ..PartialSettings::default()
    }
}

// ── Debounce ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_rapid_updates_collapse_into_one_mirror_and_one_save() {
    // Arrange
    let (engine, saves, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();
    let saves_before = saves.save_count();

    // Act – ten edits, each well inside the debounce window of the last
    for w in 300..310 {
        session.update_field(SettingField::CardWidth(w)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Assert – nothing mirrored yet
    assert!(session.has_pending_flush().await);
    assert_eq!(saves.save_count(), saves_before);
    assert_eq!(engine.settings().await.card_width, 250);

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(!session.has_pending_flush().await);
    assert_eq!(session.mirror_count().await, 1);
    assert_eq!(saves.save_count(), saves_before + 1);
    assert_eq!(engine.settings().await.card_width, 309);
    engine.finish_editing(session).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_before_debounce_flushes_last_value() {
    // Arrange
    let (engine, saves, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();
    let saves_before = saves.save_count();
    session.update_field(SettingField::FontSize(12)).await.unwrap();
    session.update_field(SettingField::FontSize(22)).await.unwrap();

    // Act
    engine.finish_editing(session).await.unwrap();

    // Assert
    assert_eq!(engine.settings().await.font_size, 22);
    assert_eq!(saves.save_count(), saves_before + 1);

    // the orphaned timer must not write again
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(saves.save_count(), saves_before + 1);
    assert!(!engine.is_editing());
}

#[tokio::test(start_paused = true)]
async fn test_discard_drops_pending_edit_and_restores_live() {
    // Arrange
    let (engine, _, _) = engine().await;
    let before = engine.settings().await;
    let session = engine.begin_editing().await.unwrap();
    session.update_field(SettingField::CardGap(2)).await.unwrap();

    // Act
    engine.cancel_editing(session).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Assert
    assert_eq!(engine.settings().await, before);
}

#[tokio::test]
async fn test_discard_after_preview_restores_previous_preset() {
    // Arrange
    let (engine, _, _) = engine().await;
    engine.manager().create("work", "", width(350)).await.unwrap();
    engine.manager().create("wide", "", width(500)).await.unwrap();
    engine.apply("work").await.unwrap();
    let session = engine.begin_editing().await.unwrap();
    session.apply_preview("wide").await.unwrap();
    assert_eq!(engine.settings().await.card_width, 500);

    // Act
    engine.cancel_editing(session).await.unwrap();

    // Assert
    let live = engine.settings().await;
    assert_eq!(live.card_width, 350);
    assert_eq!(live.last_active_preset.as_deref(), Some("work"));
}

// ── Session lifecycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_editor_seeds_buffer_from_last_active_preset() {
    let (engine, _, _) = engine().await;
    engine.manager().create("work", "", width(350)).await.unwrap();
    engine.apply("work").await.unwrap();

    let session = engine.begin_editing().await.unwrap();

    let buffer = session.buffer().await.unwrap();
    assert_eq!(buffer.card_width, Some(350));
    assert_eq!(buffer.card_height, Some(SettingsBundle::default().card_height));
    engine.finish_editing(session).await.unwrap();
}

#[tokio::test]
async fn test_second_editor_is_rejected_until_first_closes() {
    let (engine, _, _) = engine().await;
    let first = engine.begin_editing().await.unwrap();

    let second = engine.begin_editing().await;
    assert!(matches!(second, Err(PresetError::EditSession(_))));

    engine.finish_editing(first).await.unwrap();
    let third = engine.begin_editing().await.unwrap();
    engine.finish_editing(third).await.unwrap();
}

#[tokio::test]
async fn test_dropping_session_reopens_editor() {
    let (engine, _, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();

    drop(session);

    assert!(!engine.is_editing());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_session_does_not_overwrite_later_resolution() {
    // Arrange
    let (engine, _, _) = engine().await;
    engine.manager().create("wide", "", width(500)).await.unwrap();
    engine.manager().assign_folder("A", "wide").await.unwrap();
    let session = engine.begin_editing().await.unwrap();
    session.update_field(SettingField::CardWidth(123)).await.unwrap();

    // Act – abandon the editor with an edit still pending, then move on
    drop(session);
    let outcome = engine.on_subject_changed(Some("A/n.md")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Assert
    assert!(matches!(outcome, ResolveOutcome::Applied { ref name, .. } if name == "wide"));
    let live = engine.settings().await;
    assert_eq!(live.last_active_preset.as_deref(), Some("wide"));
    assert_eq!(live.card_width, 500);
}

#[tokio::test]
async fn test_global_field_edit_is_rejected() {
    let (engine, _, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();

    let result = session
        .update_field(SettingField::AutoApplyPresets(false))
        .await;

    assert_eq!(
        result,
        Err(PresetError::GlobalKey("autoApplyPresets".to_string()))
    );
    engine.finish_editing(session).await.unwrap();
}

#[tokio::test]
async fn test_preview_of_missing_preset_notifies_and_keeps_buffer() {
    let (engine, _, notices) = engine().await;
    let session = engine.begin_editing().await.unwrap();
    let buffer = session.buffer().await;

    let result = session.apply_preview("nowhere").await;

    assert!(matches!(result, Err(PresetError::NotFound(_))));
    assert_eq!(session.buffer().await, buffer);
    assert_eq!(notices.at_level(NoticeLevel::Error).len(), 1);
    engine.finish_editing(session).await.unwrap();
}

// ── Saving ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_save_as_binds_folder_and_becomes_active() {
    // Arrange
    let (engine, _, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();
    session.update_field(SettingField::CardWidth(420)).await.unwrap();

    // Act
    session
        .save_as("tall", "for projects", SaveTarget::Folder("Projects".to_string()))
        .await
        .unwrap();
    engine.finish_editing(session).await.unwrap();

    // Assert
    let live = engine.settings().await;
    assert_eq!(live.last_active_preset.as_deref(), Some("tall"));
    assert_eq!(live.card_width, 420);
    assert_eq!(live.preset_mappings.active_for("Projects"), Some("tall"));
    let stored = engine.manager().get("tall").await.unwrap();
    assert_eq!(stored.settings.card_width, Some(420));
    assert_eq!(engine.resolve(Some("Projects/x.md")).await, "tall");
}

#[tokio::test]
async fn test_save_as_global_sets_fallback_preset() {
    let (engine, _, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();

    session.save_as("everywhere", "", SaveTarget::Global).await.unwrap();
    engine.finish_editing(session).await.unwrap();

    assert_eq!(engine.resolve(Some("Anything/at/all.md")).await, "everywhere");
}

#[tokio::test]
async fn test_save_as_existing_name_overwrites() {
    let (engine, _, _) = engine().await;
    engine.manager().create("work", "", width(350)).await.unwrap();
    let session = engine.begin_editing().await.unwrap();
    session.update_field(SettingField::CardWidth(360)).await.unwrap();

    session.save_as("work", "", SaveTarget::None).await.unwrap();
    engine.finish_editing(session).await.unwrap();

    assert_eq!(
        engine.manager().get("work").await.unwrap().settings.card_width,
        Some(360)
    );
}

#[tokio::test]
async fn test_save_as_default_is_protected() {
    let (engine, saves, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();
    let saves_before = saves.save_count();

    let result = session.save_as("default", "", SaveTarget::None).await;

    assert_eq!(result, Err(PresetError::Protected("default".to_string())));
    assert_eq!(saves.save_count(), saves_before);
    engine.finish_editing(session).await.unwrap();
}

#[tokio::test]
async fn test_discard_after_save_keeps_saved_preset_live() {
    let (engine, _, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();
    session.update_field(SettingField::CardWidth(420)).await.unwrap();
    session.save_as("tall", "", SaveTarget::None).await.unwrap();
    session.update_field(SettingField::CardWidth(999)).await.unwrap();
    session.flush().await.unwrap();

    engine.cancel_editing(session).await.unwrap();

    assert_eq!(engine.settings().await.card_width, 420);
}

// ── Resolution while editing ──────────────────────────────────────────────────

#[tokio::test]
async fn test_subject_changes_wait_for_editor_to_close() {
    // Arrange
    let (engine, _, _) = engine().await;
    engine.manager().create("work", "", width(350)).await.unwrap();
    engine.manager().create("notes", "", width(200)).await.unwrap();
    engine.manager().assign_folder("Projects", "work").await.unwrap();
    engine.manager().assign_folder("Notes", "notes").await.unwrap();
    let session = engine.begin_editing().await.unwrap();

    // Act
    let first = engine.on_subject_changed(Some("Notes/a.md")).await.unwrap();
    let second = engine.on_subject_changed(Some("Projects/b.md")).await.unwrap();

    // Assert – nothing applied while editing
    assert_eq!(first, ResolveOutcome::Paused);
    assert_eq!(second, ResolveOutcome::Paused);
    assert_eq!(engine.settings().await.last_active_preset, None);

    // only the latest subject is resolved afterwards
    let resumed = engine.finish_editing(session).await.unwrap();
    assert!(matches!(
        resumed,
        Some(ResolveOutcome::Applied { ref name, .. }) if name == "work"
    ));
    assert_eq!(engine.settings().await.card_width, 350);
}

#[tokio::test]
async fn test_finish_without_deferred_subject_resolves_nothing() {
    let (engine, _, _) = engine().await;
    let session = engine.begin_editing().await.unwrap();

    let resumed = engine.finish_editing(session).await.unwrap();

    assert_eq!(resumed, None);
}
