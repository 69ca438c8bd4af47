//! Typed settings schema for the card view.
//!
//! A single schema table below generates four types that must always agree:
//!
//! - [`SettingsBundle`]: the complete live configuration.  Its `Default` is the
//!   *baseline template* every preset is merged on top of.
//! - [`PartialSettings`]: the same fields, each wrapped in `Option`.  This is
//!   the payload stored inside a preset and the shape of the staging buffer.
//! - [`SettingKey`]: one tag per field, used for membership tests such as
//!   "is this a global key?".
//! - [`SettingField`]: a tag carrying a typed value, used to update a single
//!   field of the staging buffer.
//!
//! # Global keys
//!
//! Keys listed in [`GLOBAL_KEYS`] are cross-cutting: where presets are stored,
//! whether presets auto-apply, which preset was last active, and the mapping
//! tables themselves.  They must be identical across all presets, so they are
//! stripped from every preset payload and re-applied from the live settings
//! after each merge.

use serde::{Deserialize, Serialize};

use crate::domain::mapping::MappingTables;

/// Card arrangement inside the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardLayout {
    Grid,
    #[default]
    Masonry,
    List,
}

/// Note attribute cards are ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Name,
    Created,
    #[default]
    Modified,
}

/// Whether a key belongs to presets or to the whole application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingScope {
    /// Cosmetic or behavioural key that presets may carry.
    Preset,
    /// Cross-cutting key that presets may never carry or overwrite.
    Global,
}

macro_rules! settings_schema {
    (
        $(
            $(#[$meta:meta])*
            $field:ident : $ty:ty = $default:expr => $variant:ident ($wire:literal);
        )+
    ) => {
        /// The full card-view configuration.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(default, rename_all = "camelCase")]
        pub struct SettingsBundle {
            $( $(#[$meta])* pub $field: $ty, )+
        }

        impl Default for SettingsBundle {
            fn default() -> Self {
                Self { $( $field: $default, )+ }
            }
        }

        /// A sparse set of settings; absent fields leave the target untouched.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default, rename_all = "camelCase")]
        pub struct PartialSettings {
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )+
        }

        /// Tag naming a single settings key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum SettingKey {
            $( $variant, )+
        }

        impl SettingKey {
            /// Every key, in schema order.
            pub const ALL: &'static [SettingKey] = &[ $( SettingKey::$variant, )+ ];

            /// The camelCase name used in preset files and exports.
            pub fn wire_name(self) -> &'static str {
                match self {
                    $( SettingKey::$variant => $wire, )+
                }
            }

            /// Looks a key up by its wire name.
            pub fn from_wire_name(name: &str) -> Option<SettingKey> {
                match name {
                    $( $wire => Some(SettingKey::$variant), )+
                    _ => None,
                }
            }
        }

        /// A key tag carrying a new value for that key.
        #[derive(Debug, Clone, PartialEq)]
        pub enum SettingField {
            $( $variant($ty), )+
        }

        impl SettingField {
            /// The key this field writes.
            pub fn key(&self) -> SettingKey {
                match self {
                    $( SettingField::$variant(_) => SettingKey::$variant, )+
                }
            }
        }

        impl SettingsBundle {
            /// Overwrites every field that is present in `overlay`.
            pub fn merge(&mut self, overlay: &PartialSettings) {
                $(
                    if let Some(value) = &overlay.$field {
                        self.$field = value.clone();
                    }
                )+
            }

            /// Returns a partial bundle with every field present.
            pub fn to_partial(&self) -> PartialSettings {
                PartialSettings {
                    $( $field: Some(self.$field.clone()), )+
                }
            }

            /// Reads one field as a tagged value.
            pub fn get(&self, key: SettingKey) -> SettingField {
                match key {
                    $( SettingKey::$variant => SettingField::$variant(self.$field.clone()), )+
                }
            }

            /// Writes one field.
            pub fn set(&mut self, field: SettingField) {
                match field {
                    $( SettingField::$variant(value) => self.$field = value, )+
                }
            }
        }

        impl PartialSettings {
            /// Returns `true` if `key` is present.
            pub fn contains(&self, key: SettingKey) -> bool {
                match key {
                    $( SettingKey::$variant => self.$field.is_some(), )+
                }
            }

            /// Removes `key`, returning whether it was present.
            pub fn remove(&mut self, key: SettingKey) -> bool {
                match key {
                    $( SettingKey::$variant => self.$field.take().is_some(), )+
                }
            }

            /// Sets a single field.
            pub fn set(&mut self, field: SettingField) {
                match field {
                    $( SettingField::$variant(value) => self.$field = Some(value), )+
                }
            }

            /// Reads a single field if present.
            pub fn get(&self, key: SettingKey) -> Option<SettingField> {
                match key {
                    $( SettingKey::$variant => self.$field.clone().map(SettingField::$variant), )+
                }
            }

            /// Copies every field present in `other` over `self`.
            pub fn extend_from(&mut self, other: &PartialSettings) {
                $(
                    if let Some(value) = &other.$field {
                        self.$field = Some(value.clone());
                    }
                )+
            }
        }
    };
}

settings_schema! {
    card_width: u32 = 250 => CardWidth("cardWidth");
    card_height: u32 = 300 => CardHeight("cardHeight");
    card_gap: u32 = 10 => CardGap("cardGap");
    layout_mode: CardLayout = CardLayout::Masonry => LayoutMode("layoutMode");
    sort_by: SortField = SortField::Modified => SortBy("sortBy");
    sort_descending: bool = true => SortDescending("sortDescending");
    show_title: bool = true => ShowTitle("showTitle");
    show_tags: bool = true => ShowTags("showTags");
    show_frontmatter: bool = false => ShowFrontmatter("showFrontmatter");
    render_markdown: bool = true => RenderMarkdown("renderMarkdown");
    content_length: u32 = 300 => ContentLength("contentLength");
    font_size: u32 = 14 => FontSize("fontSize");
    pinned_first: bool = true => PinnedFirst("pinnedFirst");
    preset_folder: String = "card-presets".to_string() => PresetFolder("presetFolder");
    auto_apply_presets: bool = true => AutoApplyPresets("autoApplyPresets");
    #[serde(skip_serializing_if = "Option::is_none")]
    last_active_preset: Option<String> = None => LastActivePreset("lastActivePreset");
    preset_mappings: MappingTables = MappingTables::default() => PresetMappings("presetMappings");
}

/// The fixed set of keys no preset may carry or overwrite.
pub const GLOBAL_KEYS: &[SettingKey] = &[
    SettingKey::PresetFolder,
    SettingKey::AutoApplyPresets,
    SettingKey::LastActivePreset,
    SettingKey::PresetMappings,
];

impl SettingKey {
    /// Membership test against [`GLOBAL_KEYS`].
    pub fn is_global(self) -> bool {
        GLOBAL_KEYS.contains(&self)
    }

    pub fn scope(self) -> SettingScope {
        if self.is_global() {
            SettingScope::Global
        } else {
            SettingScope::Preset
        }
    }
}

impl PartialSettings {
    /// Number of present fields.
    pub fn len(&self) -> usize {
        SettingKey::ALL.iter().filter(|k| self.contains(**k)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global keys present in this bundle, in schema order.
    pub fn global_keys_present(&self) -> Vec<SettingKey> {
        GLOBAL_KEYS
            .iter()
            .copied()
            .filter(|k| self.contains(*k))
            .collect()
    }

    /// Removes every global key and returns the ones that were present.
    pub fn strip_global_keys(&mut self) -> Vec<SettingKey> {
        GLOBAL_KEYS
            .iter()
            .copied()
            .filter(|k| self.remove(*k))
            .collect()
    }

    /// Returns a copy without any global key.
    pub fn without_global_keys(&self) -> PartialSettings {
        let mut copy = self.clone();
        copy.strip_global_keys();
        copy
    }
}

impl SettingsBundle {
    /// The global-key subset of these settings.
    pub fn global_snapshot(&self) -> PartialSettings {
        let mut snapshot = PartialSettings::default();
        for key in GLOBAL_KEYS {
            snapshot.set(self.get(*key));
        }
        snapshot
    }

    /// The preset-scoped subset of these settings, as a preset would store it.
    pub fn preset_projection(&self) -> PartialSettings {
        self.to_partial().without_global_keys()
    }

    /// Builds `baseline ⊕ overlay ⊕ preserved`.
    ///
    /// Global keys inside `overlay` are ignored; `preserved` is applied last
    /// so it always wins.
    pub fn compose(
        baseline: &SettingsBundle,
        overlay: &PartialSettings,
        preserved: &PartialSettings,
    ) -> SettingsBundle {
        let mut next = baseline.clone();
        next.merge(&overlay.without_global_keys());
        next.merge(preserved);
        next
    }

    pub fn mappings(&self) -> &MappingTables {
        &self.preset_mappings
    }

    pub fn mappings_mut(&mut self) -> &mut MappingTables {
        &mut self.preset_mappings
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
