use std::path::PathBuf;

use serde::{
    Deserialize,
    Serialize,
};

use crate::persistence::{
    get_app_data_dir,
    load_json_or_default,
};

pub const SETTINGS_FILE: &str = "settings.json";

/// Engine-wide settings. Per-target tuning lives in the target definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReorderSettings {
    /// Root holding one directory per language data id, plus shared ignore/names lists.
    pub lang_data_dir: PathBuf,
    /// Move new cards outside the reordered set back to make room.
    pub shift_existing_cards: bool,
    pub use_frequency_cache: bool,
    pub cache_dir: PathBuf,
    pub audit_log: bool,
    pub update_note_fields: bool,
}

impl Default for ReorderSettings {
    fn default() -> Self {
        let data_dir = get_app_data_dir();
        Self {
            lang_data_dir: data_dir.join("lang_data"),
            shift_existing_cards: true,
            use_frequency_cache: true,
            cache_dir: data_dir.join("cache"),
            audit_log: true,
            update_note_fields: true,
        }
    }
}

impl ReorderSettings {
    pub fn load() -> Self {
        load_json_or_default(SETTINGS_FILE)
    }

    pub fn frequency_cache_dir(&self) -> Option<PathBuf> {
        self.use_frequency_cache.then(|| self.cache_dir.clone())
    }
}
