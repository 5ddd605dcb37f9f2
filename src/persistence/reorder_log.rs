use std::{
    collections::BTreeMap,
    path::Path,
};

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;
use uuid::Uuid;

use super::{
    get_data_file_path,
    load_json_from,
    save_json_to,
};
use crate::{
    core::ReorderError,
    target::{
        ReorderResult,
        TargetStats,
    },
};

pub const REORDER_LOG_FILE: &str = "reorder_log.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLogEntry {
    pub target_id: String,
    pub num_cards_repositioned: usize,
    #[serde(flatten)]
    pub stats: TargetStats,
}

/// One reorder run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderLogEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub targets: Vec<TargetLogEntry>,
}

impl ReorderLogEntry {
    /// Only successful targets with an `id` are logged. `None` when there is nothing to log.
    pub fn from_result(result: &ReorderResult) -> Option<Self> {
        let targets: Vec<TargetLogEntry> = result
            .targets
            .iter()
            .filter(|t| t.success)
            .filter_map(|t| {
                Some(TargetLogEntry {
                    target_id: t.id.clone()?,
                    num_cards_repositioned: t.num_cards_repositioned,
                    stats: t.stats.clone()?,
                })
            })
            .collect();

        (!targets.is_empty()).then(|| Self { id: Uuid::new_v4(), created_at: Utc::now(), targets })
    }

    fn num_cards_repositioned(&self) -> usize {
        self.targets.iter().map(|t| t.num_cards_repositioned).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReorderLog {
    pub entries: Vec<ReorderLogEntry>,
}

impl ReorderLog {
    pub fn default_path() -> std::path::PathBuf {
        get_data_file_path(REORDER_LOG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ReorderError> {
        load_json_from(path)
    }

    /// Adds a run and saves the log. A run that repositioned nothing is only worth keeping as
    /// the first entry.
    pub fn append(path: &Path, entry: ReorderLogEntry) -> Result<Self, ReorderError> {
        let mut log = Self::load(path)?;
        if entry.num_cards_repositioned() == 0 && !log.entries.is_empty() {
            return Ok(log);
        }
        log.entries.push(entry);
        save_json_to(&log, path)?;
        info!("Reorder log now has {} entries", log.entries.len());
        Ok(log)
    }

    /// Latest known mature word count per target and language.
    pub fn mature_words_per_language(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        let mut latest: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        let mut entries: Vec<&ReorderLogEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.created_at);

        for entry in entries {
            for target in &entry.targets {
                latest.insert(
                    target.target_id.clone(),
                    target.stats.mature_words_per_language.clone(),
                );
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetReorderResult;

    fn result(id: Option<&str>, mature: usize, repositioned: usize) -> TargetReorderResult {
        let mut stats = TargetStats::default();
        stats.mature_words_per_language.insert("en".into(), mature);
        TargetReorderResult {
            target_name: id.unwrap_or("#1").into(),
            id: id.map(str::to_string),
            success: true,
            num_cards_repositioned: repositioned,
            stats: Some(stats),
            ..Default::default()
        }
    }

    #[test]
    fn test_only_targets_with_id_are_logged() {
        let run = ReorderResult { targets: vec![result(None, 3, 1)] };
        assert!(ReorderLogEntry::from_result(&run).is_none());

        let run =
            ReorderResult { targets: vec![result(None, 3, 1), result(Some("spanish"), 4, 1)] };
        let entry = ReorderLogEntry::from_result(&run).unwrap();
        assert_eq!(entry.targets.len(), 1);
        assert_eq!(entry.targets[0].target_id, "spanish");
    }

    #[test]
    fn test_append_and_latest_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REORDER_LOG_FILE);

        let first = ReorderResult { targets: vec![result(Some("spanish"), 4, 0)] };
        ReorderLog::append(&path, ReorderLogEntry::from_result(&first).unwrap()).unwrap();

        let idle = ReorderResult { targets: vec![result(Some("spanish"), 5, 0)] };
        let log = ReorderLog::append(&path, ReorderLogEntry::from_result(&idle).unwrap()).unwrap();
        assert_eq!(log.entries.len(), 1);

        let second = ReorderResult { targets: vec![result(Some("spanish"), 9, 2)] };
        ReorderLog::append(&path, ReorderLogEntry::from_result(&second).unwrap()).unwrap();

        let log = ReorderLog::load(&path).unwrap();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.mature_words_per_language()["spanish"]["en"], 9);
    }
}
