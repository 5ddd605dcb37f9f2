use std::{
    collections::HashSet,
    fs,
    path::Path,
};

use serde_json::Value;
use tracing::{
    info,
    warn,
};

use super::definition::TargetDefinition;
use crate::core::ReorderError;

/// Target definitions in the order they were written. Each entry parses on its own, so one
/// malformed target does not take the others down.
#[derive(Debug, Default)]
pub struct TargetList {
    pub entries: Vec<Result<TargetDefinition, ReorderError>>,
}

impl TargetList {
    pub fn from_json_str(data: &str) -> Result<Self, ReorderError> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_value(&value)
    }

    /// HJSON is a superset of JSON, comments and unquoted keys included.
    pub fn from_hjson_str(data: &str) -> Result<Self, ReorderError> {
        let value: Value = serde_hjson::from_str(data)?;
        Self::from_value(&value)
    }

    /// `.json` files parse as strict JSON, anything else as HJSON.
    pub fn load(path: &Path) -> Result<Self, ReorderError> {
        let data = fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let list = if is_json { Self::from_json_str(&data)? } else { Self::from_hjson_str(&data)? };
        info!(
            "Loaded {} target(s) from {} ({} valid)",
            list.entries.len(),
            path.display(),
            list.valid().count()
        );
        Ok(list)
    }

    pub fn from_value(value: &Value) -> Result<Self, ReorderError> {
        let items = value.as_array().ok_or_else(|| {
            ReorderError::Configuration("Target list must be an array of target objects".into())
        })?;

        let mut seen_ids = HashSet::new();
        let entries = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let definition = TargetDefinition::from_value(item, index)?;
                if let Some(id) = &definition.id {
                    if !seen_ids.insert(id.clone()) {
                        return Err(ReorderError::Configuration(format!(
                            "Target #{}: id '{}' is already used by another target",
                            index + 1,
                            id
                        )));
                    }
                }
                Ok(definition)
            })
            .collect::<Vec<_>>();

        for err in entries.iter().filter_map(|e| e.as_ref().err()) {
            warn!("{}", err);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn valid(&self) -> impl Iterator<Item = &TargetDefinition> {
        self.entries.iter().filter_map(|e| e.as_ref().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGETS: &str = r#"
        [
          # spanish vocabulary
          {
            id: "spanish"
            deck: "Spanish"
            notes: [ { name: "Basic", fields: { Front: "es" } } ]
          }
          {
            deck: "Latin"
            notes: []
          }
          {
            id: "spanish"
            deck: "Spanish::Extra"
            notes: [ { name: "Basic", fields: { Front: "es" } } ]
          }
        ]
    "#;

    #[test]
    fn test_hjson_list_with_failing_entries() {
        let list = TargetList::from_hjson_str(TARGETS).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.valid().count(), 1);
        assert!(list.entries[1].as_ref().unwrap_err().is_configuration());

        let duplicate = list.entries[2].as_ref().unwrap_err().to_string();
        assert!(duplicate.contains("already used"), "{}", duplicate);
        assert_eq!(list.valid().next().unwrap().id.as_deref(), Some("spanish"));
    }

    #[test]
    fn test_root_must_be_array() {
        let err = TargetList::from_json_str(r#"{ "deck": "Spanish" }"#).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("targets.json");
        let notes = r#"[{ "name": "Basic", "fields": { "Front": "es" } }]"#;
        fs::write(&json, format!(r#"[{{ "deck": "Spanish", "notes": {} }}]"#, notes)).unwrap();
        let list = TargetList::load(&json).unwrap();
        assert_eq!(list.valid().count(), 1);
        assert!(list.valid().all(|t| t.id.is_none()));

        let strict = dir.path().join("broken.json");
        fs::write(&strict, "[ { deck: Spanish } ]").unwrap();
        assert!(TargetList::load(&strict).is_err());
    }
}
