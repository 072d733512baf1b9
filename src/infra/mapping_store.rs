use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::entities::mapping::{ColumnMapping, ColumnPair};
use crate::error::Result;

/// A named mapping as persisted on disk, together with the columns it
/// needs on each side to be reusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMapping {
    pub table: String,
    pub key: ColumnPair,
    #[serde(default)]
    pub values: Vec<ColumnPair>,
    #[serde(default)]
    pub source_columns_required: Vec<String>,
    #[serde(default)]
    pub target_columns_required: Vec<String>,
    pub created_at: String,
}

impl SavedMapping {
    pub fn from_mapping(table: &str, mapping: &ColumnMapping) -> Self {
        Self {
            table: table.to_string(),
            key: mapping.key().clone(),
            values: mapping.values().to_vec(),
            source_columns_required: mapping
                .source_columns()
                .into_iter()
                .map(str::to_string)
                .collect(),
            target_columns_required: mapping
                .target_columns()
                .into_iter()
                .map(str::to_string)
                .collect(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Revalidates the stored pairs.
    pub fn to_mapping(&self) -> Result<ColumnMapping> {
        ColumnMapping::new(self.key.clone(), self.values.clone())
    }

    fn is_compatible(&self, table: &str, source: &HashSet<&str>, target: &HashSet<&str>) -> bool {
        self.table == table
            && self
                .source_columns_required
                .iter()
                .all(|column| source.contains(column.as_str()))
            && self
                .target_columns_required
                .iter()
                .all(|column| target.contains(column.as_str()))
    }
}

/// Named mappings in one JSON file. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<BTreeMap<String, SavedMapping>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save_all(&self, mappings: &BTreeMap<String, SavedMapping>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(mappings)?)?;
        Ok(())
    }

    /// Stores `mapping` under `name`, replacing any previous entry.
    pub fn save(&self, name: &str, table: &str, mapping: &ColumnMapping) -> Result<SavedMapping> {
        let mut mappings = self.load_all()?;
        let saved = SavedMapping::from_mapping(table, mapping);
        if mappings.insert(name.to_string(), saved.clone()).is_some() {
            debug!(mapping = name, "replacing saved mapping");
        }
        self.save_all(&mappings)?;
        info!(mapping = name, table, "saved mapping");
        Ok(saved)
    }

    /// Names of mappings for `table` whose required columns all exist.
    pub fn compatible(
        &self,
        table: &str,
        source_columns: &[String],
        target_columns: &[String],
    ) -> Result<Vec<String>> {
        let source: HashSet<&str> = source_columns.iter().map(String::as_str).collect();
        let target: HashSet<&str> = target_columns.iter().map(String::as_str).collect();
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|(_, saved)| saved.is_compatible(table, &source, &target))
            .map(|(name, _)| name)
            .collect())
    }

    pub fn load(&self, name: &str) -> Result<Option<SavedMapping>> {
        Ok(self.load_all()?.remove(name))
    }

    /// Returns whether a mapping was removed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut mappings = self.load_all()?;
        if mappings.remove(name).is_none() {
            return Ok(false);
        }
        self.save_all(&mappings)?;
        info!(mapping = name, "deleted mapping");
        Ok(true)
    }

    pub fn list_all(&self) -> Result<Vec<String>> {
        Ok(self.load_all()?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn people_mapping() -> ColumnMapping {
        ColumnMapping::new(
            ColumnPair::new("ID", "id"),
            vec![ColumnPair::new("Name", "name"), ColumnPair::new("Mail", "email")],
        )
        .expect("mapping should be valid")
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn save_then_load_restores_mapping() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = MappingStore::new(dir.path().join("nested").join("mappings.json"));

        store
            .save("people", "people", &people_mapping())
            .expect("save should succeed");

        let saved = store
            .load("people")
            .expect("load should succeed")
            .expect("mapping should exist");
        assert_eq!(saved.table, "people");
        assert_eq!(saved.source_columns_required, vec!["ID", "Name", "Mail"]);
        assert_eq!(saved.target_columns_required, vec!["id", "name", "email"]);
        assert_eq!(saved.to_mapping().expect("should revalidate"), people_mapping());
    }

    #[test]
    fn compatible_requires_table_and_columns() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = MappingStore::new(dir.path().join("mappings.json"));
        store
            .save("people", "people", &people_mapping())
            .expect("save should succeed");

        let full_source = columns(&["ID", "Name", "Mail", "Extra"]);
        let full_target = columns(&["id", "name", "email"]);

        assert_eq!(
            store
                .compatible("people", &full_source, &full_target)
                .expect("query should succeed"),
            vec!["people"]
        );
        assert!(store
            .compatible("staff", &full_source, &full_target)
            .expect("query should succeed")
            .is_empty());
        assert!(store
            .compatible("people", &columns(&["ID", "Name"]), &full_target)
            .expect("query should succeed")
            .is_empty());
        assert!(store
            .compatible("people", &full_source, &columns(&["id", "name"]))
            .expect("query should succeed")
            .is_empty());
    }

    #[test]
    fn delete_and_list() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = MappingStore::new(dir.path().join("mappings.json"));
        assert!(store.list_all().expect("list should succeed").is_empty());

        store
            .save("b", "people", &people_mapping())
            .expect("save should succeed");
        store
            .save("a", "people", &people_mapping())
            .expect("save should succeed");
        assert_eq!(store.list_all().expect("list should succeed"), vec!["a", "b"]);

        assert!(store.delete("a").expect("delete should succeed"));
        assert!(!store.delete("a").expect("delete should succeed"));
        assert_eq!(store.list_all().expect("list should succeed"), vec!["b"]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("mappings.json");
        fs::write(&path, "{ not json").expect("should write file");

        let err = MappingStore::new(&path)
            .list_all()
            .expect_err("corrupt json should fail");

        assert!(matches!(err, SyncError::Json(_)));
    }
}
