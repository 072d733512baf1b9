use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// One `spreadsheet column -> table column` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnPair {
    pub source: String,
    pub target: String,
}

impl ColumnPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Parses the `SOURCE=TARGET` form used on the command line. A bare
    /// name maps a column onto the identically named one.
    pub fn parse(raw: &str) -> Result<Self> {
        let (source, target) = raw.split_once('=').unwrap_or((raw, raw));
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return Err(SyncError::InvalidMapping(format!(
                "expected SOURCE=TARGET, got '{raw}'"
            )));
        }
        Ok(Self::new(source, target))
    }
}

/// Key pair plus ordered value pairs. Construction validates that the key
/// is present and that no table column is targeted twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    key: ColumnPair,
    values: Vec<ColumnPair>,
}

impl ColumnMapping {
    pub fn new(key: ColumnPair, values: Vec<ColumnPair>) -> Result<Self> {
        if key.source.trim().is_empty() || key.target.trim().is_empty() {
            return Err(SyncError::InvalidMapping(
                "key column pair must name both columns".to_string(),
            ));
        }

        let mut targets = HashSet::new();
        targets.insert(key.target.as_str());
        for pair in &values {
            if pair.source.trim().is_empty() || pair.target.trim().is_empty() {
                return Err(SyncError::InvalidMapping(
                    "value column pairs must name both columns".to_string(),
                ));
            }
            if pair.target == key.target {
                return Err(SyncError::InvalidMapping(format!(
                    "key column '{}' cannot also be a value target",
                    key.target
                )));
            }
            if !targets.insert(pair.target.as_str()) {
                return Err(SyncError::InvalidMapping(format!(
                    "table column '{}' is targeted more than once",
                    pair.target
                )));
            }
        }

        Ok(Self { key, values })
    }

    pub fn key(&self) -> &ColumnPair {
        &self.key
    }

    pub fn values(&self) -> &[ColumnPair] {
        &self.values
    }

    /// Spreadsheet columns the mapping reads, key first, without repeats.
    pub fn source_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(&self.key)
            .chain(&self.values)
            .map(|pair| pair.source.as_str())
            .filter(|column| seen.insert(*column))
            .collect()
    }

    /// Table columns the mapping touches, key first.
    pub fn target_columns(&self) -> Vec<&str> {
        std::iter::once(&self.key)
            .chain(&self.values)
            .map(|pair| pair.target.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_targets() {
        let result = ColumnMapping::new(
            ColumnPair::new("id", "id"),
            vec![ColumnPair::new("name", "name"), ColumnPair::new("alias", "name")],
        );
        assert!(matches!(result, Err(SyncError::InvalidMapping(_))));
    }

    #[test]
    fn rejects_value_pair_targeting_key() {
        let result = ColumnMapping::new(
            ColumnPair::new("id", "id"),
            vec![ColumnPair::new("other", "id")],
        );
        assert!(matches!(result, Err(SyncError::InvalidMapping(_))));
    }

    #[test]
    fn key_source_may_feed_a_value_column() {
        let mapping = ColumnMapping::new(
            ColumnPair::new("code", "id"),
            vec![ColumnPair::new("code", "code_copy")],
        )
        .expect("mapping should be valid");

        assert_eq!(mapping.source_columns(), vec!["code"]);
        assert_eq!(mapping.target_columns(), vec!["id", "code_copy"]);
    }

    #[test]
    fn parse_accepts_pairs_and_bare_names() {
        assert_eq!(
            ColumnPair::parse("Name = full_name").expect("pair should parse"),
            ColumnPair::new("Name", "full_name")
        );
        assert_eq!(
            ColumnPair::parse("city").expect("bare name should parse"),
            ColumnPair::new("city", "city")
        );
        assert!(ColumnPair::parse("=x").is_err());
    }
}
