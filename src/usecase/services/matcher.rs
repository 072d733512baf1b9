use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::entities::row::{SourceRow, TargetRow};
use crate::domain::entities::value::KeyValue;

/// Target rows indexed by canonical key value.
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    rows: HashMap<KeyValue, TargetRow>,
    duplicates: usize,
    unkeyed: usize,
}

impl TargetIndex {
    pub fn get(&self, key: &KeyValue) -> Option<&TargetRow> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows superseded by a later row carrying the same key.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Rows skipped because their key column was null.
    pub fn unkeyed(&self) -> usize {
        self.unkeyed
    }
}

/// Indexes rows by `key_column`. When two rows share a key the later one
/// (by load order) wins.
pub fn build_index(rows: Vec<TargetRow>, key_column: &str) -> TargetIndex {
    let mut index = TargetIndex::default();
    for row in rows {
        let Some(key) = row.get(key_column).key() else {
            index.unkeyed += 1;
            continue;
        };
        if index.rows.insert(key.clone(), row).is_some() {
            debug!(?key, "duplicate target key, keeping the later row");
            index.duplicates += 1;
        }
    }

    if index.duplicates > 0 {
        warn!(
            duplicates = index.duplicates,
            key_column, "target table has duplicate keys; later rows win"
        );
    }
    index
}

/// Looks up the table row for a spreadsheet row. Rows with a blank key never match.
pub fn resolve<'a>(
    row: &SourceRow,
    index: &'a TargetIndex,
    source_key_column: &str,
) -> Option<&'a TargetRow> {
    row.get(source_key_column)
        .key()
        .and_then(|key| index.get(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::value::Scalar;
    use std::collections::BTreeMap;

    fn target(id: Scalar, name: &str) -> TargetRow {
        TargetRow {
            values: BTreeMap::from([
                ("id".to_string(), id),
                ("name".to_string(), Scalar::Text(name.to_string())),
            ]),
            ..TargetRow::default()
        }
    }

    fn source(id: Scalar) -> SourceRow {
        SourceRow {
            ordinal: 2,
            values: BTreeMap::from([("code".to_string(), id)]),
            ..SourceRow::default()
        }
    }

    #[test]
    fn later_duplicate_wins() {
        let index = build_index(
            vec![
                target(Scalar::Int(1), "first"),
                target(Scalar::Int(1), "second"),
            ],
            "id",
        );

        assert_eq!(index.len(), 1);
        assert_eq!(index.duplicates(), 1);
        let row = resolve(&source(Scalar::Int(1)), &index, "code").expect("key should match");
        assert_eq!(row.get("name"), &Scalar::Text("second".to_string()));
    }

    #[test]
    fn null_keys_are_not_indexed() {
        let index = build_index(vec![target(Scalar::Null, "nobody")], "id");
        assert!(index.is_empty());
        assert_eq!(index.unkeyed(), 1);
    }

    #[test]
    fn resolve_matches_numerically_equal_keys() {
        let index = build_index(vec![target(Scalar::Int(7), "seven")], "id");
        assert!(resolve(&source(Scalar::Float(7.0)), &index, "code").is_some());
        assert!(resolve(&source(Scalar::Text("7a".to_string())), &index, "code").is_none());
        assert!(resolve(&source(Scalar::Null), &index, "code").is_none());
    }
}
