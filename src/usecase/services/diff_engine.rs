use crate::domain::entities::change::{ChangeKind, ChangeRecord, ColumnChange, TypeCoercionError};
use crate::domain::entities::mapping::ColumnMapping;
use crate::domain::entities::row::{SourceRow, TargetRow};
use crate::domain::entities::value::{ColumnType, Scalar, TypeMismatch};
use crate::usecase::services::row_source::ColumnTypes;

/// Classifies one spreadsheet row against its matched table row, if any.
///
/// Returns `None` when the row has a blank key or when a matched row has
/// no differing columns. Records with values that cannot be stored in
/// their column are returned with `issues` set, even if nothing else
/// differs, so the preview can flag them.
pub fn diff(
    source: &SourceRow,
    matched: Option<&TargetRow>,
    mapping: &ColumnMapping,
    types: &ColumnTypes,
) -> Option<ChangeRecord> {
    let key_pair = mapping.key();
    let source_key = source.get(&key_pair.source);
    source_key.key()?;

    let mut issues = Vec::new();
    let key = match matched {
        Some(target) => target.stored(&key_pair.target).clone(),
        None => {
            let key_type = column_type(types, &key_pair.target);
            match key_type.coerce(source_key) {
                Ok(key) => writable(key_type, source.text(&key_pair.source), key),
                Err(mismatch) => {
                    issues.push(coercion_error(&key_pair.target, mismatch));
                    source_key.clone()
                }
            }
        }
    };

    let mut changes = Vec::new();
    for pair in mapping.values() {
        let column_type = column_type(types, &pair.target);
        let coerced = match column_type.coerce(source.get(&pair.source)) {
            Ok(value) => value,
            Err(mismatch) => {
                issues.push(coercion_error(&pair.target, mismatch));
                continue;
            }
        };

        match matched {
            None if coerced.is_null() => {}
            None => changes.push(ColumnChange {
                column: pair.target.clone(),
                old: Scalar::Null,
                new: writable(column_type, source.text(&pair.source), coerced),
            }),
            Some(target) => {
                let old = target.get(&pair.target);
                let comparable = column_type.coerce(old).unwrap_or_else(|_| old.clone());
                if !coerced.canonical_eq(&comparable) {
                    changes.push(ColumnChange {
                        column: pair.target.clone(),
                        old: target.stored(&pair.target).clone(),
                        new: writable(column_type, source.text(&pair.source), coerced),
                    });
                }
            }
        }
    }

    let kind = if matched.is_some() {
        ChangeKind::Update
    } else {
        ChangeKind::New
    };
    if kind == ChangeKind::Update && changes.is_empty() && issues.is_empty() {
        return None;
    }

    Some(ChangeRecord {
        key,
        kind,
        changes,
        source_row: source.clone(),
        issues,
    })
}

/// Value bound on write. Text and untyped columns receive the cell text as
/// typed, so "+15551234567" is not stored as a number and "1.0" keeps its
/// decimal. Comparison still uses the coerced canonical value.
fn writable(column_type: ColumnType, text: Option<&str>, coerced: Scalar) -> Scalar {
    match (column_type, text) {
        (ColumnType::Text | ColumnType::Any, Some(text)) if !coerced.is_null() => {
            Scalar::Text(text.to_string())
        }
        _ => coerced,
    }
}

fn column_type(types: &ColumnTypes, column: &str) -> ColumnType {
    types.get(column).copied().unwrap_or(ColumnType::Any)
}

fn coercion_error(column: &str, mismatch: TypeMismatch) -> TypeCoercionError {
    TypeCoercionError {
        column: column.to_string(),
        value: mismatch.value,
        expected: mismatch.expected,
    }
}
