use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::domain::entities::mapping::ColumnMapping;
use crate::domain::entities::row::{SourceRow, TargetRow};
use crate::domain::entities::value::{ColumnType, Scalar};
use crate::error::{Result, Side, SourceLoadError};
use crate::usecase::ports::sheet::{RawCell, SheetData};
use crate::usecase::ports::target::TargetStore;

/// Declared type of every mapped table column.
pub type ColumnTypes = HashMap<String, ColumnType>;

/// Target rows plus the column types needed to coerce source values.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSnapshot {
    pub rows: Vec<TargetRow>,
    pub types: ColumnTypes,
}

/// Keeps only the mapped columns of every sheet row and canonicalizes
/// their cells.
#[instrument(level = "debug", skip_all, fields(sheet = %sheet.name))]
pub fn load_source(sheet: &SheetData, mapping: &ColumnMapping) -> Result<Vec<SourceRow>> {
    if sheet.headers.is_empty() {
        return Err(SourceLoadError::EmptySheet(sheet.name.clone()).into());
    }

    let key = &mapping.key().source;
    if sheet.column_index(key).is_none() {
        return Err(SourceLoadError::MissingKeyColumn {
            side: Side::Source,
            column: key.clone(),
        }
        .into());
    }

    let mut columns = Vec::new();
    for column in mapping.source_columns() {
        let index = sheet
            .column_index(column)
            .ok_or_else(|| SourceLoadError::MissingColumn {
                side: Side::Source,
                column: column.to_string(),
            })?;
        columns.push((column, index));
    }

    let rows: Vec<SourceRow> = sheet
        .rows
        .iter()
        .map(|row| SourceRow {
            ordinal: row.number,
            values: columns
                .iter()
                .map(|(column, index)| (column.to_string(), canonicalize(row.cells.get(*index))))
                .collect(),
            text: columns
                .iter()
                .filter_map(|(column, index)| {
                    cell_text(row.cells.get(*index)).map(|text| (column.to_string(), text))
                })
                .collect(),
        })
        .collect();

    debug!(row_count = rows.len(), column_count = columns.len(), "loaded source rows");
    Ok(rows)
}

/// Reads the mapped columns of every table row.
#[instrument(level = "debug", skip(store, mapping))]
pub fn load_target(
    store: &dyn TargetStore,
    table: &str,
    mapping: &ColumnMapping,
) -> Result<TargetSnapshot> {
    let described = store.describe_table(table)?;
    if described.is_empty() {
        return Err(SourceLoadError::TableNotFound(table.to_string()).into());
    }

    let key = &mapping.key().target;
    if !described.iter().any(|column| &column.name == key) {
        return Err(SourceLoadError::MissingKeyColumn {
            side: Side::Target,
            column: key.clone(),
        }
        .into());
    }

    let wanted = mapping.target_columns();
    let mut types = ColumnTypes::new();
    for column in &wanted {
        let found = described
            .iter()
            .find(|described| described.name == *column)
            .ok_or_else(|| SourceLoadError::MissingColumn {
                side: Side::Target,
                column: column.to_string(),
            })?;
        types.insert(found.name.clone(), found.column_type);
    }

    let rows: Vec<TargetRow> = store
        .fetch_rows(table, &wanted)?
        .into_iter()
        .map(|values| {
            TargetRow::from_stored(
                wanted
                    .iter()
                    .map(|column| column.to_string())
                    .zip(values)
                    .collect(),
            )
        })
        .collect();

    debug!(row_count = rows.len(), "loaded target rows");
    Ok(TargetSnapshot { rows, types })
}

/// Canonical scalar for a parsed cell. Missing and blank cells become `Null`.
pub fn canonicalize(cell: Option<&RawCell>) -> Scalar {
    match cell {
        None | Some(RawCell::Empty) => Scalar::Null,
        Some(RawCell::Text(text)) => Scalar::from_text(text),
        Some(RawCell::Int(value)) => Scalar::Int(*value),
        Some(RawCell::Float(value)) => Scalar::from_float(*value),
        Some(RawCell::Bool(value)) => Scalar::Bool(*value),
        Some(RawCell::Serial(serial)) => Scalar::from_excel_serial(*serial),
        Some(RawCell::DateTime(value)) => Scalar::DateTime(*value).normalized(),
        Some(RawCell::Error(code)) => Scalar::Text(code.clone()),
    }
}

/// Trimmed text of a non-blank text cell.
fn cell_text(cell: Option<&RawCell>) -> Option<String> {
    match cell {
        Some(RawCell::Text(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::mapping::ColumnPair;
    use crate::error::SyncError;
    use crate::usecase::ports::sheet::SheetRow;

    fn sheet() -> SheetData {
        SheetData {
            name: "People".to_string(),
            headers: vec!["id".to_string(), "name".to_string(), "note".to_string()],
            rows: vec![SheetRow {
                number: 2,
                cells: vec![
                    RawCell::Float(1.0),
                    RawCell::Text(" Alice ".to_string()),
                    RawCell::Text("ignored".to_string()),
                ],
            }],
        }
    }

    fn mapping(key: &str) -> ColumnMapping {
        ColumnMapping::new(ColumnPair::new(key, "id"), vec![ColumnPair::new("name", "name")])
            .expect("mapping should be valid")
    }

    #[test]
    fn keeps_only_mapped_columns() {
        let rows = load_source(&sheet(), &mapping("id")).expect("source should load");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ordinal, 2);
        assert_eq!(rows[0].values.len(), 2);
        assert_eq!(rows[0].get("name"), &Scalar::Text("Alice".to_string()));
        assert_eq!(rows[0].get("note"), &Scalar::Null);
    }

    #[test]
    fn missing_key_column_is_a_load_error() {
        let err = load_source(&sheet(), &mapping("code")).expect_err("key is absent");
        assert!(matches!(
            err,
            SyncError::SourceLoad(SourceLoadError::MissingKeyColumn {
                side: Side::Source,
                ..
            })
        ));
    }

    #[test]
    fn text_cells_keep_their_trimmed_text() {
        let mut sheet = sheet();
        sheet.rows[0].cells[1] = RawCell::Text(" 007 ".to_string());
        let rows = load_source(&sheet, &mapping("id")).expect("source should load");

        assert_eq!(rows[0].text("name"), Some("007"));
        assert_eq!(rows[0].text("id"), None);
    }

    #[test]
    fn short_rows_read_as_null() {
        let mut sheet = sheet();
        sheet.rows[0].cells.truncate(1);
        let rows = load_source(&sheet, &mapping("id")).expect("source should load");
        assert_eq!(rows[0].get("name"), &Scalar::Null);
    }

    #[test]
    fn blank_text_canonicalizes_to_null() {
        assert_eq!(canonicalize(Some(&RawCell::Text("  ".to_string()))), Scalar::Null);
        assert_eq!(canonicalize(Some(&RawCell::Empty)), Scalar::Null);
        assert_eq!(canonicalize(None), Scalar::Null);
    }
}
