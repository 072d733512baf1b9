use std::collections::HashSet;
use std::path::Path;

use crate::domain::entities::value::Scalar;
use crate::error::{Result, SourceLoadError};
use crate::usecase::ports::sheet::{RawCell, SheetData, SheetRow};

pub mod csv;
pub mod xlsx;

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Sheet names of a workbook in file order. A CSV file has exactly one.
pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
    if is_csv(path) {
        Ok(vec![self::csv::sheet_name(path)])
    } else {
        xlsx::list_sheets(path)
    }
}

/// Reads `sheet`, or the first sheet when none is named.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<SheetData> {
    if is_csv(path) {
        self::csv::read_sheet(path, sheet)
    } else {
        xlsx::read_sheet(path, sheet)
    }
}

pub(crate) fn unreadable(path: &Path, err: anyhow::Error) -> SourceLoadError {
    SourceLoadError::Unreadable {
        path: path.to_path_buf(),
        detail: format!("{err:#}"),
    }
}

fn is_blank(cell: &RawCell) -> bool {
    match cell {
        RawCell::Empty => true,
        RawCell::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn header_text(cell: &RawCell) -> String {
    match cell {
        RawCell::Empty => String::new(),
        RawCell::Text(text) => text.trim().to_string(),
        RawCell::Int(value) => value.to_string(),
        RawCell::Float(value) | RawCell::Serial(value) => Scalar::from_float(*value).to_string(),
        RawCell::Bool(value) => value.to_string(),
        RawCell::DateTime(value) => value.to_string(),
        RawCell::Error(value) => value.clone(),
    }
}

/// Turns numbered raw rows into a [`SheetData`]. The first row names the
/// columns; fully blank rows after it are dropped.
pub(crate) fn build_sheet<I>(name: &str, rows: I) -> Result<SheetData>
where
    I: IntoIterator<Item = (usize, Vec<RawCell>)>,
{
    let mut rows = rows.into_iter();
    let header_cells = loop {
        match rows.next() {
            Some((_, cells)) if cells.iter().all(is_blank) => continue,
            Some((_, cells)) => break cells,
            None => return Err(SourceLoadError::EmptySheet(name.to_string()).into()),
        }
    };

    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(header_cells.len());
    for (idx, cell) in header_cells.iter().enumerate() {
        let mut header = header_text(cell);
        if header.is_empty() {
            header = format!("column_{}", idx + 1);
        }
        if !seen.insert(header.clone()) {
            return Err(SourceLoadError::DuplicateHeader {
                sheet: name.to_string(),
                header,
            }
            .into());
        }
        headers.push(header);
    }

    let rows = rows
        .filter(|(_, cells)| !cells.iter().all(is_blank))
        .map(|(number, cells)| SheetRow { number, cells })
        .collect();

    Ok(SheetData {
        name: name.to_string(),
        headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn text(value: &str) -> RawCell {
        RawCell::Text(value.to_string())
    }

    #[test]
    fn blank_headers_get_positional_names() {
        let sheet = build_sheet(
            "People",
            vec![(1, vec![text("ID"), RawCell::Empty, text(" Name ")])],
        )
        .expect("sheet should build");

        assert_eq!(sheet.headers, vec!["ID", "column_2", "Name"]);
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = build_sheet("People", vec![(1, vec![text("ID"), text("ID")])])
            .expect_err("duplicate header should fail");

        assert!(matches!(
            err,
            SyncError::SourceLoad(SourceLoadError::DuplicateHeader { ref header, .. }) if header == "ID"
        ));
    }

    #[test]
    fn blank_rows_are_skipped_and_numbers_kept() {
        let sheet = build_sheet(
            "People",
            vec![
                (1, vec![text("ID")]),
                (2, vec![RawCell::Int(1)]),
                (3, vec![RawCell::Empty]),
                (4, vec![text("  ")]),
                (5, vec![RawCell::Int(2)]),
            ],
        )
        .expect("sheet should build");

        let numbers: Vec<usize> = sheet.rows.iter().map(|row| row.number).collect();
        assert_eq!(numbers, vec![2, 5]);
    }

    #[test]
    fn sheet_without_rows_is_empty() {
        let err = build_sheet("Empty", Vec::<(usize, Vec<RawCell>)>::new())
            .expect_err("empty sheet should fail");

        assert!(matches!(
            err,
            SyncError::SourceLoad(SourceLoadError::EmptySheet(ref name)) if name == "Empty"
        ));
    }
}
