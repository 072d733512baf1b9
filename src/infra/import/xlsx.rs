use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, instrument};

use crate::error::{Result, SourceLoadError};
use crate::infra::import::{build_sheet, unreadable};
use crate::usecase::ports::sheet::{RawCell, SheetData};

pub fn cell_to_raw(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(v) => RawCell::Text(v.clone()),
        Data::Float(v) => RawCell::Float(*v),
        Data::Int(v) => RawCell::Int(*v),
        Data::Bool(v) => RawCell::Bool(*v),
        Data::DateTime(v) => RawCell::Serial(v.as_f64()),
        Data::DateTimeIso(v) => RawCell::Text(v.clone()),
        Data::DurationIso(v) => RawCell::Text(v.clone()),
        Data::Error(v) => RawCell::Error(v.to_string()),
    }
}

pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
    let workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook: {}", path.display()))
        .map_err(|err| unreadable(path, err))?;
    Ok(workbook.sheet_names().to_vec())
}

#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<SheetData> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook: {}", path.display()))
        .map_err(|err| unreadable(path, err))?;

    let names = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(name) if names.iter().any(|candidate| candidate == name) => name.to_string(),
        Some(name) => return Err(SourceLoadError::SheetNotFound(name.to_string()).into()),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| SourceLoadError::EmptySheet(path.display().to_string()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .with_context(|| format!("failed to read sheet: {name}"))
        .map_err(|err| unreadable(path, err))?;

    // Row numbers are 1-based and count from the top of the sheet, not the used range.
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let rows = range.rows().enumerate().map(|(offset, cells)| {
        (first_row + offset + 1, cells.iter().map(cell_to_raw).collect())
    });

    let data = build_sheet(&name, rows)?;
    debug!(sheet = %data.name, row_count = data.rows.len(), "read workbook sheet");
    Ok(data)
}
