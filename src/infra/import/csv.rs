use std::path::Path;

use anyhow::Context;
use csv::StringRecord;
use tracing::{debug, instrument};

use crate::error::{Result, SourceLoadError};
use crate::infra::import::{build_sheet, unreadable};
use crate::usecase::ports::sheet::{RawCell, SheetData};

/// A CSV file exposes one sheet named after the file stem.
pub fn sheet_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("sheet")
        .to_string()
}

fn record_to_raw(record: &StringRecord) -> Vec<RawCell> {
    record
        .iter()
        .map(|field| {
            if field.trim().is_empty() {
                RawCell::Empty
            } else {
                RawCell::Text(field.to_string())
            }
        })
        .collect()
}

#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<SheetData> {
    let name = sheet_name(path);
    if let Some(requested) = sheet {
        if requested != name {
            return Err(SourceLoadError::SheetNotFound(requested.to_string()).into());
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open csv: {}", path.display()))
        .map_err(|err| unreadable(path, err))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record
            .with_context(|| format!("failed to read csv record: {}", path.display()))
            .map_err(|err| unreadable(path, err))?;
        let number = record
            .position()
            .map_or(rows.len() + 1, |position| position.line() as usize);
        rows.push((number, record_to_raw(&record)));
    }

    let data = build_sheet(&name, rows)?;
    debug!(sheet = %data.name, row_count = data.rows.len(), "read csv sheet");
    Ok(data)
}
