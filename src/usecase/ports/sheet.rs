use chrono::NaiveDateTime;

/// Cell as delivered by a spreadsheet parser, before canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Excel serial date/time number.
    Serial(f64),
    DateTime(NaiveDateTime),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based row number in the sheet, header included.
    pub number: usize,
    pub cells: Vec<RawCell>,
}

/// Parsed sheet: the first row as column names, remaining non-blank rows as data.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl SheetData {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }
}
