use std::collections::BTreeMap;

use crate::domain::entities::value::Scalar;

static NULL: Scalar = Scalar::Null;

/// Spreadsheet row restricted to the mapped columns. `ordinal` is the
/// 1-based row number in the sheet, header included.
///
/// `values` holds the canonical form used for matching and comparison.
/// `text` keeps the trimmed text of cells that arrived as text, so a
/// text column receives exactly what the sheet shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    pub ordinal: usize,
    pub values: BTreeMap<String, Scalar>,
    pub text: BTreeMap<String, String>,
}

impl SourceRow {
    pub fn get(&self, column: &str) -> &Scalar {
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.text.get(column).map(String::as_str)
    }
}

/// Snapshot of one table row restricted to the mapped columns.
///
/// `values` is canonical. `stored` is what the table holds, byte for byte,
/// and is what an UPDATE must bind to find the row again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetRow {
    pub values: BTreeMap<String, Scalar>,
    pub stored: BTreeMap<String, Scalar>,
}

impl TargetRow {
    /// Builds a row from the values a store returned, deriving the
    /// canonical form of each.
    pub fn from_stored(stored: BTreeMap<String, Scalar>) -> TargetRow {
        let values = stored
            .iter()
            .map(|(column, value)| (column.clone(), value.canonical()))
            .collect();
        TargetRow { values, stored }
    }

    pub fn get(&self, column: &str) -> &Scalar {
        self.values.get(column).unwrap_or(&NULL)
    }

    /// Stored value of `column`, falling back to the canonical one.
    pub fn stored(&self, column: &str) -> &Scalar {
        self.stored
            .get(column)
            .unwrap_or_else(|| self.get(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_text_survives_next_to_its_canonical_form() {
        let row = TargetRow::from_stored(BTreeMap::from([(
            "code".to_string(),
            Scalar::Text("1.50".to_string()),
        )]));

        assert_eq!(row.get("code"), &Scalar::Float(1.5));
        assert_eq!(row.stored("code"), &Scalar::Text("1.50".to_string()));
        assert_eq!(row.stored("missing"), &Scalar::Null);
    }
}
