use std::collections::HashSet;

use tracing::{info, instrument};

use crate::domain::entities::mapping::ColumnMapping;
use crate::domain::entities::plan::{PlanWarnings, ReconciliationPlan};
use crate::domain::entities::row::SourceRow;
use crate::error::Result;
use crate::usecase::ports::sheet::SheetData;
use crate::usecase::ports::target::TargetStore;
use crate::usecase::services::diff_engine::diff;
use crate::usecase::services::matcher::{build_index, resolve, TargetIndex};
use crate::usecase::services::row_source::{load_source, load_target, ColumnTypes};

/// Runs the matcher and diff engine over every source row, in sheet order.
pub fn build(
    source_rows: &[SourceRow],
    index: &TargetIndex,
    mapping: &ColumnMapping,
    types: &ColumnTypes,
) -> ReconciliationPlan {
    let key_column = &mapping.key().source;
    let mut warnings = PlanWarnings {
        duplicate_target_keys: index.duplicates(),
        ..PlanWarnings::default()
    };
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for row in source_rows {
        let Some(key) = row.get(key_column).key() else {
            warnings.skipped_missing_key += 1;
            continue;
        };
        if !seen.insert(key) {
            warnings.duplicate_source_keys += 1;
        }

        let matched = resolve(row, index, key_column);
        if let Some(record) = diff(row, matched, mapping, types) {
            records.push(record);
        }
    }

    ReconciliationPlan::new(records, warnings)
}

/// Loads both sides and builds the plan for one mapping: the whole
/// "Generate Preview" step.
#[instrument(level = "info", skip(sheet, store, mapping), fields(sheet = %sheet.name))]
pub fn reconcile(
    sheet: &SheetData,
    store: &dyn TargetStore,
    table: &str,
    mapping: &ColumnMapping,
) -> Result<ReconciliationPlan> {
    let source_rows = load_source(sheet, mapping)?;
    let snapshot = load_target(store, table, mapping)?;
    let index = build_index(snapshot.rows, &mapping.key().target);
    let plan = build(&source_rows, &index, mapping, &snapshot.types);

    let counts = plan.counts();
    info!(
        source_rows = source_rows.len(),
        target_rows = index.len(),
        new = counts.new_count,
        update = counts.update_count,
        invalid = counts.invalid_count,
        skipped = counts.skipped_missing_key,
        "reconciliation plan built"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::change::ChangeKind;
    use crate::domain::entities::mapping::ColumnPair;
    use crate::domain::entities::row::TargetRow;
    use crate::domain::entities::value::{ColumnType, Scalar};
    use std::collections::BTreeMap;

    fn mapping() -> ColumnMapping {
        ColumnMapping::new(ColumnPair::new("id", "id"), vec![ColumnPair::new("name", "name")])
            .expect("mapping should be valid")
    }

    fn types() -> ColumnTypes {
        ColumnTypes::from([
            ("id".to_string(), ColumnType::Integer),
            ("name".to_string(), ColumnType::Text),
            ("score".to_string(), ColumnType::Integer),
        ])
    }

    fn row(ordinal: usize, id: Scalar, name: &str) -> SourceRow {
        SourceRow {
            ordinal,
            values: BTreeMap::from([
                ("id".to_string(), id),
                ("name".to_string(), Scalar::from_text(name)),
            ]),
            ..SourceRow::default()
        }
    }

    fn target(id: i64, name: &str) -> TargetRow {
        TargetRow {
            values: BTreeMap::from([
                ("id".to_string(), Scalar::Int(id)),
                ("name".to_string(), Scalar::from_text(name)),
            ]),
            ..TargetRow::default()
        }
    }

    #[test]
    fn alice_bob_scenario() {
        let source = vec![
            row(2, Scalar::Int(1), "Alice"),
            row(3, Scalar::Int(2), "Bob"),
        ];
        let index = build_index(vec![target(1, "Alicia")], "id");

        let plan = build(&source, &index, &mapping(), &types());

        let records = plan.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, ChangeKind::Update);
        assert_eq!(records[0].key, Scalar::Int(1));
        assert_eq!(records[0].changes[0].old, Scalar::Text("Alicia".to_string()));
        assert_eq!(records[0].changes[0].new, Scalar::Text("Alice".to_string()));
        assert_eq!(records[1].kind, ChangeKind::New);
        assert_eq!(records[1].key, Scalar::Int(2));

        let counts = plan.counts();
        assert_eq!((counts.new_count, counts.update_count), (1, 1));
    }

    #[test]
    fn every_keyed_row_lands_in_exactly_one_outcome() {
        let mapping = ColumnMapping::new(
            ColumnPair::new("id", "id"),
            vec![ColumnPair::new("name", "name"), ColumnPair::new("score", "score")],
        )
        .expect("mapping should be valid");
        let mut invalid = row(4, Scalar::Int(3), "Cara");
        invalid
            .values
            .insert("score".to_string(), Scalar::Text("high".to_string()));
        let source = vec![
            row(2, Scalar::Int(1), "Same"),
            row(3, Scalar::Int(2), "Changed"),
            invalid,
            row(5, Scalar::Int(4), "Fresh"),
            row(6, Scalar::Null, "No key"),
        ];
        let index = build_index(vec![target(1, "Same"), target(2, "Old"), target(3, "Cara")], "id");

        let plan = build(&source, &index, &mapping, &types());
        let counts = plan.counts();

        assert_eq!(counts.update_count, 1);
        assert_eq!(counts.new_count, 1);
        assert_eq!(counts.invalid_count, 1);
        assert_eq!(counts.skipped_missing_key, 1);
        assert_eq!(plan.records().len(), 3);
        assert_eq!(plan.executable().count(), 2);
    }

    #[test]
    fn duplicate_keys_are_counted_not_merged() {
        let source = vec![
            row(2, Scalar::Int(9), "First"),
            row(3, Scalar::Int(9), "Second"),
        ];
        let index = build_index(vec![target(1, "a"), target(1, "b")], "id");

        let plan = build(&source, &index, &mapping(), &types());
        let counts = plan.counts();

        assert_eq!(counts.duplicate_source_keys, 1);
        assert_eq!(counts.duplicate_target_keys, 1);
        assert_eq!(counts.new_count, 2);
    }

    #[test]
    fn preview_rows_flatten_changes_with_colours() {
        let source = vec![
            row(2, Scalar::Int(1), "Alice"),
            row(3, Scalar::Int(2), "Bob"),
        ];
        let index = build_index(vec![target(1, "Alicia")], "id");
        let plan = build(&source, &index, &mapping(), &types());

        let preview = plan.preview_rows();

        assert_eq!(preview.len(), 2);
        assert_eq!(preview[0].action, "UPDATE");
        assert_eq!(preview[0].target_value, "Alicia");
        assert_eq!(preview[0].highlight.rgb(), (255, 220, 180));
        assert_eq!(preview[1].action, "ADD");
        assert_eq!(preview[1].highlight.rgb(), (200, 255, 200));
    }
}
