use crate::domain::entities::change::{ChangeKind, ChangeRecord, Highlight};

/// Non-fatal conditions noticed while building a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanWarnings {
    /// Target rows superseded by a later row with the same key.
    pub duplicate_target_keys: usize,
    /// Spreadsheet rows whose key already appeared earlier in the sheet.
    pub duplicate_source_keys: usize,
    /// Spreadsheet rows dropped because their key was blank.
    pub skipped_missing_key: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub new_count: usize,
    pub update_count: usize,
    pub invalid_count: usize,
    pub duplicate_target_keys: usize,
    pub duplicate_source_keys: usize,
    pub skipped_missing_key: usize,
}

impl PlanCounts {
    pub fn executable(&self) -> usize {
        self.new_count + self.update_count
    }
}

/// One line of the colour-coded preview grid: a single changed column.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow {
    pub key: String,
    pub column: String,
    pub source_value: String,
    pub target_value: String,
    pub action: String,
    pub highlight: Highlight,
}

/// Ordered change set for one preview generation. Read-only once built;
/// any upstream change means building a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    records: Vec<ChangeRecord>,
    warnings: PlanWarnings,
}

impl ReconciliationPlan {
    pub fn new(records: Vec<ChangeRecord>, warnings: PlanWarnings) -> Self {
        Self { records, warnings }
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Records the executor will apply: every valid one, in plan order.
    pub fn executable(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(|record| record.is_valid())
    }

    pub fn warnings(&self) -> PlanWarnings {
        self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts {
            duplicate_target_keys: self.warnings.duplicate_target_keys,
            duplicate_source_keys: self.warnings.duplicate_source_keys,
            skipped_missing_key: self.warnings.skipped_missing_key,
            ..PlanCounts::default()
        };
        for record in &self.records {
            match (record.is_valid(), record.kind) {
                (false, _) => counts.invalid_count += 1,
                (true, ChangeKind::New) => counts.new_count += 1,
                (true, ChangeKind::Update) => counts.update_count += 1,
            }
        }
        counts
    }

    /// Flattens the plan into one preview line per changed column. Invalid
    /// records contribute one line per coercion problem as well.
    pub fn preview_rows(&self) -> Vec<PreviewRow> {
        let mut rows = Vec::new();
        for record in &self.records {
            let key = record.key.to_string();
            let highlight = record.highlight();
            for change in &record.changes {
                rows.push(PreviewRow {
                    key: key.clone(),
                    column: change.column.clone(),
                    source_value: change.new.to_string(),
                    target_value: change.old.to_string(),
                    action: record.kind.to_string(),
                    highlight,
                });
            }
            for issue in &record.issues {
                rows.push(PreviewRow {
                    key: key.clone(),
                    column: issue.column.clone(),
                    source_value: issue.value.to_string(),
                    target_value: "-".to_string(),
                    action: format!("INVALID ({})", issue.expected),
                    highlight,
                });
            }
        }
        rows
    }
}
