use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::domain::entities::change::ChangeKind;
use crate::domain::entities::plan::ReconciliationPlan;
use crate::error::{Result, SyncError, SyncExecutionError};
use crate::usecase::ports::target::{quote_ident, Statement, TargetStore, TargetTransaction};

/// Shared flag a host sets to abandon a running sync.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Host hooks for a sync run: cancellation and `(applied, total)` progress.
#[derive(Default)]
pub struct SyncControl<'a> {
    pub cancel: CancelToken,
    pub on_progress: Option<Box<dyn Fn(usize, usize) + 'a>>,
}

impl SyncControl<'_> {
    fn report(&self, current: usize, total: usize) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(current, total);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub applied_count: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rollback_reason: Option<SyncExecutionError>,
}

impl SyncResult {
    fn rolled_back(reason: SyncExecutionError) -> Self {
        Self {
            applied_count: 0,
            inserted: 0,
            updated: 0,
            rollback_reason: Some(reason),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.rollback_reason.is_none()
    }

    /// Turns a rolled-back run into an error.
    pub fn into_result(self) -> Result<SyncResult> {
        match self.rollback_reason {
            Some(reason) => Err(SyncError::Execution(reason)),
            None => Ok(self),
        }
    }
}

/// Builds one parameterized statement per executable record, in plan order.
pub fn build_statements(
    plan: &ReconciliationPlan,
    table: &str,
    key_column: &str,
) -> Vec<Statement> {
    let table_sql = quote_ident(table);
    let key_sql = quote_ident(key_column);

    plan.executable()
        .map(|record| match record.kind {
            ChangeKind::New => {
                let mut columns = vec![key_sql.clone()];
                let mut params = vec![record.key.clone()];
                for change in &record.changes {
                    columns.push(quote_ident(&change.column));
                    params.push(change.new.clone());
                }
                let placeholders: Vec<String> =
                    (1..=params.len()).map(|idx| format!("?{idx}")).collect();
                Statement {
                    kind: ChangeKind::New,
                    key: record.key.clone(),
                    sql: format!(
                        "INSERT INTO {table_sql} ({}) VALUES ({})",
                        columns.join(", "),
                        placeholders.join(", ")
                    ),
                    params,
                }
            }
            ChangeKind::Update => {
                let mut assignments = Vec::new();
                let mut params = Vec::new();
                for (idx, change) in record.changes.iter().enumerate() {
                    assignments.push(format!("{} = ?{}", quote_ident(&change.column), idx + 1));
                    params.push(change.new.clone());
                }
                params.push(record.key.clone());
                Statement {
                    kind: ChangeKind::Update,
                    key: record.key.clone(),
                    sql: format!(
                        "UPDATE {table_sql} SET {} WHERE {key_sql} = ?{}",
                        assignments.join(", "),
                        params.len()
                    ),
                    params,
                }
            }
        })
        .collect()
}

/// Applies the plan inside one transaction. Any failed statement, an
/// update that matches no row, a cancellation or a failed commit rolls
/// back the whole run; the reason is returned in
/// [`SyncResult::rollback_reason`]. `Err` is reserved for failing to
/// open the transaction at all.
#[instrument(level = "info", skip(plan, store, control))]
pub fn execute(
    plan: &ReconciliationPlan,
    store: &mut dyn TargetStore,
    table: &str,
    key_column: &str,
    control: &SyncControl<'_>,
) -> Result<SyncResult> {
    let statements = build_statements(plan, table, key_column);
    let total = statements.len();
    if total == 0 {
        info!("plan has nothing to apply");
        return Ok(SyncResult {
            applied_count: 0,
            inserted: 0,
            updated: 0,
            rollback_reason: None,
        });
    }

    let mut tx = store.begin()?;
    let mut inserted = 0;
    let mut updated = 0;

    for (idx, statement) in statements.iter().enumerate() {
        if control.cancel.is_cancelled() {
            return Ok(roll_back(
                tx,
                SyncExecutionError::Cancelled {
                    applied: idx,
                    total,
                },
            ));
        }

        match tx.execute(statement) {
            Ok(0) if statement.kind == ChangeKind::Update => {
                return Ok(roll_back(
                    tx,
                    SyncExecutionError::ZeroRowsAffected {
                        key: statement.key.clone(),
                    },
                ));
            }
            Ok(_) => match statement.kind {
                ChangeKind::New => inserted += 1,
                ChangeKind::Update => updated += 1,
            },
            Err(failure) => {
                return Ok(roll_back(
                    tx,
                    SyncExecutionError::Statement {
                        key: statement.key.clone(),
                        kind: failure.kind,
                        detail: failure.detail,
                    },
                ));
            }
        }
        control.report(idx + 1, total);
    }

    if let Err(failure) = tx.commit() {
        let reason = SyncExecutionError::Commit(failure.detail);
        warn!(%reason, "sync rolled back");
        return Ok(SyncResult::rolled_back(reason));
    }

    info!(inserted, updated, "sync committed");
    Ok(SyncResult {
        applied_count: inserted + updated,
        inserted,
        updated,
        rollback_reason: None,
    })
}

fn roll_back(tx: Box<dyn TargetTransaction + '_>, reason: SyncExecutionError) -> SyncResult {
    warn!(%reason, "sync rolled back");
    if let Err(failure) = tx.rollback() {
        error!(detail = %failure.detail, "rollback failed");
    }
    SyncResult::rolled_back(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::change::{ChangeRecord, ColumnChange};
    use crate::domain::entities::plan::PlanWarnings;
    use crate::domain::entities::row::SourceRow;
    use crate::domain::entities::value::Scalar;

    fn record(kind: ChangeKind, key: i64, name: &str) -> ChangeRecord {
        ChangeRecord {
            key: Scalar::Int(key),
            kind,
            changes: vec![ColumnChange {
                column: "name".to_string(),
                old: Scalar::Null,
                new: Scalar::Text(name.to_string()),
            }],
            source_row: SourceRow {
                ordinal: 2,
                ..SourceRow::default()
            },
            issues: Vec::new(),
        }
    }

    #[test]
    fn statements_bind_values_and_quote_identifiers() {
        let plan = ReconciliationPlan::new(
            vec![
                record(ChangeKind::Update, 1, "Alice"),
                record(ChangeKind::New, 2, "Bob"),
            ],
            PlanWarnings::default(),
        );

        let statements = build_statements(&plan, "people", "id");

        assert_eq!(
            statements[0].sql,
            r#"UPDATE "people" SET "name" = ?1 WHERE "id" = ?2"#
        );
        assert_eq!(
            statements[0].params,
            vec![Scalar::Text("Alice".to_string()), Scalar::Int(1)]
        );
        assert_eq!(
            statements[1].sql,
            r#"INSERT INTO "people" ("id", "name") VALUES (?1, ?2)"#
        );
        assert_eq!(
            statements[1].params,
            vec![Scalar::Int(2), Scalar::Text("Bob".to_string())]
        );
    }

    #[test]
    fn invalid_records_produce_no_statements() {
        let mut invalid = record(ChangeKind::New, 3, "Cara");
        invalid.issues.push(crate::domain::entities::change::TypeCoercionError {
            column: "age".to_string(),
            value: Scalar::Text("old".to_string()),
            expected: crate::domain::entities::value::ColumnType::Integer,
        });
        let plan = ReconciliationPlan::new(vec![invalid], PlanWarnings::default());

        assert!(build_statements(&plan, "people", "id").is_empty());
    }

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let host = token.clone();
        host.cancel();
        assert!(token.is_cancelled());
    }
}
