use tracing::{debug, instrument};

use crate::domain::entities::mapping::ColumnMapping;
use crate::domain::entities::plan::ReconciliationPlan;
use crate::error::{Result, SyncError};
use crate::usecase::ports::sheet::SheetData;
use crate::usecase::ports::target::TargetStore;
use crate::usecase::services::planner::reconcile;
use crate::usecase::services::sync_executor::{execute, SyncControl, SyncResult};

/// Everything upstream of a preview. Changing any field invalidates the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub source: String,
    pub sheet: String,
    pub connection: String,
    pub table: String,
    pub mapping: ColumnMapping,
}

/// State of one interactive reconciliation: the current selection and
/// the plan generated for it, if it is still current.
#[derive(Debug, Default)]
pub struct SyncSession {
    selection: Option<Selection>,
    plan: Option<ReconciliationPlan>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Replaces the selection. The current plan is discarded unless the
    /// selection is unchanged.
    pub fn select(&mut self, selection: Selection) {
        if self.selection.as_ref() == Some(&selection) {
            return;
        }
        if self.plan.take().is_some() {
            debug!("selection changed, preview discarded");
        }
        self.selection = Some(selection);
    }

    pub fn invalidate(&mut self) {
        self.plan = None;
    }

    /// The current plan, if one was generated for the current selection.
    pub fn plan(&self) -> Option<&ReconciliationPlan> {
        self.plan.as_ref()
    }

    /// "Generate Preview": rebuilds the plan from scratch for the current selection.
    #[instrument(level = "debug", skip_all)]
    pub fn generate_preview(
        &mut self,
        sheet: &SheetData,
        store: &dyn TargetStore,
    ) -> Result<&ReconciliationPlan> {
        self.plan = None;
        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| SyncError::InvalidMapping("nothing selected".to_string()))?;
        let plan = reconcile(sheet, store, &selection.table, &selection.mapping)?;
        Ok(self.plan.insert(plan))
    }

    /// "Execute Sync": applies the current plan. Fails with
    /// [`SyncError::StalePlan`] when there is no current preview. A
    /// committed plan is consumed; a rolled-back one stays current so the
    /// run can be retried.
    pub fn execute(
        &mut self,
        store: &mut dyn TargetStore,
        control: &SyncControl<'_>,
    ) -> Result<SyncResult> {
        let (Some(selection), Some(plan)) = (&self.selection, &self.plan) else {
            return Err(SyncError::StalePlan);
        };
        let result = execute(
            plan,
            store,
            &selection.table,
            &selection.mapping.key().target,
            control,
        )?;
        if result.is_committed() {
            self.plan = None;
        }
        Ok(result)
    }
}
