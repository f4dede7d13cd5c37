/// Read-time task summary for the reports page

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::WorkflowResult;
use crate::auth::{authorization::require_any, context::AuthContext};
use crate::models::{
    permission::Permission,
    task::{Task, TaskFilter, TaskQuery, TaskScope, TaskStatus},
};
use crate::store::TaskStore;

/// Counts over every task, computed on request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub total_tasks: u64,
    /// `APPROVED`
    pub completed_tasks: u64,
    /// Anything not `APPROVED`
    pub pending_tasks: u64,
    /// Past due and not `APPROVED`
    pub overdue_tasks: u64,
    /// Every status, zero counts included
    pub by_status: BTreeMap<&'static str, u64>,
}

impl TaskSummary {
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let mut by_status: BTreeMap<&'static str, u64> =
            TaskStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        let mut completed = 0;
        let mut overdue = 0;

        for task in tasks {
            *by_status.entry(task.status.as_str()).or_default() += 1;
            if task.status == TaskStatus::Approved {
                completed += 1;
            }
            if task.is_overdue(now) {
                overdue += 1;
            }
        }

        let total = tasks.len() as u64;
        Self {
            total_tasks: total,
            completed_tasks: completed,
            pending_tasks: total - completed,
            overdue_tasks: overdue,
            by_status,
        }
    }
}

#[derive(Clone)]
pub struct Reports {
    tasks: Arc<dyn TaskStore>,
}

impl Reports {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }

    /// Requires `REPORT_VIEW`
    pub async fn summary(&self, actor: &AuthContext) -> WorkflowResult<TaskSummary> {
        require_any(actor, &[Permission::ReportView])?;

        let now = Utc::now();
        let query = TaskQuery {
            scope: TaskScope::All,
            filter: TaskFilter::default(),
        };
        let tasks = self.tasks.list_tasks(&query, now).await?;
        Ok(TaskSummary::from_tasks(&tasks, now))
    }
}
