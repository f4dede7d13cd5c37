/// Task model, status lattice and list queries
///
/// # State Machine
///
/// ```text
/// TODO → IN_PROGRESS → SUBMITTED → APPROVED
///             ↑             ↓
///             └──────── REJECTED ──→ SUBMITTED (resubmission)
/// ```
///
/// `APPROVED` is terminal. `TODO` is the initial status of every task.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     title TEXT NOT NULL,
///     description TEXT,
///     due_date TIMESTAMPTZ NOT NULL,
///     priority TEXT NOT NULL,
///     status TEXT NOT NULL DEFAULT 'TODO',
///     assigned_to UUID NOT NULL REFERENCES users(id),
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE task_categories (
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     category TEXT NOT NULL REFERENCES categories(name),
///     position INTEGER NOT NULL,
///     PRIMARY KEY (task_id, category)
/// );
/// ```
///
/// # Example
///
/// ```
/// use taskflow_shared::models::task::{TaskFilter, TaskStatus};
///
/// let filter = TaskFilter {
///     status: Some(TaskStatus::Submitted),
///     ..Default::default()
/// };
/// assert!(filter.assignee.is_none());
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, not yet accepted by the assignee
    Todo,

    /// Accepted and being worked on
    InProgress,

    /// Waiting for a reviewer
    Submitted,

    /// Accepted by a reviewer (terminal)
    Approved,

    /// Sent back by a reviewer
    Rejected,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Submitted,
        TaskStatus::Approved,
        TaskStatus::Rejected,
    ];

    /// Converts status to string for storage and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Submitted => "SUBMITTED",
            TaskStatus::Approved => "APPROVED",
            TaskStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Approved)
    }

    /// Review outcomes may only be reached through approve/reject
    pub fn is_review_outcome(&self) -> bool {
        matches!(self, TaskStatus::Approved | TaskStatus::Rejected)
    }

    /// Checks if transition to target status is an edge of the lattice
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Todo, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Submitted)
                | (TaskStatus::Rejected, TaskStatus::Submitted)
                | (TaskStatus::Rejected, TaskStatus::InProgress)
                | (TaskStatus::Submitted, TaskStatus::Approved)
                | (TaskStatus::Submitted, TaskStatus::Rejected)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("task status", s))
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            other => Err(ParseEnumError::new("priority", other)),
        }
    }
}

/// A unit of assigned work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Deadline; a task past it and not approved is overdue
    pub due_date: DateTime<Utc>,

    pub priority: Priority,

    /// Current lifecycle status; only changed through compare-and-set
    pub status: TaskStatus,

    /// Assignee (weak reference, never cascades)
    pub assigned_to: Uuid,

    /// Creator (weak reference, never cascades)
    pub created_by: Uuid,

    /// Category names, at least one
    pub categories: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Overdue is computed at read time, never stored
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Approved && self.due_date < now
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(category))
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub categories: Vec<String>,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
}

/// Trims category names, drops blanks and duplicates, keeps first-seen order
pub fn normalize_categories<I, S>(categories: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for category in categories {
        let trimmed = category.as_ref().trim();
        if trimmed.is_empty() || out.iter().any(|c| c.eq_ignore_ascii_case(trimmed)) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// Optional list filters, combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskFilter {
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<Uuid>,
    pub overdue: Option<bool>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if let Some(category) = &self.category {
            if !task.has_category(category) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(assignee) = self.assignee {
            if task.assigned_to != assignee {
                return false;
            }
        }
        if let Some(overdue) = self.overdue {
            if task.is_overdue(now) != overdue {
                return false;
            }
        }
        true
    }
}

/// Visibility scope derived from the caller's permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    /// Every task
    All,

    /// Tasks assigned to one of these users
    Assignees(Vec<Uuid>),
}

impl TaskScope {
    pub fn covers(&self, task: &Task) -> bool {
        self.covers_assignee(task.assigned_to)
    }

    pub fn covers_assignee(&self, user_id: Uuid) -> bool {
        match self {
            TaskScope::All => true,
            TaskScope::Assignees(ids) => ids.contains(&user_id),
        }
    }
}

/// A scoped, filtered list request handed to the task store
#[derive(Debug, Clone)]
pub struct TaskQuery {
    pub scope: TaskScope,
    pub filter: TaskFilter,
}

impl TaskQuery {
    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        self.scope.covers(task) && self.filter.matches(task, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(status: TaskStatus, due_in: Duration) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "Prepare budget report".to_string(),
            description: None,
            due_date: now + due_in,
            priority: Priority::High,
            status,
            assigned_to: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            categories: vec!["Finance".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_valid_transitions() {
        use TaskStatus::*;
        assert!(Todo.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Approved));
        assert!(Submitted.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(InProgress));
        assert!(Rejected.can_transition_to(Submitted));
    }

    #[test]
    fn test_invalid_transitions() {
        use TaskStatus::*;
        assert!(!Todo.can_transition_to(Submitted));
        assert!(!Submitted.can_transition_to(Submitted));
        assert!(!InProgress.can_transition_to(Approved));
        assert!(!Todo.can_transition_to(Todo));
        for target in TaskStatus::ALL {
            assert!(!Approved.can_transition_to(target));
        }
    }

    #[test]
    fn test_terminal_and_review_outcomes() {
        assert!(TaskStatus::Approved.is_terminal());
        assert!(!TaskStatus::Rejected.is_terminal());
        assert!(TaskStatus::Rejected.is_review_outcome());
        assert!(!TaskStatus::Submitted.is_review_outcome());
    }

    #[test]
    fn test_is_overdue() {
        let now = Utc::now();
        assert!(task(TaskStatus::InProgress, Duration::days(-1)).is_overdue(now));
        assert!(!task(TaskStatus::Approved, Duration::days(-1)).is_overdue(now));
        assert!(!task(TaskStatus::Todo, Duration::days(1)).is_overdue(now));
    }

    #[test]
    fn test_normalize_categories() {
        let cats = normalize_categories([" Finance ", "", "finance", "IT", "  "]);
        assert_eq!(cats, vec!["Finance", "IT"]);
        assert!(normalize_categories(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_filter_matches() {
        let now = Utc::now();
        let t = task(TaskStatus::InProgress, Duration::days(-2));

        assert!(TaskFilter::default().matches(&t, now));
        assert!(TaskFilter {
            category: Some("finance".to_string()),
            overdue: Some(true),
            ..Default::default()
        }
        .matches(&t, now));
        assert!(!TaskFilter {
            status: Some(TaskStatus::Todo),
            ..Default::default()
        }
        .matches(&t, now));
        assert!(!TaskFilter {
            assignee: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .matches(&t, now));
    }

    #[test]
    fn test_scope_covers() {
        let t = task(TaskStatus::Todo, Duration::days(1));
        assert!(TaskScope::All.covers(&t));
        assert!(TaskScope::Assignees(vec![t.assigned_to]).covers(&t));
        assert!(!TaskScope::Assignees(vec![Uuid::new_v4()]).covers(&t));
    }
}
