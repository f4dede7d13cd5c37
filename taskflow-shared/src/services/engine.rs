/// Task lifecycle engine
///
/// Every state change goes through the same steps:
///
/// 1. load the task and check the actor's guard (permission or ownership)
/// 2. validate the request body (comments, categories)
/// 3. re-read the stored status (and, for assignee-only steps, the
///    assignee), check the lattice edge, then compare-and-set the new status
/// 4. append the audit comment and fan out notifications
///
/// Steps 1-3 fail without side effects. Step 4 runs only after the status
/// write succeeded; its failures are logged and never undo the transition.
///
/// # Transitions
///
/// | Operation     | From                  | Guard                |
/// |---------------|-----------------------|----------------------|
/// | accept        | TODO                  | caller is assignee   |
/// | submit        | IN_PROGRESS, REJECTED | caller is assignee   |
/// | approve       | SUBMITTED             | `TASK_APPROVE`       |
/// | reject        | SUBMITTED             | `TASK_APPROVE`       |
/// | update status | any non-review edge   | `TASK_UPDATE_STATUS` |
///
/// A lost compare-and-set is reported as [`WorkflowError::Conflict`] and is
/// never retried.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    audit::AuditTrail,
    directory::Directory,
    error::{WorkflowError, WorkflowResult},
    notifications::Dispatcher,
};
use crate::auth::{
    authorization::{require_any, require_ownership},
    context::AuthContext,
};
use crate::models::{
    comment::Comment,
    permission::Permission,
    task::{
        normalize_categories, CreateTask, Priority, Task, TaskFilter, TaskQuery, TaskScope,
        TaskStatus,
    },
};
use crate::store::{StoreError, TaskStore};

/// Fields accepted when creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub categories: Vec<String>,
    pub assigned_to: Uuid,
}

/// Reviewer verdict on a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn target(&self) -> TaskStatus {
        match self {
            ReviewDecision::Approve => TaskStatus::Approved,
            ReviewDecision::Reject => TaskStatus::Rejected,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approved",
            ReviewDecision::Reject => "rejected",
        }
    }
}

/// Drives tasks through the status lattice
#[derive(Clone)]
pub struct TaskEngine {
    tasks: Arc<dyn TaskStore>,
    directory: Directory,
    audit: AuditTrail,
    dispatcher: Dispatcher,
}

impl TaskEngine {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        directory: Directory,
        audit: AuditTrail,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            tasks,
            directory,
            audit,
            dispatcher,
        }
    }

    /// Creates a task in `TODO` and notifies the assignee
    ///
    /// # Errors
    ///
    /// `Forbidden` without `TASK_CREATE`; `Validation` for a blank title, no
    /// categories, or an unknown or inactive assignee. Nothing is stored on
    /// error.
    pub async fn create_task(&self, actor: &AuthContext, new_task: NewTask) -> WorkflowResult<Task> {
        require_any(actor, &[Permission::TaskCreate])?;

        let title = new_task.title.trim().to_string();
        if title.is_empty() {
            return Err(WorkflowError::validation("title", "must not be empty"));
        }

        let categories = normalize_categories(&new_task.categories);
        if categories.is_empty() {
            return Err(WorkflowError::validation(
                "categories",
                "at least one category is required",
            ));
        }

        self.ensure_assignable(new_task.assigned_to).await?;

        let task = self
            .tasks
            .insert_task(CreateTask {
                title,
                description: new_task
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
                due_date: new_task.due_date,
                priority: new_task.priority,
                categories,
                assigned_to: new_task.assigned_to,
                created_by: actor.user_id,
            })
            .await?;

        info!(
            task_id = %task.id,
            assigned_to = %task.assigned_to,
            actor_id = %actor.user_id,
            "Task created"
        );

        if !actor.is_user(task.assigned_to) {
            self.dispatcher
                .notify_best_effort(
                    task.assigned_to,
                    format!("New task assigned to you: \"{}\"", task.title),
                    Some(task.id),
                )
                .await;
        }

        Ok(task)
    }

    /// Visibility scope from the caller's view permissions
    ///
    /// `TASK_VIEW_ALL` wins over `TASK_VIEW_DEPARTMENT`, which wins over
    /// `TASK_VIEW_ASSIGNED`.
    pub async fn scope_for(&self, actor: &AuthContext) -> WorkflowResult<TaskScope> {
        if actor.has_any(&[Permission::TaskViewAll]) {
            return Ok(TaskScope::All);
        }

        if actor.has_any(&[Permission::TaskViewDepartment]) {
            let mut ids = match &actor.department {
                Some(department) => self.directory.department_member_ids(department).await?,
                None => Vec::new(),
            };
            if !ids.contains(&actor.user_id) {
                ids.push(actor.user_id);
            }
            return Ok(TaskScope::Assignees(ids));
        }

        if actor.has_any(&[Permission::TaskViewAssigned]) {
            return Ok(TaskScope::Assignees(vec![actor.user_id]));
        }

        Err(WorkflowError::Forbidden(
            "No permission to view tasks".to_string(),
        ))
    }

    pub async fn get_task(&self, actor: &AuthContext, task_id: Uuid) -> WorkflowResult<Task> {
        let task = self.load(task_id).await?;
        self.ensure_visible(actor, &task).await?;
        Ok(task)
    }

    /// Organization or department listing, newest first
    pub async fn list_tasks(
        &self,
        actor: &AuthContext,
        filter: TaskFilter,
    ) -> WorkflowResult<Vec<Task>> {
        require_any(actor, &[Permission::TaskViewAll, Permission::TaskViewDepartment])?;
        let scope = self.scope_for(actor).await?;
        Ok(self
            .tasks
            .list_tasks(&TaskQuery { scope, filter }, Utc::now())
            .await?)
    }

    /// Tasks assigned to `user_id`; allowed for that user or for a caller
    /// whose scope covers them
    pub async fn list_for_user(
        &self,
        actor: &AuthContext,
        user_id: Uuid,
        filter: TaskFilter,
    ) -> WorkflowResult<Vec<Task>> {
        if !actor.is_user(user_id) && !self.scope_for(actor).await?.covers_assignee(user_id) {
            return Err(WorkflowError::Forbidden(
                "User is outside your visibility scope".to_string(),
            ));
        }

        let query = TaskQuery {
            scope: TaskScope::Assignees(vec![user_id]),
            filter,
        };
        Ok(self.tasks.list_tasks(&query, Utc::now()).await?)
    }

    /// TODO → IN_PROGRESS, assignee only
    pub async fn accept(&self, actor: &AuthContext, task_id: Uuid) -> WorkflowResult<Task> {
        let task = self.load(task_id).await?;
        require_ownership(actor, task.assigned_to)?;

        let task = self
            .transition(task_id, TaskStatus::InProgress, Some(actor))
            .await?;
        info!(task_id = %task_id, actor_id = %actor.user_id, "Task accepted");
        Ok(task)
    }

    /// IN_PROGRESS or REJECTED → SUBMITTED with a mandatory comment;
    /// notifies every active reviewer except the submitter
    pub async fn submit(
        &self,
        actor: &AuthContext,
        task_id: Uuid,
        comment: &str,
    ) -> WorkflowResult<Task> {
        let task = self.load(task_id).await?;
        require_ownership(actor, task.assigned_to)?;
        let comment = AuditTrail::validate_body(comment)?;

        let task = self
            .transition(task_id, TaskStatus::Submitted, Some(actor))
            .await?;
        info!(task_id = %task_id, actor_id = %actor.user_id, "Task submitted");

        self.record_comment(&task, actor, Some(&comment)).await;

        match self.directory.users_with_permission(Permission::TaskApprove).await {
            Ok(reviewers) => {
                let message = format!(
                    "\"{}\" was submitted for review by {}",
                    task.title, actor.username
                );
                for reviewer in reviewers.iter().filter(|r| r.id != actor.user_id) {
                    self.dispatcher
                        .notify_best_effort(reviewer.id, message.clone(), Some(task.id))
                        .await;
                }
            }
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "Failed to resolve reviewers");
            }
        }

        Ok(task)
    }

    /// SUBMITTED → APPROVED or REJECTED
    ///
    /// A rejection needs a comment; an approval comment is optional.
    pub async fn review(
        &self,
        actor: &AuthContext,
        task_id: Uuid,
        decision: ReviewDecision,
        comment: Option<&str>,
    ) -> WorkflowResult<Task> {
        require_any(actor, &[Permission::TaskApprove])?;
        self.load(task_id).await?;

        let comment = match decision {
            ReviewDecision::Reject => Some(AuditTrail::validate_body(comment.unwrap_or_default())?),
            ReviewDecision::Approve => optional_comment(comment),
        };

        let task = self.transition(task_id, decision.target(), None).await?;
        info!(
            task_id = %task_id,
            actor_id = %actor.user_id,
            decision = decision.verb(),
            "Task reviewed"
        );

        self.record_comment(&task, actor, comment.as_deref()).await;
        self.notify_assignee(
            &task,
            actor,
            format!(
                "Your task \"{}\" was {} by {}",
                task.title,
                decision.verb(),
                actor.username
            ),
        )
        .await;

        Ok(task)
    }

    /// Administrative status change along any lattice edge except the
    /// review outcomes
    pub async fn update_status(
        &self,
        actor: &AuthContext,
        task_id: Uuid,
        status: TaskStatus,
        comment: Option<&str>,
    ) -> WorkflowResult<Task> {
        require_any(actor, &[Permission::TaskUpdateStatus])?;
        let current = self.load(task_id).await?;

        if status.is_review_outcome() {
            warn!(task_id = %task_id, to = %status, "Review outcome requested via status update");
            return Err(WorkflowError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let comment = optional_comment(comment);
        let task = self.transition(task_id, status, None).await?;
        info!(task_id = %task_id, actor_id = %actor.user_id, status = %status, "Task status updated");

        self.record_comment(&task, actor, comment.as_deref()).await;
        self.notify_assignee(
            &task,
            actor,
            format!("Task \"{}\" moved to {} by {}", task.title, status, actor.username),
        )
        .await;

        Ok(task)
    }

    pub async fn set_due_date(
        &self,
        actor: &AuthContext,
        task_id: Uuid,
        due_date: DateTime<Utc>,
        comment: Option<&str>,
    ) -> WorkflowResult<Task> {
        require_any(actor, &[Permission::TaskSetDuedate])?;
        let current = self.load(task_id).await?;
        ensure_open(&current)?;
        let comment = optional_comment(comment);

        let task = self
            .tasks
            .update_due_date(task_id, due_date)
            .await
            .map_err(|err| closed_meanwhile(&current, err))?;
        info!(task_id = %task_id, due_date = %due_date, "Task due date changed");

        self.record_comment(&task, actor, comment.as_deref()).await;
        self.notify_assignee(
            &task,
            actor,
            format!(
                "Due date for \"{}\" changed to {} by {}",
                task.title,
                due_date.format("%Y-%m-%d"),
                actor.username
            ),
        )
        .await;

        Ok(task)
    }

    /// Moves a task to another active user and notifies them
    pub async fn reassign(
        &self,
        actor: &AuthContext,
        task_id: Uuid,
        assignee: Uuid,
        comment: Option<&str>,
    ) -> WorkflowResult<Task> {
        require_any(actor, &[Permission::TaskAssign])?;
        let current = self.load(task_id).await?;
        ensure_open(&current)?;
        self.ensure_assignable(assignee).await?;
        let comment = optional_comment(comment);

        if current.assigned_to == assignee {
            return Ok(current);
        }

        let task = self
            .tasks
            .update_assignee(task_id, assignee)
            .await
            .map_err(|err| closed_meanwhile(&current, err))?;
        info!(
            task_id = %task_id,
            from = %current.assigned_to,
            to = %assignee,
            "Task reassigned"
        );

        self.record_comment(&task, actor, comment.as_deref()).await;
        self.notify_assignee(
            &task,
            actor,
            format!("Task \"{}\" was assigned to you by {}", task.title, actor.username),
        )
        .await;

        Ok(task)
    }

    /// Free-form comment on a visible task
    pub async fn add_comment(
        &self,
        actor: &AuthContext,
        task_id: Uuid,
        body: &str,
    ) -> WorkflowResult<Comment> {
        require_any(actor, &[Permission::TaskComment])?;
        let task = self.get_task(actor, task_id).await?;
        self.audit.append(task.id, Some(actor), body).await
    }

    pub async fn list_comments(
        &self,
        actor: &AuthContext,
        task_id: Uuid,
    ) -> WorkflowResult<Vec<Comment>> {
        let task = self.get_task(actor, task_id).await?;
        self.audit.list(task.id).await
    }

    async fn load(&self, task_id: Uuid) -> WorkflowResult<Task> {
        self.tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("task", task_id))
    }

    /// Re-reads the stored status and compare-and-sets `to`
    ///
    /// With `owner`, the task must also still be assigned to that caller,
    /// both on the re-read and at the write.
    async fn transition(
        &self,
        task_id: Uuid,
        to: TaskStatus,
        owner: Option<&AuthContext>,
    ) -> WorkflowResult<Task> {
        let current = self.load(task_id).await?;
        let from = current.status;

        if let Some(owner) = owner {
            require_ownership(owner, current.assigned_to)?;
        }

        if !from.can_transition_to(to) {
            warn!(task_id = %task_id, from = %from, to = %to, "Invalid transition");
            return Err(WorkflowError::InvalidTransition { from, to });
        }

        let assignee = owner.map(|o| o.user_id);
        match self
            .tasks
            .compare_and_set_status(task_id, from, to, assignee)
            .await
        {
            Ok(task) => Ok(task),
            Err(StoreError::Reassigned { actual }) => {
                warn!(task_id = %task_id, assigned_to = %actual, "Task reassigned before the status write");
                Err(WorkflowError::Forbidden(
                    "Task is assigned to another user".to_string(),
                ))
            }
            Err(StoreError::Conflict { actual }) => {
                warn!(task_id = %task_id, expected = %from, actual = %actual, "Status write lost a race");
                Err(WorkflowError::Conflict {
                    expected: from,
                    actual,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_visible(&self, actor: &AuthContext, task: &Task) -> WorkflowResult<()> {
        if actor.is_user(task.assigned_to) || self.scope_for(actor).await?.covers(task) {
            return Ok(());
        }
        Err(WorkflowError::Forbidden(
            "Task is outside your visibility scope".to_string(),
        ))
    }

    async fn ensure_assignable(&self, user_id: Uuid) -> WorkflowResult<()> {
        match self.directory.find_user(user_id).await {
            Ok(user) if user.is_active() => Ok(()),
            Ok(_) => Err(WorkflowError::validation("assignedTo", "user is inactive")),
            Err(WorkflowError::NotFound(_)) => {
                Err(WorkflowError::validation("assignedTo", "user does not exist"))
            }
            Err(err) => Err(err),
        }
    }

    async fn record_comment(&self, task: &Task, actor: &AuthContext, body: Option<&str>) {
        let Some(body) = body else { return };
        if let Err(err) = self.audit.append(task.id, Some(actor), body).await {
            warn!(task_id = %task.id, error = %err, "Failed to append audit comment");
        }
    }

    async fn notify_assignee(&self, task: &Task, actor: &AuthContext, message: String) {
        if actor.is_user(task.assigned_to) {
            return;
        }
        self.dispatcher
            .notify_best_effort(task.assigned_to, message, Some(task.id))
            .await;
    }
}

fn optional_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Maps a refused open-task write after `snapshot` passed `ensure_open`
fn closed_meanwhile(snapshot: &Task, err: StoreError) -> WorkflowError {
    match err {
        StoreError::Conflict { actual } => {
            warn!(task_id = %snapshot.id, actual = %actual, "Task closed before the write");
            WorkflowError::Conflict {
                expected: snapshot.status,
                actual,
            }
        }
        other => other.into(),
    }
}

fn ensure_open(task: &Task) -> WorkflowResult<()> {
    if task.status.is_terminal() {
        return Err(WorkflowError::validation("status", "approved tasks are closed"));
    }
    Ok(())
}
