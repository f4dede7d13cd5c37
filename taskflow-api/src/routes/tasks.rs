/// Task endpoints
///
/// Thin adapters over [`taskflow_shared::services::engine::TaskEngine`]: every
/// permission, visibility and transition check happens in the engine.
///
/// # Endpoints
///
/// - `GET  /api/v1/task/getall` - Scoped task list
/// - `GET  /api/v1/task/mytask/:user_id` - Tasks assigned to a user
/// - `GET  /api/v1/task/:task_id` - Single task
/// - `POST /api/v1/task/add` - Create a task
/// - `PUT  /api/v1/task/accept/:task_id` - TODO to IN_PROGRESS
/// - `POST /api/v1/task/submit/:task_id` - Submit, approve or reject
/// - `PUT  /api/v1/task/status/:task_id` - Manual status change
/// - `PUT  /api/v1/task/duedate/:task_id` - Move the deadline
/// - `PUT  /api/v1/task/assign/:task_id` - Reassign
/// - `GET|POST /api/v1/task/:task_id/comments` - Audit trail

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidatedJson},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskflow_shared::{
    auth::context::AuthContext,
    models::{
        comment::Comment,
        task::{Priority, Task, TaskFilter, TaskStatus},
        user::UserSummary,
    },
    services::engine::{NewTask, ReviewDecision},
};
use uuid::Uuid;
use validator::Validate;

/// Create task request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub due_date: DateTime<Utc>,

    #[serde(default)]
    pub priority: Priority,

    #[validate(length(min = 1, message = "At least one category is required"))]
    pub categories: Vec<String>,

    pub assigned_to: Uuid,
}

/// Submit/review request
///
/// `status` defaults to `SUBMITTED`; `APPROVED` and `REJECTED` record a
/// review verdict instead.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub comment: String,

    pub status: Option<TaskStatus>,

    /// When present, must be the caller
    pub comment_by_id: Option<Uuid>,
}

/// Manual status change request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: TaskStatus,

    pub comment: Option<String>,
}

/// Due date change request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DueDateRequest {
    pub due_date: DateTime<Utc>,

    pub comment: Option<String>,
}

/// Reassignment request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub assigned_to: Uuid,

    pub comment: Option<String>,
}

/// Comment request
#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(max = 5000, message = "Comment must be at most 5000 characters"))]
    pub comment: String,
}

/// User reference embedded in a task; `username` is `None` once the user
/// has been deleted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: Uuid,
    pub username: Option<String>,
}

/// Task as returned by every task endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub categories: Vec<String>,
    pub assigned_to: UserRef,
    pub created_by: UserRef,
    /// Computed at response time
    pub overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskView {
    fn new(task: Task, names: &HashMap<Uuid, UserSummary>, now: DateTime<Utc>) -> Self {
        let user_ref = |id: Uuid| UserRef {
            user_id: id,
            username: names.get(&id).map(|s| s.username.clone()),
        };

        Self {
            overdue: task.is_overdue(now),
            assigned_to: user_ref(task.assigned_to),
            created_by: user_ref(task.created_by),
            id: task.id,
            title: task.title,
            description: task.description,
            due_date: task.due_date,
            priority: task.priority,
            status: task.status,
            categories: task.categories,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

async fn render_all(state: &AppState, tasks: Vec<Task>) -> ApiResult<Vec<TaskView>> {
    let ids: Vec<Uuid> = tasks
        .iter()
        .flat_map(|t| [t.assigned_to, t.created_by])
        .collect();
    let names = state.services.directory.summaries(ids).await?;
    let now = Utc::now();
    Ok(tasks
        .into_iter()
        .map(|task| TaskView::new(task, &names, now))
        .collect())
}

async fn render(state: &AppState, task: Task) -> ApiResult<Json<TaskView>> {
    let mut views = render_all(state, vec![task]).await?;
    views
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::InternalError("Rendered task went missing".to_string()))
}

/// Scoped task list
///
/// # Query Parameters
///
/// `category`, `status`, `assignee`, `overdue` (all optional, combined with
/// AND).
///
/// # Errors
///
/// - `403 Forbidden`: neither `TASK_VIEW_ALL` nor `TASK_VIEW_DEPARTMENT`
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let tasks = state.services.engine.list_tasks(&auth, filter).await?;
    Ok(Json(render_all(&state, tasks).await?))
}

/// Tasks assigned to `user_id`
pub async fn list_user_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let tasks = state
        .services
        .engine
        .list_for_user(&auth, user_id, filter)
        .await?;
    Ok(Json(render_all(&state, tasks).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let task = state.services.engine.get_task(&auth, task_id).await?;
    render(&state, task).await
}

/// Create a task
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/task/add
/// Content-Type: application/json
///
/// {
///   "title": "Quarterly report",
///   "description": "Numbers for Q3",
///   "dueDate": "2025-10-01T17:00:00Z",
///   "priority": "HIGH",
///   "categories": ["Finance"],
///   "assignedTo": "uuid"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: blank title, no categories, unknown or inactive
///   assignee
/// - `403 Forbidden`: missing `TASK_CREATE`
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    let task = state
        .services
        .engine
        .create_task(
            &auth,
            NewTask {
                title: req.title,
                description: req.description,
                due_date: req.due_date,
                priority: req.priority,
                categories: req.categories,
                assigned_to: req.assigned_to,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, render(&state, task).await?))
}

pub async fn accept_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let task = state.services.engine.accept(&auth, task_id).await?;
    render(&state, task).await
}

/// Submit work, or record a review verdict
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/task/submit/:task_id
///
/// { "comment": "done" }                         // submit
/// { "comment": "redo", "status": "REJECTED" }   // reject
/// { "status": "APPROVED" }                      // approve
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: missing comment on submit or reject, or a status
///   other than SUBMITTED/APPROVED/REJECTED
/// - `403 Forbidden`: not the assignee (submit), missing `TASK_APPROVE`
///   (review), or `commentById` names someone else
/// - `409 Conflict`: wrong source status or a concurrent change
pub async fn submit_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SubmitRequest>,
) -> ApiResult<Json<TaskView>> {
    if let Some(author) = req.comment_by_id {
        if !auth.is_user(author) {
            return Err(ApiError::Forbidden(
                "commentById must be the authenticated user".to_string(),
            ));
        }
    }

    let engine = &state.services.engine;
    let task = match req.status.unwrap_or(TaskStatus::Submitted) {
        TaskStatus::Submitted => engine.submit(&auth, task_id, &req.comment).await?,
        TaskStatus::Approved => {
            let comment = Some(req.comment.as_str()).filter(|c| !c.trim().is_empty());
            engine
                .review(&auth, task_id, ReviewDecision::Approve, comment)
                .await?
        }
        TaskStatus::Rejected => {
            engine
                .review(&auth, task_id, ReviewDecision::Reject, Some(&req.comment))
                .await?
        }
        _ => {
            return Err(ApiError::invalid_field(
                "status",
                "must be SUBMITTED, APPROVED or REJECTED",
            ));
        }
    };

    render(&state, task).await
}

/// Manual status change along the lattice
///
/// Review outcomes (APPROVED, REJECTED) go through the submit endpoint.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> ApiResult<Json<TaskView>> {
    let task = state
        .services
        .engine
        .update_status(&auth, task_id, req.status, req.comment.as_deref())
        .await?;
    render(&state, task).await
}

pub async fn update_due_date(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<DueDateRequest>,
) -> ApiResult<Json<TaskView>> {
    let task = state
        .services
        .engine
        .set_due_date(&auth, task_id, req.due_date, req.comment.as_deref())
        .await?;
    render(&state, task).await
}

pub async fn reassign_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AssignRequest>,
) -> ApiResult<Json<TaskView>> {
    let task = state
        .services
        .engine
        .reassign(&auth, task_id, req.assigned_to, req.comment.as_deref())
        .await?;
    render(&state, task).await
}

/// Comments, oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(
        state.services.engine.list_comments(&auth, task_id).await?,
    ))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .services
        .engine
        .add_comment(&auth, task_id, &req.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
