/// Report endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/reports/summary` - Task counts, requires `REPORT_VIEW`
///
/// # Response
///
/// ```json
/// {
///   "totalTasks": 12,
///   "completedTasks": 5,
///   "pendingTasks": 7,
///   "overdueTasks": 2,
///   "byStatus": { "APPROVED": 5, "IN_PROGRESS": 3, "REJECTED": 0, "SUBMITTED": 1, "TODO": 3 }
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use taskflow_shared::{auth::context::AuthContext, services::reports::TaskSummary};

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskSummary>> {
    Ok(Json(state.services.reports.summary(&auth).await?))
}
