/// Role management endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/roles` - Roles with their permission sets
/// - `PUT /api/v1/roles/:name/permissions` - Replace a role's permissions
///
/// Both require `ROLE_MANAGE`. Holders of an edited role see the new
/// permissions on their next request.

use crate::{
    app::AppState,
    error::{ApiResult, ValidatedJson},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use taskflow_shared::{
    auth::context::AuthContext,
    models::{permission::PermissionSet, role::Role},
};
use validator::Validate;

/// Permission replacement request
///
/// Unknown permission names fail deserialization with `400`.
#[derive(Debug, Deserialize, Validate)]
pub struct SetPermissionsRequest {
    pub permissions: PermissionSet,
}

pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(state.services.directory.list_roles(&auth).await?))
}

pub async fn set_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(name): Path<String>,
    ValidatedJson(req): ValidatedJson<SetPermissionsRequest>,
) -> ApiResult<Json<Role>> {
    let role = state
        .services
        .directory
        .set_role_permissions(&auth, &name, req.permissions)
        .await?;
    Ok(Json(role))
}
