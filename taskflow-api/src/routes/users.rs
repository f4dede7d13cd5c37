/// User management endpoints
///
/// All endpoints require `USER_MANAGE`; the directory service enforces it.
///
/// # Endpoints
///
/// - `GET /api/v1/getusers` - List users
/// - `POST /api/v1/adduser` - Create a user
/// - `PUT /api/v1/updateuser/:user_id` - Edit a user
/// - `DELETE /api/v1/deleteuser/:user_id` - Delete, or deactivate if referenced

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidatedJson},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskflow_shared::{
    auth::context::AuthContext,
    models::{
        permission::PermissionSet,
        user::{User, UserStatus},
    },
    services::directory::{DeleteOutcome, NewUser, UserChanges},
};
use uuid::Uuid;
use validator::Validate;

/// Create/update user request
///
/// `role` is the single-role form the user dialog sends; `roles` wins when
/// both are present.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: Option<String>,

    pub password: Option<String>,

    pub confirm_password: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 100, message = "Department must be at most 100 characters"))]
    pub department: Option<String>,

    pub role: Option<String>,

    pub roles: Option<Vec<String>>,

    pub status: Option<UserStatus>,

    pub permissions: Option<PermissionSet>,
}

impl UserRequest {
    fn role_names(&self) -> Option<Vec<String>> {
        self.roles
            .clone()
            .or_else(|| self.role.clone().map(|r| vec![r]))
            .map(|roles| {
                roles
                    .into_iter()
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect()
            })
    }
}

/// Delete response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    pub user_id: Uuid,

    /// `DELETED`, or `DEACTIVATED` when tasks or comments still reference
    /// the user
    pub outcome: &'static str,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.services.directory.list_users(&auth).await?))
}

/// Create a user
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/adduser
/// Content-Type: application/json
///
/// {
///   "username": "jdoe",
///   "password": "SecureP@ss123",
///   "confirmPassword": "SecureP@ss123",
///   "email": "jdoe@example.com",
///   "department": "Engineering",
///   "role": "DIRECTOR"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: missing fields, weak or mismatched password,
///   unknown role
/// - `403 Forbidden`: missing `USER_MANAGE`
/// - `409 Conflict`: username taken
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<UserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let roles = req.role_names().unwrap_or_default();
    let username = req
        .username
        .ok_or_else(|| ApiError::invalid_field("username", "Username is required"))?;
    let email = req
        .email
        .ok_or_else(|| ApiError::invalid_field("email", "Email is required"))?;
    let password = req
        .password
        .ok_or_else(|| ApiError::invalid_field("password", "Password is required"))?;

    let user = state
        .services
        .directory
        .create_user(
            &auth,
            NewUser {
                username,
                email,
                department: req.department,
                status: req.status,
                roles,
                permissions: req.permissions.unwrap_or_default(),
                password,
                confirm_password: req.confirm_password,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Edit a user
///
/// Omitted fields keep their value; an empty `password` leaves the
/// password unchanged. Usernames cannot be changed.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UserRequest>,
) -> ApiResult<Json<User>> {
    let directory = &state.services.directory;

    if let Some(username) = req.username.as_deref() {
        let current = directory.get_user(&auth, user_id).await?;
        if username.trim() != current.username {
            return Err(ApiError::invalid_field(
                "username",
                "Username cannot be changed",
            ));
        }
    }

    let roles = req.role_names();
    let user = directory
        .update_user(
            &auth,
            user_id,
            UserChanges {
                email: req.email,
                department: req.department,
                status: req.status,
                roles,
                permissions: req.permissions,
                password: req.password,
                confirm_password: req.confirm_password,
            },
        )
        .await?;

    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let outcome = state.services.directory.delete_user(&auth, user_id).await?;

    Ok(Json(DeleteUserResponse {
        user_id,
        outcome: match outcome {
            DeleteOutcome::Deleted => "DELETED",
            DeleteOutcome::Deactivated => "DEACTIVATED",
        },
    }))
}
