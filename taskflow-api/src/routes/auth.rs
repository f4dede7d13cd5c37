/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/login` - Login and get tokens
/// - `POST /api/v1/refresh` - Exchange a refresh token for an access token
/// - `GET /api/v1/me` - Current principal with freshly resolved permissions

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidatedJson},
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use taskflow_shared::{auth::context::AuthContext, services::WorkflowError};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Access token
    pub token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    pub user: AuthContext,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token
    pub token: String,
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/login
/// Content-Type: application/json
///
/// {
///   "username": "jdoe",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "token": "eyJ...",
///   "refreshToken": "eyJ...",
///   "user": {
///     "userId": "uuid",
///     "username": "jdoe",
///     "email": "jdoe@example.com",
///     "department": "Engineering",
///     "roles": ["DIRECTOR"],
///     "primaryRole": "DIRECTOR",
///     "permissions": ["REPORT_VIEW", "TASK_CREATE"]
///   }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Unknown user, wrong password, or inactive account
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (user, auth) = state
        .services
        .directory
        .authenticate(req.username.trim(), &req.password)
        .await
        .map_err(|err| match err {
            WorkflowError::Unauthenticated => {
                ApiError::Unauthorized("Invalid username or password".to_string())
            }
            other => other.into(),
        })?;

    let token = state.tokens.issue_access(&user)?;
    let refresh_token = state.tokens.issue_refresh(&user)?;

    Ok(Json(LoginResponse {
        token,
        refresh_token,
        user: auth,
    }))
}

/// Token refresh endpoint
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/refresh
/// Content-Type: application/json
///
/// { "refreshToken": "eyJ..." }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token, or the account
///   is no longer active
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = state.tokens.validate_refresh(&req.refresh_token)?;

    let user = match state.services.directory.find_user(claims.sub).await {
        Ok(user) if user.is_active() => user,
        Ok(_) | Err(WorkflowError::NotFound(_)) => {
            return Err(ApiError::Unauthorized("Account is not active".to_string()));
        }
        Err(other) => return Err(other.into()),
    };

    let token = state.tokens.issue_access(&user)?;
    tracing::debug!(user_id = %user.id, "Access token refreshed");

    Ok(Json(RefreshResponse { token }))
}

/// Current principal
///
/// Permissions are resolved from the directory on this request, so role
/// edits show up here immediately.
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<AuthContext> {
    Json(auth)
}
