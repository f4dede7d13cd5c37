/// Bearer-token authentication
///
/// Validates the access token, then re-reads the user and their roles so
/// the [`AuthContext`] placed in request extensions always carries the
/// current permission set. The role snapshot inside the token is ignored.
/// Deactivated users are rejected even while their tokens are unexpired.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use taskflow_shared::{
    auth::context::{bearer_token, AuthContext, AuthError},
    services::WorkflowError,
};

use crate::{app::AppState, error::ApiError};

/// Injects [`AuthContext`] into the request or answers 401
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header_value)?;

    let claims = state.tokens.validate_access(token)?;

    let auth = state
        .services
        .directory
        .resolve(claims.sub)
        .await
        .map_err(|err| match err {
            WorkflowError::Unauthenticated => {
                tracing::warn!(user_id = %claims.sub, "Token rejected for inactive or unknown user");
                ApiError::from(AuthError::InactiveAccount)
            }
            other => ApiError::from(other),
        })?;

    req.extensions_mut().insert::<AuthContext>(auth);

    Ok(next.run(req).await)
}
