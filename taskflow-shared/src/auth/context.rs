/// Authenticated principal
///
/// The API's auth middleware validates the bearer token, then re-reads the
/// user and their roles from the directory and builds an [`AuthContext`]. The
/// context is inserted into request extensions and handed to every service
/// call. Its permission set is always the current one; the role snapshot in
/// the token is ignored.
///
/// # Example
///
/// ```
/// use taskflow_shared::auth::context::bearer_token;
///
/// assert_eq!(bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
/// assert!(bearer_token(Some("Basic dXNlcjpwYXNz")).is_err());
/// assert!(bearer_token(None).is_err());
/// ```

use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    permission::{Permission, PermissionSet},
    user::User,
};

/// The actor behind a request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: Uuid,

    pub username: String,

    pub email: String,

    pub department: Option<String>,

    /// Role names in assignment order
    pub roles: Vec<String>,

    /// Highest-precedence role, recorded on comments
    pub primary_role: Option<String>,

    /// Effective permissions: role grants plus direct grants
    pub permissions: PermissionSet,
}

impl AuthContext {
    /// Builds a context from a freshly loaded user and their resolved
    /// permission set
    pub fn from_user(user: &User, permissions: PermissionSet) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            department: user.department.clone(),
            roles: user.roles.clone(),
            primary_role: user.primary_role().map(str::to_string),
            permissions,
        }
    }

    /// OR semantics; an empty requirement always passes
    pub fn has_any(&self, required: &[Permission]) -> bool {
        self.permissions.has_any(required)
    }

    pub fn is_user(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// Why a request carried no usable credentials
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid authorization header: {0}")]
    InvalidFormat(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token is valid but the account is gone or inactive
    #[error("Account is not active")]
    InactiveAccount,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Empty bearer token".to_string()));
    }

    Ok(token)
}
