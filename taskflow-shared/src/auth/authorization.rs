/// Permission checks
///
/// Authorization is a flat permission model: a user's effective set is the
/// union of their roles' permissions and their direct grants, and a check
/// passes when the set intersects the required list (OR semantics). An empty
/// requirement always passes.
///
/// Ownership checks ("the caller must be the assignee", "the caller must be
/// the recipient") are separate from permissions and use
/// [`require_ownership`].
///
/// # Example
///
/// ```
/// use taskflow_shared::auth::authorization::has_permission;
/// use taskflow_shared::models::permission::{Permission, PermissionSet};
///
/// let perms: PermissionSet = [Permission::TaskViewDepartment].into_iter().collect();
/// assert!(has_permission(&perms, &[Permission::TaskViewAll, Permission::TaskViewDepartment]));
/// assert!(!has_permission(&perms, &[Permission::TaskApprove]));
/// assert!(has_permission(&perms, &[]));
/// ```

use uuid::Uuid;

use super::context::AuthContext;
use crate::models::permission::{Permission, PermissionSet};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// None of the required permissions is held
    #[error("Missing permission: requires one of {}", format_permissions(.required))]
    MissingPermission { required: Vec<Permission> },

    /// The caller is not the user the resource belongs to
    #[error("Not authorized to act on this resource")]
    NotOwner,
}

fn format_permissions(required: &[Permission]) -> String {
    required
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// True if `required` is empty or `permissions` holds at least one of them
pub fn has_permission(permissions: &PermissionSet, required: &[Permission]) -> bool {
    permissions.has_any(required)
}

/// Fails with [`AuthzError::MissingPermission`] unless the caller holds one
/// of `required`
pub fn require_any(auth: &AuthContext, required: &[Permission]) -> Result<(), AuthzError> {
    if has_permission(&auth.permissions, required) {
        return Ok(());
    }

    Err(AuthzError::MissingPermission {
        required: required.to_vec(),
    })
}

/// Fails with [`AuthzError::NotOwner`] unless the caller is `owner_id`
pub fn require_ownership(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.is_user(owner_id) {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

/// Passes for the owner, or for anyone holding one of `required`
pub fn require_self_or_any(
    auth: &AuthContext,
    owner_id: Uuid,
    required: &[Permission],
) -> Result<(), AuthzError> {
    if auth.is_user(owner_id) {
        return Ok(());
    }
    require_any(auth, required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{User, UserStatus};
    use chrono::Utc;

    fn ctx(perms: &[Permission]) -> AuthContext {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "erin".to_string(),
            email: "erin@example.com".to_string(),
            department: None,
            status: UserStatus::Active,
            roles: vec![],
            permissions: PermissionSet::new(),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        };
        AuthContext::from_user(&user, perms.iter().copied().collect())
    }

    #[test]
    fn test_require_any_or_semantics() {
        let auth = ctx(&[Permission::TaskCreate]);

        assert!(require_any(&auth, &[Permission::TaskCreate]).is_ok());
        assert!(require_any(&auth, &[Permission::TaskAssign, Permission::TaskCreate]).is_ok());
        assert!(require_any(&auth, &[]).is_ok());
        assert_eq!(
            require_any(&auth, &[Permission::UserManage]),
            Err(AuthzError::MissingPermission {
                required: vec![Permission::UserManage]
            })
        );
    }

    #[test]
    fn test_require_ownership() {
        let auth = ctx(&[]);
        assert!(require_ownership(&auth, auth.user_id).is_ok());
        assert_eq!(require_ownership(&auth, Uuid::new_v4()), Err(AuthzError::NotOwner));
    }

    #[test]
    fn test_require_self_or_any() {
        let plain = ctx(&[]);
        let viewer = ctx(&[Permission::TaskViewAll]);
        let other = Uuid::new_v4();

        assert!(require_self_or_any(&plain, plain.user_id, &[Permission::TaskViewAll]).is_ok());
        assert!(require_self_or_any(&plain, other, &[Permission::TaskViewAll]).is_err());
        assert!(require_self_or_any(&viewer, other, &[Permission::TaskViewAll]).is_ok());
    }

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::MissingPermission {
            required: vec![Permission::TaskViewAll, Permission::TaskViewDepartment],
        };
        assert_eq!(
            err.to_string(),
            "Missing permission: requires one of TASK_VIEW_ALL, TASK_VIEW_DEPARTMENT"
        );
    }
}
