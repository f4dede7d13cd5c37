/// User and role directory
///
/// Owns credential checks, principal resolution, user management and role
/// permission edits. Effective permissions are recomputed from the store on
/// every call, so a role edit is visible to the very next request.

use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use crate::auth::{
    authorization::{require_any, require_self_or_any},
    context::AuthContext,
    password::{check_new_password, hash_password, verify_password},
};
use crate::models::{
    permission::{Permission, PermissionSet},
    role::{Role, ROLE_CEO, ROLE_NORMAL_USER},
    user::{CreateUser, UpdateUser, User, UserStatus, UserSummary},
};
use crate::store::Stores;

/// Fields accepted when creating a user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub department: Option<String>,
    pub status: Option<UserStatus>,
    /// Empty means `NORMAL_USER`
    pub roles: Vec<String>,
    pub permissions: PermissionSet,
    pub password: String,
    pub confirm_password: Option<String>,
}

/// Fields accepted when editing a user; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub department: Option<String>,
    pub status: Option<UserStatus>,
    pub roles: Option<Vec<String>>,
    pub permissions: Option<PermissionSet>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// What `delete_user` actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Row removed
    Deleted,
    /// Referenced by tasks or comments, so only set to `INACTIVE`
    Deactivated,
}

/// Directory service
#[derive(Clone)]
pub struct Directory {
    stores: Stores,
}

impl Directory {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Verifies a username/password pair
    ///
    /// Unknown users, wrong passwords and inactive accounts all yield
    /// [`WorkflowError::Unauthenticated`].
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> WorkflowResult<(User, AuthContext)> {
        let Some(user) = self.stores.directory.find_user_by_username(username).await? else {
            warn!(username = %username, "Login failed: unknown user");
            return Err(WorkflowError::Unauthenticated);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(WorkflowError::Unauthenticated);
        }

        if !user.is_active() {
            warn!(user_id = %user.id, "Login failed: account inactive");
            return Err(WorkflowError::Unauthenticated);
        }

        let permissions = self.effective_permissions(&user).await?;
        info!(user_id = %user.id, "User logged in");
        Ok((user.clone(), AuthContext::from_user(&user, permissions)))
    }

    /// Loads the current principal for a token subject
    pub async fn resolve(&self, user_id: Uuid) -> WorkflowResult<AuthContext> {
        let user = self
            .stores
            .directory
            .find_user(user_id)
            .await?
            .filter(User::is_active)
            .ok_or(WorkflowError::Unauthenticated)?;

        let permissions = self.effective_permissions(&user).await?;
        Ok(AuthContext::from_user(&user, permissions))
    }

    /// Union of the user's role permissions and direct grants
    pub async fn effective_permissions(&self, user: &User) -> WorkflowResult<PermissionSet> {
        let roles = self.stores.directory.list_roles().await?;
        Ok(permissions_for(user, &roles))
    }

    pub async fn list_users(&self, actor: &AuthContext) -> WorkflowResult<Vec<User>> {
        require_any(actor, &[Permission::UserManage])?;
        Ok(self.stores.directory.list_users().await?)
    }

    /// A user may always read their own record
    pub async fn get_user(&self, actor: &AuthContext, user_id: Uuid) -> WorkflowResult<User> {
        require_self_or_any(actor, user_id, &[Permission::UserManage])?;
        self.find_user(user_id).await
    }

    pub async fn create_user(&self, actor: &AuthContext, new_user: NewUser) -> WorkflowResult<User> {
        require_any(actor, &[Permission::UserManage])?;

        let username = new_user.username.trim().to_string();
        if username.is_empty() {
            return Err(WorkflowError::validation("username", "must not be empty"));
        }
        validate_email(&new_user.email)?;
        check_new_password(&new_user.password, new_user.confirm_password.as_deref())?;

        let roles = if new_user.roles.is_empty() {
            vec![ROLE_NORMAL_USER.to_string()]
        } else {
            new_user.roles
        };
        self.ensure_roles_exist(&roles).await?;

        let user = self
            .stores
            .directory
            .insert_user(CreateUser {
                username,
                email: new_user.email.trim().to_string(),
                department: clean_department(new_user.department),
                status: new_user.status.unwrap_or_default(),
                roles,
                permissions: new_user.permissions,
                password_hash: hash_password(&new_user.password)?,
            })
            .await?;

        info!(user_id = %user.id, actor_id = %actor.user_id, "User created");
        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &AuthContext,
        user_id: Uuid,
        changes: UserChanges,
    ) -> WorkflowResult<User> {
        require_any(actor, &[Permission::UserManage])?;
        self.find_user(user_id).await?;

        if let Some(email) = &changes.email {
            validate_email(email)?;
        }
        if let Some(roles) = &changes.roles {
            if roles.is_empty() {
                return Err(WorkflowError::validation("roles", "at least one role is required"));
            }
            self.ensure_roles_exist(roles).await?;
        }
        let password_hash = match &changes.password {
            Some(password) if !password.is_empty() => {
                check_new_password(password, changes.confirm_password.as_deref())?;
                Some(hash_password(password)?)
            }
            _ => None,
        };

        let user = self
            .stores
            .directory
            .update_user(
                user_id,
                UpdateUser {
                    email: changes.email.map(|e| e.trim().to_string()),
                    department: changes.department.map(|d| d.trim().to_string()),
                    status: changes.status,
                    roles: changes.roles,
                    permissions: changes.permissions,
                    password_hash,
                },
            )
            .await?;

        info!(user_id = %user.id, actor_id = %actor.user_id, "User updated");
        Ok(user)
    }

    /// Removes a user, or deactivates one that tasks or comments still
    /// reference
    pub async fn delete_user(
        &self,
        actor: &AuthContext,
        user_id: Uuid,
    ) -> WorkflowResult<DeleteOutcome> {
        require_any(actor, &[Permission::UserManage])?;
        if actor.is_user(user_id) {
            return Err(WorkflowError::validation("userId", "cannot delete your own account"));
        }
        self.find_user(user_id).await?;

        let references = self.stores.tasks.count_user_references(user_id).await?
            + self.stores.comments.count_comments_by_author(user_id).await?;

        if references > 0 {
            self.stores
                .directory
                .update_user(user_id, UpdateUser::status(UserStatus::Inactive))
                .await?;
            info!(user_id = %user_id, references, "User deactivated instead of deleted");
            return Ok(DeleteOutcome::Deactivated);
        }

        self.stores.directory.delete_user(user_id).await?;
        info!(user_id = %user_id, actor_id = %actor.user_id, "User deleted");
        Ok(DeleteOutcome::Deleted)
    }

    pub async fn list_roles(&self, actor: &AuthContext) -> WorkflowResult<Vec<Role>> {
        require_any(actor, &[Permission::RoleManage])?;
        Ok(self.stores.directory.list_roles().await?)
    }

    /// Replaces a role's permissions; holders see the change on their next
    /// request
    pub async fn set_role_permissions(
        &self,
        actor: &AuthContext,
        role_name: &str,
        permissions: PermissionSet,
    ) -> WorkflowResult<Role> {
        require_any(actor, &[Permission::RoleManage])?;
        let role = self
            .stores
            .directory
            .set_role_permissions(role_name, &permissions)
            .await?;

        info!(
            role = %role.name,
            permissions = role.permissions.len(),
            actor_id = %actor.user_id,
            "Role permissions updated"
        );
        Ok(role)
    }

    /// Creates a CEO account when the username is not taken yet
    ///
    /// Returns `None` if the user already exists.
    pub async fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> WorkflowResult<Option<User>> {
        if self.stores.directory.find_user_by_username(username).await?.is_some() {
            debug!(username = %username, "Bootstrap admin already present");
            return Ok(None);
        }

        validate_email(email)?;
        check_new_password(password, None)?;

        let user = self
            .stores
            .directory
            .insert_user(CreateUser {
                username: username.to_string(),
                email: email.to_string(),
                department: None,
                status: UserStatus::Active,
                roles: vec![ROLE_CEO.to_string()],
                permissions: PermissionSet::new(),
                password_hash: hash_password(password)?,
            })
            .await?;

        info!(user_id = %user.id, username = %username, "Bootstrap admin created");
        Ok(Some(user))
    }

    /// Active users whose effective set contains `permission`
    pub async fn users_with_permission(&self, permission: Permission) -> WorkflowResult<Vec<User>> {
        let roles = self.stores.directory.list_roles().await?;
        let users = self.stores.directory.list_users().await?;

        Ok(users
            .into_iter()
            .filter(|u| u.is_active() && permissions_for(u, &roles).contains(permission))
            .collect())
    }

    /// IDs of every user in `department`, inactive ones included
    pub async fn department_member_ids(&self, department: &str) -> WorkflowResult<Vec<Uuid>> {
        Ok(self
            .stores
            .directory
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.department.as_deref() == Some(department))
            .map(|u| u.id)
            .collect())
    }

    /// Username lookups for embedding in task responses; unknown IDs are
    /// left out
    pub async fn summaries(
        &self,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> WorkflowResult<HashMap<Uuid, UserSummary>> {
        let mut out = HashMap::new();
        for id in ids {
            if out.contains_key(&id) {
                continue;
            }
            if let Some(user) = self.stores.directory.find_user(id).await? {
                out.insert(id, user.summary());
            }
        }
        Ok(out)
    }

    /// Loads a user that must exist
    pub async fn find_user(&self, user_id: Uuid) -> WorkflowResult<User> {
        self.stores
            .directory
            .find_user(user_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("user", user_id))
    }

    async fn ensure_roles_exist(&self, roles: &[String]) -> WorkflowResult<()> {
        for name in roles {
            if self.stores.directory.find_role(name).await?.is_none() {
                return Err(WorkflowError::validation("roles", format!("unknown role {}", name)));
            }
        }
        Ok(())
    }
}

fn permissions_for(user: &User, roles: &[Role]) -> PermissionSet {
    let mut permissions = user.permissions.clone();
    for role in roles.iter().filter(|r| user.roles.contains(&r.name)) {
        permissions.merge(&role.permissions);
    }
    permissions
}

fn validate_email(email: &str) -> WorkflowResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(WorkflowError::validation("email", "must be a valid email address")),
    }
}

fn clean_department(department: Option<String>) -> Option<String> {
    department
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
