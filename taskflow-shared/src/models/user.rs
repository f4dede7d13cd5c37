/// User directory entries
///
/// A user is an identity record with a department, a list of role names, and
/// optional direct permission grants. The effective permission set is the
/// union of the roles' permissions and the direct grants; it is resolved from
/// the store on every request and never cached.
///
/// Users referenced by tasks or comments are never removed, only set to
/// `INACTIVE`. Inactive users cannot log in, their tokens stop authenticating,
/// and tasks cannot be assigned to them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     username TEXT NOT NULL UNIQUE,
///     email TEXT NOT NULL,
///     department TEXT,
///     status TEXT NOT NULL DEFAULT 'ACTIVE',
///     password_hash TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE user_roles (
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role_name TEXT NOT NULL REFERENCES roles(name) ON DELETE CASCADE,
///     position INTEGER NOT NULL,
///     PRIMARY KEY (user_id, role_name)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::permission::PermissionSet;
use super::role::role_rank;
use super::ParseEnumError;

/// Account status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Can log in and receive assignments
    #[default]
    Active,

    /// Soft-disabled; kept for referential history
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(UserStatus::Active),
            "INACTIVE" => Ok(UserStatus::Inactive),
            other => Err(ParseEnumError::new("user status", other)),
        }
    }
}

/// A directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID
    #[serde(rename = "userId")]
    pub id: Uuid,

    /// Login name, unique across the directory
    pub username: String,

    /// Contact email
    pub email: String,

    /// Organizational unit, used for department-scoped task visibility
    pub department: Option<String>,

    /// Account status
    pub status: UserStatus,

    /// Role names, in assignment order
    pub roles: Vec<String>,

    /// Permissions granted directly, on top of the roles
    pub permissions: PermissionSet,

    /// Argon2id hash; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Highest-precedence role, recorded on comments as `roleAtTime`
    pub fn primary_role(&self) -> Option<&str> {
        self.roles
            .iter()
            .enumerate()
            .min_by_key(|(position, name)| (role_rank(name), *position))
            .map(|(_, name)| name.as_str())
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Compact user reference embedded in task responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: Uuid,
    pub username: String,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub department: Option<String>,
    pub status: UserStatus,
    pub roles: Vec<String>,
    pub permissions: PermissionSet,
    /// Already hashed with [`crate::auth::password::hash_password`]
    pub password_hash: String,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub department: Option<String>,
    pub status: Option<UserStatus>,
    pub roles: Option<Vec<String>>,
    pub permissions: Option<PermissionSet>,
    pub password_hash: Option<String>,
}

impl UpdateUser {
    /// Only flips the status
    pub fn status(status: UserStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Applies the changes in place and bumps `updated_at`
    pub fn apply_to(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(department) = self.department {
            user.department = Some(department);
        }
        if let Some(status) = self.status {
            user.status = status;
        }
        if let Some(roles) = self.roles {
            user.roles = roles;
        }
        if let Some(permissions) = self.permissions {
            user.permissions = permissions;
        }
        if let Some(password_hash) = self.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = now;
    }
}
