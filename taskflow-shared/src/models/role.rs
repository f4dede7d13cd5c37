/// Roles: named permission bundles
///
/// Roles are administrator-editable data. Four are seeded on first start:
///
/// | Role | Intent |
/// |---|---|
/// | `CEO` | every permission |
/// | `ADMIN` | user/role management, all tasks, approval |
/// | `DIRECTOR` | department tasks, assignment, approval |
/// | `NORMAL_USER` | own tasks and comments |
///
/// # Schema
///
/// ```sql
/// CREATE TABLE roles (
///     name TEXT PRIMARY KEY,
///     description TEXT
/// );
///
/// CREATE TABLE role_permissions (
///     role_name TEXT NOT NULL REFERENCES roles(name) ON DELETE CASCADE,
///     permission TEXT NOT NULL,
///     PRIMARY KEY (role_name, permission)
/// );
/// ```

use serde::{Deserialize, Serialize};

use super::permission::{Permission, PermissionSet};

pub const ROLE_CEO: &str = "CEO";
pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_DIRECTOR: &str = "DIRECTOR";
pub const ROLE_NORMAL_USER: &str = "NORMAL_USER";

/// A named permission bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Unique role name (e.g. "DIRECTOR")
    pub name: String,

    /// Optional human-readable description
    pub description: Option<String>,

    /// Permissions granted by this role
    pub permissions: PermissionSet,
}

impl Role {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        permissions: PermissionSet,
    ) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            permissions,
        }
    }
}

/// Precedence used when a user holds several roles and a single "primary"
/// role must be recorded (comment `roleAtTime`). Lower ranks first.
pub fn role_rank(name: &str) -> u8 {
    match name {
        ROLE_CEO => 0,
        ROLE_ADMIN => 1,
        ROLE_DIRECTOR => 2,
        ROLE_NORMAL_USER => 3,
        _ => 4,
    }
}

/// Roles seeded into an empty directory
pub fn default_roles() -> Vec<Role> {
    use Permission::*;

    vec![
        Role::new(ROLE_CEO, "Chief executive, full access", PermissionSet::all()),
        Role::new(
            ROLE_ADMIN,
            "Administrator",
            [
                UserManage,
                RoleManage,
                ReportView,
                SystemConfig,
                TaskCreate,
                TaskAssign,
                TaskUpdateStatus,
                TaskSetDuedate,
                TaskViewAll,
                TaskApprove,
                TaskComment,
            ]
            .into_iter()
            .collect(),
        ),
        Role::new(
            ROLE_DIRECTOR,
            "Department director",
            [
                ReportView,
                TaskCreate,
                TaskAssign,
                TaskUpdateStatus,
                TaskSetDuedate,
                TaskViewDepartment,
                TaskViewAssigned,
                TaskApprove,
                TaskComment,
            ]
            .into_iter()
            .collect(),
        ),
        Role::new(
            ROLE_NORMAL_USER,
            "Regular staff member",
            [TaskViewAssigned, TaskComment].into_iter().collect(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roles_seeded() {
        let roles = default_roles();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![ROLE_CEO, ROLE_ADMIN, ROLE_DIRECTOR, ROLE_NORMAL_USER]);
    }

    #[test]
    fn test_ceo_has_everything() {
        let ceo = default_roles().into_iter().find(|r| r.name == ROLE_CEO).unwrap();
        assert_eq!(ceo.permissions, PermissionSet::all());
    }

    #[test]
    fn test_normal_user_cannot_approve() {
        let normal = default_roles()
            .into_iter()
            .find(|r| r.name == ROLE_NORMAL_USER)
            .unwrap();
        assert!(!normal.permissions.contains(Permission::TaskApprove));
        assert!(normal.permissions.contains(Permission::TaskViewAssigned));
    }

    #[test]
    fn test_role_rank_orders_seeded_roles() {
        assert!(role_rank(ROLE_CEO) < role_rank(ROLE_ADMIN));
        assert!(role_rank(ROLE_DIRECTOR) < role_rank(ROLE_NORMAL_USER));
        assert_eq!(role_rank("AUDITOR"), 4);
    }
}
