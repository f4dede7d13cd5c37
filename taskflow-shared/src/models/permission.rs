/// Permission catalog and permission sets
///
/// Permissions are atomic capability strings granted to users through roles
/// (and, optionally, direct grants). The catalog is fixed; roles are data.
///
/// Checks use OR semantics: a caller passes if it holds at least one of the
/// required permissions, and an empty requirement always passes.
///
/// # Example
///
/// ```
/// use taskflow_shared::models::permission::{Permission, PermissionSet};
///
/// let perms: PermissionSet = [Permission::TaskViewAssigned, Permission::TaskComment]
///     .into_iter()
///     .collect();
///
/// assert!(perms.has_any(&[Permission::TaskViewAll, Permission::TaskViewAssigned]));
/// assert!(!perms.has_any(&[Permission::TaskApprove]));
/// assert!(perms.has_any(&[]));
/// ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::ParseEnumError;

/// A single capability from the fixed catalog
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Create, edit and delete users
    UserManage,

    /// Edit role permission sets
    RoleManage,

    /// View the reports summary
    ReportView,

    /// Change system settings
    SystemConfig,

    /// Create tasks
    TaskCreate,

    /// Assign or reassign tasks
    TaskAssign,

    /// Move tasks along non-review lattice edges
    TaskUpdateStatus,

    /// Change task due dates
    TaskSetDuedate,

    /// See every task
    TaskViewAll,

    /// See tasks assigned within the caller's department
    TaskViewDepartment,

    /// See tasks assigned to the caller
    TaskViewAssigned,

    /// Approve or reject submitted tasks
    TaskApprove,

    /// Comment on visible tasks
    TaskComment,
}

impl Permission {
    /// Every permission in the catalog, in declaration order
    pub const ALL: [Permission; 13] = [
        Permission::UserManage,
        Permission::RoleManage,
        Permission::ReportView,
        Permission::SystemConfig,
        Permission::TaskCreate,
        Permission::TaskAssign,
        Permission::TaskUpdateStatus,
        Permission::TaskSetDuedate,
        Permission::TaskViewAll,
        Permission::TaskViewDepartment,
        Permission::TaskViewAssigned,
        Permission::TaskApprove,
        Permission::TaskComment,
    ];

    /// Wire and storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UserManage => "USER_MANAGE",
            Permission::RoleManage => "ROLE_MANAGE",
            Permission::ReportView => "REPORT_VIEW",
            Permission::SystemConfig => "SYSTEM_CONFIG",
            Permission::TaskCreate => "TASK_CREATE",
            Permission::TaskAssign => "TASK_ASSIGN",
            Permission::TaskUpdateStatus => "TASK_UPDATE_STATUS",
            Permission::TaskSetDuedate => "TASK_SET_DUEDATE",
            Permission::TaskViewAll => "TASK_VIEW_ALL",
            Permission::TaskViewDepartment => "TASK_VIEW_DEPARTMENT",
            Permission::TaskViewAssigned => "TASK_VIEW_ASSIGNED",
            Permission::TaskApprove => "TASK_APPROVE",
            Permission::TaskComment => "TASK_COMMENT",
        }
    }

    /// Permissions that grant some task visibility
    pub fn view_scopes() -> [Permission; 3] {
        [
            Permission::TaskViewAll,
            Permission::TaskViewDepartment,
            Permission::TaskViewAssigned,
        ]
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("permission", s))
    }
}

/// An ordered, duplicate-free set of permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The whole catalog
    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    /// Parses storage names, failing on the first unknown entry
    pub fn parse<I, S>(names: I) -> Result<Self, ParseEnumError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<Permission>())
            .collect()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// OR check; an empty requirement is always satisfied
    pub fn has_any(&self, required: &[Permission]) -> bool {
        required.is_empty() || required.iter().any(|p| self.0.contains(p))
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    /// Adds every permission of `other` to this set
    pub fn merge(&mut self, other: &PermissionSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Storage names in catalog order
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
