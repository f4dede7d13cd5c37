/// Domain models for TaskFlow
///
/// Plain data types shared by the storage adapters, the workflow services and
/// the HTTP layer. Persistence lives in [`crate::store`]; these types carry no
/// database handles.
///
/// # Models
///
/// - `permission`: Fixed permission catalog and permission sets
/// - `role`: Named permission bundles and the seeded defaults
/// - `user`: Directory entries (identity, department, roles, status)
/// - `task`: Tasks, the status lattice, list filters and scopes
/// - `comment`: Append-only audit trail entries
/// - `notification`: Per-user unread notifications
///
/// # Example
///
/// ```
/// use taskflow_shared::models::task::TaskStatus;
///
/// assert!(TaskStatus::Todo.can_transition_to(TaskStatus::InProgress));
/// assert!(!TaskStatus::Approved.can_transition_to(TaskStatus::InProgress));
/// ```

pub mod comment;
pub mod notification;
pub mod permission;
pub mod role;
pub mod task;
pub mod user;

/// Error returned when a stored or submitted string is not a known enum value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} value: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed (e.g. "task status")
    pub kind: &'static str,

    /// The rejected input
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
