use crate::auth::{authorization::AuthzError, jwt::JwtError, password::PasswordError};
use crate::models::task::TaskStatus;
use crate::store::StoreError;

/// Result type for workflow services
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Domain errors returned by every service operation
///
/// Authorization and validation failures are raised before any write. A
/// failed operation leaves the stored state unchanged, except that side
/// effects after a successful status write (comments, notifications) are
/// logged rather than returned.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Bad credentials, or the account is inactive or gone
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The stored status has no lattice edge to the requested one
    #[error("Cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// Another writer changed the status between the read and the CAS write
    #[error("Task status changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        expected: TaskStatus,
        actual: TaskStatus,
    },

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {}", entity, id))
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => WorkflowError::not_found(entity, id),
            StoreError::Duplicate { entity, key } => {
                WorkflowError::AlreadyExists(format!("{} {}", entity, key))
            }
            StoreError::Reassigned { .. } => {
                WorkflowError::Forbidden("Task is assigned to another user".to_string())
            }
            other => WorkflowError::Store(other),
        }
    }
}

impl From<AuthzError> for WorkflowError {
    fn from(err: AuthzError) -> Self {
        WorkflowError::Forbidden(err.to_string())
    }
}

impl From<PasswordError> for WorkflowError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(_) | PasswordError::Mismatch => {
                WorkflowError::validation("password", err.to_string())
            }
            other => WorkflowError::Internal(other.to_string()),
        }
    }
}

impl From<JwtError> for WorkflowError {
    fn from(err: JwtError) -> Self {
        WorkflowError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::Permission;

    #[test]
    fn test_store_error_mapping() {
        let err: WorkflowError = StoreError::not_found("task", "42").into();
        assert!(matches!(err, WorkflowError::NotFound(ref m) if m == "task 42"));

        let err: WorkflowError = StoreError::Duplicate {
            entity: "username",
            key: "bob".into(),
        }
        .into();
        assert!(matches!(err, WorkflowError::AlreadyExists(_)));

        let err: WorkflowError = StoreError::Reassigned {
            actual: uuid::Uuid::new_v4(),
        }
        .into();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let err: WorkflowError = StoreError::backend(std::io::Error::other("down")).into();
        assert!(matches!(err, WorkflowError::Store(_)));
    }

    #[test]
    fn test_password_error_mapping() {
        let err: WorkflowError = PasswordError::Mismatch.into();
        assert!(matches!(err, WorkflowError::Validation { field: "password", .. }));

        let err: WorkflowError = PasswordError::HashError("boom".into()).into();
        assert!(matches!(err, WorkflowError::Internal(_)));
    }

    #[test]
    fn test_authz_error_mapping() {
        let err: WorkflowError = AuthzError::MissingPermission {
            required: vec![Permission::TaskCreate],
        }
        .into();
        assert!(err.to_string().contains("TASK_CREATE"));
    }

    #[test]
    fn test_transition_display() {
        let err = WorkflowError::InvalidTransition {
            from: TaskStatus::Submitted,
            to: TaskStatus::Submitted,
        };
        assert_eq!(err.to_string(), "Cannot move task from SUBMITTED to SUBMITTED");
    }
}
