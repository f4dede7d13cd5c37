/// Storage ports and adapters
///
/// The workflow services talk to storage only through the traits in this
/// module. Two adapters implement them:
///
/// - [`memory::MemoryStore`]: `RwLock`-guarded maps, seeded with the default
///   roles. Used for development and tests.
/// - [`postgres::PgStore`]: sqlx/PostgreSQL, schema in `migrations/`.
///
/// The only concurrency-control primitive on task status is
/// [`TaskStore::compare_and_set_status`]: the write happens only if the stored
/// status still equals the caller's expected value, otherwise
/// [`StoreError::Conflict`] reports what is stored now.
///
/// # Example
///
/// ```
/// use taskflow_shared::store::Stores;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stores = Stores::in_memory();
/// let roles = stores.directory.list_roles().await?;
/// assert_eq!(roles.len(), 4);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    comment::{Comment, NewComment},
    notification::{NewNotification, Notification},
    permission::PermissionSet,
    role::Role,
    task::{CreateTask, Task, TaskQuery, TaskStatus},
    user::{CreateUser, UpdateUser, User},
};

pub mod memory;
pub mod postgres;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by storage adapters
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The addressed record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Compare-and-set lost: the stored status is no longer the expected one,
    /// or the task is closed
    #[error("Task status changed concurrently; stored status is {actual}")]
    Conflict { actual: TaskStatus },

    /// Status compare-and-set lost because the task changed hands
    #[error("Task was reassigned to {actual}")]
    Reassigned { actual: Uuid },

    /// A unique key is already taken
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// Backend failure (connection, query, poisoned lock, corrupt row)
    #[error("Storage backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wraps a backend error
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::backend(err)
    }
}

impl From<crate::models::ParseEnumError> for StoreError {
    fn from(err: crate::models::ParseEnumError) -> Self {
        StoreError::backend(err)
    }
}

/// Users and roles
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Cheap liveness probe used by `/health`
    async fn ping(&self) -> StoreResult<()>;

    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the username is taken.
    async fn insert_user(&self, user: CreateUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// All users ordered by username
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the user does not exist.
    async fn update_user(&self, id: Uuid, changes: UpdateUser) -> StoreResult<User>;

    /// Hard delete. Callers decide beforehand whether a soft disable is due.
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    async fn list_roles(&self) -> StoreResult<Vec<Role>>;

    async fn find_role(&self, name: &str) -> StoreResult<Option<Role>>;

    /// Replaces a role's permission set
    async fn set_role_permissions(
        &self,
        name: &str,
        permissions: &PermissionSet,
    ) -> StoreResult<Role>;
}

/// Task records and their status field
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new task in `TODO`
    async fn insert_task(&self, task: CreateTask) -> StoreResult<Task>;

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Scoped and filtered list, newest first
    async fn list_tasks(&self, query: &TaskQuery, now: DateTime<Utc>) -> StoreResult<Vec<Task>>;

    /// Writes `new` only if the stored status equals `expected` and, when
    /// `assignee` is given, the task is still assigned to that user
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] carrying the stored status on a status
    /// mismatch, [`StoreError::Reassigned`] on an assignee mismatch, and
    /// [`StoreError::NotFound`] when the task does not exist.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TaskStatus,
        new: TaskStatus,
        assignee: Option<Uuid>,
    ) -> StoreResult<Task>;

    /// Changes the due date of a task that is not `APPROVED`
    ///
    /// The status check and the write are one atomic step; a closed task
    /// yields [`StoreError::Conflict`].
    async fn update_due_date(&self, id: Uuid, due_date: DateTime<Utc>) -> StoreResult<Task>;

    /// Changes the assignee of a task that is not `APPROVED`; same contract
    /// as [`TaskStore::update_due_date`]
    async fn update_assignee(&self, id: Uuid, assignee: Uuid) -> StoreResult<Task>;

    /// Number of tasks that name the user as assignee or creator
    async fn count_user_references(&self, user_id: Uuid) -> StoreResult<u64>;
}

/// Append-only task comments
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn append_comment(&self, comment: NewComment) -> StoreResult<Comment>;

    /// Ascending by creation, insertion order breaking ties
    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>>;

    async fn count_comments_by_author(&self, user_id: Uuid) -> StoreResult<u64>;
}

/// Per-user notifications
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: NewNotification)
        -> StoreResult<Notification>;

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>>;

    /// Unread notifications for a user, newest first
    async fn list_unread(&self, recipient_id: Uuid) -> StoreResult<Vec<Notification>>;

    /// Every notification tied to a task, oldest first
    async fn list_for_task(&self, task_id: Uuid) -> StoreResult<Vec<Notification>>;

    /// Sets the read flag; a no-op when already read
    async fn mark_read(&self, id: Uuid) -> StoreResult<Notification>;

    /// Returns how many notifications flipped to read
    async fn mark_all_read(&self, recipient_id: Uuid) -> StoreResult<u64>;
}

/// The set of stores a running service uses
#[derive(Clone)]
pub struct Stores {
    pub directory: Arc<dyn DirectoryStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub comments: Arc<dyn CommentStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Stores {
    /// All ports backed by one seeded in-memory store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::seeded());
        Self {
            directory: store.clone(),
            tasks: store.clone(),
            comments: store.clone(),
            notifications: store,
        }
    }

    /// All ports backed by PostgreSQL; run migrations first
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            directory: store.clone(),
            tasks: store.clone(),
            comments: store.clone(),
            notifications: store,
        }
    }
}
