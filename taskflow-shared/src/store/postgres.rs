/// PostgreSQL storage adapter
///
/// Implements every store port on top of a `sqlx` pool. Enum columns are
/// stored as TEXT and parsed on the way out; a value that fails to parse is
/// reported as a backend error rather than silently mapped.
///
/// Multi-row writes (task + categories, user + roles) run in a transaction.
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskflow_shared::store::{postgres::PgStore, DirectoryStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// let roles = store.list_roles().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{
    CommentStore, DirectoryStore, NotificationStore, StoreError, StoreResult, TaskStore,
};
use crate::models::{
    comment::{Comment, NewComment},
    notification::{NewNotification, Notification},
    permission::PermissionSet,
    role::Role,
    task::{CreateTask, Task, TaskQuery, TaskScope, TaskStatus},
    user::{CreateUser, UpdateUser, User},
};

/// PostgreSQL implementation of every store port
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.department, u.status, u.password_hash,
           u.created_at, u.updated_at,
           ARRAY(SELECT ur.role_name FROM user_roles ur
                 WHERE ur.user_id = u.id ORDER BY ur.position) AS roles,
           ARRAY(SELECT up.permission FROM user_permissions up
                 WHERE up.user_id = u.id ORDER BY up.permission) AS permissions
    FROM users u
"#;

const ROLE_SELECT: &str = r#"
    SELECT r.name, r.description,
           ARRAY(SELECT rp.permission FROM role_permissions rp
                 WHERE rp.role_name = r.name ORDER BY rp.permission) AS permissions
    FROM roles r
"#;

const TASK_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.due_date, t.priority, t.status,
           t.assigned_to, t.created_by, t.created_at, t.updated_at,
           ARRAY(SELECT tc.category FROM task_categories tc
                 WHERE tc.task_id = t.id ORDER BY tc.position) AS categories
    FROM tasks t
"#;

const COMMENT_COLUMNS: &str = "id, task_id, author_id, body, role_at_time, created_at";

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, message, read, task_id, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    department: Option<String>,
    status: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    roles: Vec<String>,
    permissions: Vec<String>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            department: row.department,
            status: row.status.parse()?,
            roles: row.roles,
            permissions: PermissionSet::parse(&row.permissions)?,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    name: String,
    description: Option<String>,
    permissions: Vec<String>,
}

impl TryFrom<RoleRow> for Role {
    type Error = StoreError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Role {
            name: row.name,
            description: row.description,
            permissions: PermissionSet::parse(&row.permissions)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    due_date: DateTime<Utc>,
    priority: String,
    status: String,
    assigned_to: Uuid,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    categories: Vec<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            due_date: row.due_date,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            assigned_to: row.assigned_to,
            created_by: row.created_by,
            categories: row.categories,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    task_id: Uuid,
    author_id: Option<Uuid>,
    body: String,
    role_at_time: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            task_id: row.task_id,
            author_id: row.author_id,
            body: row.body,
            role_at_time: row.role_at_time,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    message: String,
    read: bool,
    task_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            message: row.message,
            read: row.read,
            task_id: row.task_id,
            created_at: row.created_at,
        }
    }
}

fn map_unique_violation(err: sqlx::Error, entity: &'static str, key: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                entity,
                key: key.to_string(),
            };
        }
    }
    StoreError::from(err)
}

async fn replace_user_roles(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    roles: &[String],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for (position, role) in roles.iter().enumerate() {
        sqlx::query("INSERT INTO user_roles (user_id, role_name, position) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(role)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn replace_user_permissions(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    permissions: &PermissionSet,
) -> StoreResult<()> {
    sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for permission in permissions.iter() {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES ($1, $2)")
            .bind(user_id)
            .bind(permission.as_str())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

impl PgStore {
    async fn fetch_task(&self, id: Uuid) -> StoreResult<Task> {
        self.find_task(id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    async fn fetch_user(&self, id: Uuid) -> StoreResult<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    /// Status and assignee, read after a guarded write matched no row
    async fn task_guard_fields(&self, id: Uuid) -> StoreResult<(TaskStatus, Uuid)> {
        let row: Option<(String, Uuid)> =
            sqlx::query_as("SELECT status, assigned_to FROM tasks WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((status, assigned_to)) => Ok((status.parse()?, assigned_to)),
            None => Err(StoreError::not_found("task", id)),
        }
    }

    /// Why an open-task-only update matched no row
    async fn closed_task_error(&self, id: Uuid) -> StoreError {
        match self.task_guard_fields(id).await {
            Ok((status, _)) => StoreError::Conflict { actual: status },
            Err(err) => err,
        }
    }
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, user: CreateUser) -> StoreResult<User> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, department, status, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.department)
        .bind(user.status.as_str())
        .bind(&user.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "username", &user.username))?;

        replace_user_roles(&mut tx, id, &user.roles).await?;
        replace_user_permissions(&mut tx, id, &user.permissions).await?;
        tx.commit().await?;

        debug!(user_id = %id, username = %user.username, "Inserted user");
        self.fetch_user(id).await
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE u.username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("{USER_SELECT} ORDER BY u.username");
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update_user(&self, id: Uuid, changes: UpdateUser) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                department = COALESCE($3, department),
                status = COALESCE($4, status),
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.department)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(&changes.password_hash)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", id));
        }

        if let Some(roles) = &changes.roles {
            replace_user_roles(&mut tx, id, roles).await?;
        }
        if let Some(permissions) = &changes.permissions {
            replace_user_permissions(&mut tx, id, permissions).await?;
        }
        tx.commit().await?;

        self.fetch_user(id).await
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", id));
        }
        Ok(())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let sql = format!("{ROLE_SELECT} ORDER BY r.name");
        sqlx::query_as::<_, RoleRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Role::try_from)
            .collect()
    }

    async fn find_role(&self, name: &str) -> StoreResult<Option<Role>> {
        let sql = format!("{ROLE_SELECT} WHERE r.name = $1");
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Role::try_from).transpose()
    }

    async fn set_role_permissions(
        &self,
        name: &str,
        permissions: &PermissionSet,
    ) -> StoreResult<Role> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM roles WHERE name = $1)")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(StoreError::not_found("role", name));
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_name = $1")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        for permission in permissions.iter() {
            sqlx::query("INSERT INTO role_permissions (role_name, permission) VALUES ($1, $2)")
                .bind(name)
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.find_role(name)
            .await?
            .ok_or_else(|| StoreError::not_found("role", name))
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: CreateTask) -> StoreResult<Task> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, due_date, priority, status,
                               assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(task.priority.as_str())
        .bind(TaskStatus::Todo.as_str())
        .bind(task.assigned_to)
        .bind(task.created_by)
        .execute(&mut *tx)
        .await?;

        for (position, category) in task.categories.iter().enumerate() {
            sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(category)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO task_categories (task_id, category, position) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(category)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(task_id = %id, "Inserted task");
        self.fetch_task(id).await
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let sql = format!("{TASK_SELECT} WHERE t.id = $1");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn list_tasks(&self, query: &TaskQuery, now: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(TASK_SELECT);
        builder.push(" WHERE TRUE");

        if let TaskScope::Assignees(ids) = &query.scope {
            builder.push(" AND t.assigned_to = ANY(");
            builder.push_bind(ids.clone());
            builder.push(")");
        }

        let filter = &query.filter;
        if let Some(category) = &filter.category {
            builder.push(
                " AND EXISTS (SELECT 1 FROM task_categories tc \
                 WHERE tc.task_id = t.id AND LOWER(tc.category) = LOWER(",
            );
            builder.push_bind(category.clone());
            builder.push("))");
        }
        if let Some(status) = filter.status {
            builder.push(" AND t.status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(assignee) = filter.assignee {
            builder.push(" AND t.assigned_to = ");
            builder.push_bind(assignee);
        }
        if let Some(overdue) = filter.overdue {
            builder.push(if overdue { " AND (" } else { " AND NOT (" });
            builder.push("t.status <> 'APPROVED' AND t.due_date < ");
            builder.push_bind(now);
            builder.push(")");
        }
        builder.push(" ORDER BY t.created_at DESC, t.id");

        builder
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TaskStatus,
        new: TaskStatus,
        assignee: Option<Uuid>,
    ) -> StoreResult<Task> {
        let updated = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
              AND ($4::uuid IS NULL OR assigned_to = $4)
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(new.as_str())
        .bind(assignee)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            let (status, assigned_to) = self.task_guard_fields(id).await?;
            if status != expected {
                return Err(StoreError::Conflict { actual: status });
            }
            return Err(StoreError::Reassigned {
                actual: assigned_to,
            });
        }

        self.fetch_task(id).await
    }

    async fn update_due_date(&self, id: Uuid, due_date: DateTime<Utc>) -> StoreResult<Task> {
        let result = sqlx::query(
            "UPDATE tasks SET due_date = $2, updated_at = NOW() WHERE id = $1 AND status <> 'APPROVED'",
        )
        .bind(id)
        .bind(due_date)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.closed_task_error(id).await);
        }
        self.fetch_task(id).await
    }

    async fn update_assignee(&self, id: Uuid, assignee: Uuid) -> StoreResult<Task> {
        let result = sqlx::query(
            "UPDATE tasks SET assigned_to = $2, updated_at = NOW() WHERE id = $1 AND status <> 'APPROVED'",
        )
        .bind(id)
        .bind(assignee)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.closed_task_error(id).await);
        }
        self.fetch_task(id).await
    }

    async fn count_user_references(&self, user_id: Uuid) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks WHERE assigned_to = $1 OR created_by = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn append_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let sql = format!(
            "INSERT INTO comments (id, task_id, author_id, body, role_at_time) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(comment.task_id)
            .bind(comment.author_id)
            .bind(&comment.body)
            .bind(&comment.role_at_time)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE task_id = $1 ORDER BY created_at, seq"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn count_comments_by_author(&self, user_id: Uuid) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE author_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications (id, recipient_id, message, task_id) \
             VALUES ($1, $2, $3, $4) RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(notification.recipient_id)
            .bind(&notification.message)
            .bind(notification.task_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Notification::from))
    }

    async fn list_unread(&self, recipient_id: Uuid) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 AND read = FALSE ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(recipient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn list_for_task(&self, task_id: Uuid) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE task_id = $1 ORDER BY created_at, seq"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_read(&self, id: Uuid) -> StoreResult<Notification> {
        let sql = format!(
            "UPDATE notifications SET read = TRUE WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Notification::from)
            .ok_or_else(|| StoreError::not_found("notification", id))
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
