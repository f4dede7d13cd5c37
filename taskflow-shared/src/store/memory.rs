/// In-memory storage adapter
///
/// One `RwLock` guards the whole state so a compare-and-set and the read that
/// precedes it inside the adapter are atomic with respect to other callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{
    CommentStore, DirectoryStore, NotificationStore, StoreError, StoreResult, TaskStore,
};
use crate::models::{
    comment::{Comment, NewComment},
    notification::{NewNotification, Notification},
    permission::PermissionSet,
    role::{default_roles, Role},
    task::{CreateTask, Task, TaskQuery, TaskStatus},
    user::{CreateUser, UpdateUser, User},
};

/// Thread-safe in-memory implementation of every store port
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    roles: BTreeMap<String, Role>,
    // insertion order doubles as the tie-breaker for equal timestamps
    tasks: Vec<Task>,
    comments: Vec<Comment>,
    notifications: Vec<Notification>,
}

impl MemoryStore {
    /// Empty store without roles
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the default roles
    pub fn seeded() -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.write() {
            for role in default_roles() {
                state.roles.insert(role.name.clone(), role);
            }
        }
        store
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|err| StoreError::backend(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|err| StoreError::backend(std::io::Error::other(err.to_string())))
    }
}

impl MemoryState {
    fn task_mut(&mut self, id: Uuid) -> StoreResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    /// Like `task_mut`, but refuses `APPROVED` tasks
    fn open_task_mut(&mut self, id: Uuid) -> StoreResult<&mut Task> {
        let task = self.task_mut(id)?;
        if task.status.is_terminal() {
            return Err(StoreError::Conflict {
                actual: task.status,
            });
        }
        Ok(task)
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    async fn insert_user(&self, user: CreateUser) -> StoreResult<User> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate {
                entity: "username",
                key: user.username,
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            department: user.department,
            status: user.status,
            roles: user.roles,
            permissions: user.permissions,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: UpdateUser) -> StoreResult<User> {
        let mut state = self.write()?;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("user", id))?;
        changes.apply_to(user, Utc::now());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.write()?;
        state
            .users
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("user", id))?;
        state.notifications.retain(|n| n.recipient_id != id);
        Ok(())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn find_role(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(self.read()?.roles.get(name).cloned())
    }

    async fn set_role_permissions(
        &self,
        name: &str,
        permissions: &PermissionSet,
    ) -> StoreResult<Role> {
        let mut state = self.write()?;
        let role = state
            .roles
            .get_mut(name)
            .ok_or_else(|| StoreError::not_found("role", name))?;
        role.permissions = permissions.clone();
        Ok(role.clone())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: CreateTask) -> StoreResult<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            due_date: task.due_date,
            priority: task.priority,
            status: TaskStatus::Todo,
            assigned_to: task.assigned_to,
            created_by: task.created_by,
            categories: task.categories,
            created_at: now,
            updated_at: now,
        };
        self.write()?.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.read()?.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, query: &TaskQuery, now: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        let state = self.read()?;
        // newest first; reversing insertion order keeps ties stable
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .rev()
            .filter(|t| query.matches(t, now))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TaskStatus,
        new: TaskStatus,
        assignee: Option<Uuid>,
    ) -> StoreResult<Task> {
        let mut state = self.write()?;
        let task = state.task_mut(id)?;
        if task.status != expected {
            return Err(StoreError::Conflict {
                actual: task.status,
            });
        }
        if assignee.is_some_and(|a| a != task.assigned_to) {
            return Err(StoreError::Reassigned {
                actual: task.assigned_to,
            });
        }
        task.status = new;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn update_due_date(&self, id: Uuid, due_date: DateTime<Utc>) -> StoreResult<Task> {
        let mut state = self.write()?;
        let task = state.open_task_mut(id)?;
        task.due_date = due_date;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn update_assignee(&self, id: Uuid, assignee: Uuid) -> StoreResult<Task> {
        let mut state = self.write()?;
        let task = state.open_task_mut(id)?;
        task.assigned_to = assignee;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn count_user_references(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .read()?
            .tasks
            .iter()
            .filter(|t| t.assigned_to == user_id || t.created_by == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn append_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: comment.task_id,
            author_id: comment.author_id,
            body: comment.body,
            role_at_time: comment.role_at_time,
            created_at: Utc::now(),
        };
        self.write()?.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>> {
        // already in insertion order
        Ok(self
            .read()?
            .comments
            .iter()
            .filter(|c| c.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn count_comments_by_author(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .read()?
            .comments
            .iter()
            .filter(|c| c.author_id == Some(user_id))
            .count() as u64)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: notification.recipient_id,
            message: notification.message,
            read: false,
            task_id: notification.task_id,
            created_at: Utc::now(),
        };
        self.write()?.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(self
            .read()?
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn list_unread(&self, recipient_id: Uuid) -> StoreResult<Vec<Notification>> {
        Ok(self
            .read()?
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
            .cloned()
            .collect())
    }

    async fn list_for_task(&self, task_id: Uuid) -> StoreResult<Vec<Notification>> {
        Ok(self
            .read()?
            .notifications
            .iter()
            .filter(|n| n.task_id == Some(task_id))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid) -> StoreResult<Notification> {
        let mut state = self.write()?;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::not_found("notification", id))?;
        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> StoreResult<u64> {
        let mut state = self.write()?;
        let mut flipped = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
        {
            notification.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        permission::Permission,
        task::{Priority, TaskFilter, TaskScope},
        user::UserStatus,
    };
    use chrono::Duration;

    fn new_user(username: &str) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            department: None,
            status: UserStatus::Active,
            roles: vec!["NORMAL_USER".to_string()],
            permissions: PermissionSet::new(),
            password_hash: "hash".to_string(),
        }
    }

    fn new_task(assignee: Uuid, creator: Uuid) -> CreateTask {
        CreateTask {
            title: "Quarterly audit".to_string(),
            description: None,
            due_date: Utc::now() + Duration::days(3),
            priority: Priority::Medium,
            categories: vec!["Finance".to_string()],
            assigned_to: assignee,
            created_by: creator,
        }
    }

    #[tokio::test]
    async fn test_seeded_roles() {
        let store = MemoryStore::seeded();
        let roles = store.list_roles().await.unwrap();
        assert_eq!(roles.len(), 4);
        assert!(store.find_role("CEO").await.unwrap().is_some());
        assert!(MemoryStore::new().list_roles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryStore::seeded();
        store.insert_user(new_user("alice")).await.unwrap();

        let err = store.insert_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_compare_and_set_status() {
        let store = MemoryStore::seeded();
        let id = Uuid::new_v4();
        let task = store.insert_task(new_task(id, id)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Todo);

        let updated = store
            .compare_and_set_status(task.id, TaskStatus::Todo, TaskStatus::InProgress, None)
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);

        let err = store
            .compare_and_set_status(task.id, TaskStatus::Todo, TaskStatus::InProgress, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                actual: TaskStatus::InProgress
            }
        ));
    }

    #[tokio::test]
    async fn test_cas_checks_expected_assignee() {
        let store = MemoryStore::seeded();
        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());
        let task = store.insert_task(new_task(owner, owner)).await.unwrap();

        let err = store
            .compare_and_set_status(task.id, TaskStatus::Todo, TaskStatus::InProgress, Some(other))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Reassigned { actual } if actual == owner));
        assert_eq!(
            store.find_task(task.id).await.unwrap().unwrap().status,
            TaskStatus::Todo
        );

        let updated = store
            .compare_and_set_status(task.id, TaskStatus::Todo, TaskStatus::InProgress, Some(owner))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_approved_task_keeps_due_date_and_assignee() {
        let store = MemoryStore::seeded();
        let owner = Uuid::new_v4();
        let task = store.insert_task(new_task(owner, owner)).await.unwrap();
        for (from, to) in [
            (TaskStatus::Todo, TaskStatus::InProgress),
            (TaskStatus::InProgress, TaskStatus::Submitted),
            (TaskStatus::Submitted, TaskStatus::Approved),
        ] {
            store
                .compare_and_set_status(task.id, from, to, None)
                .await
                .unwrap();
        }

        let err = store
            .update_due_date(task.id, Utc::now() + Duration::days(30))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                actual: TaskStatus::Approved
            }
        ));
        assert!(matches!(
            store.update_assignee(task.id, Uuid::new_v4()).await,
            Err(StoreError::Conflict { .. })
        ));

        let stored = store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.due_date, task.due_date);
        assert_eq!(stored.assigned_to, owner);
    }

    #[tokio::test]
    async fn test_cas_on_missing_task() {
        let store = MemoryStore::seeded();
        let err = store
            .compare_and_set_status(Uuid::new_v4(), TaskStatus::Todo, TaskStatus::InProgress, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_tasks_scoped() {
        let store = MemoryStore::seeded();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_task(new_task(a, b)).await.unwrap();
        store.insert_task(new_task(b, a)).await.unwrap();

        let query = TaskQuery {
            scope: TaskScope::Assignees(vec![a]),
            filter: TaskFilter::default(),
        };
        let tasks = store.list_tasks(&query, Utc::now()).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].assigned_to, a);
    }

    #[tokio::test]
    async fn test_notifications_newest_first_and_mark_read() {
        let store = MemoryStore::seeded();
        let recipient = Uuid::new_v4();
        for message in ["first", "second"] {
            store
                .insert_notification(NewNotification {
                    recipient_id: recipient,
                    message: message.to_string(),
                    task_id: None,
                })
                .await
                .unwrap();
        }

        let unread = store.list_unread(recipient).await.unwrap();
        assert_eq!(unread[0].message, "second");

        store.mark_read(unread[0].id).await.unwrap();
        let again = store.mark_read(unread[0].id).await.unwrap();
        assert!(again.read);
        assert_eq!(store.list_unread(recipient).await.unwrap().len(), 1);

        assert_eq!(store.mark_all_read(recipient).await.unwrap(), 1);
        assert!(store.list_unread(recipient).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_role_permissions() {
        let store = MemoryStore::seeded();
        let perms: PermissionSet = [Permission::ReportView].into_iter().collect();
        let role = store.set_role_permissions("NORMAL_USER", &perms).await.unwrap();
        assert_eq!(role.permissions, perms);

        let err = store.set_role_permissions("GHOST", &perms).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reference_counts() {
        let store = MemoryStore::seeded();
        let user = store.insert_user(new_user("bob")).await.unwrap();
        assert_eq!(store.count_user_references(user.id).await.unwrap(), 0);

        let task = store.insert_task(new_task(user.id, Uuid::new_v4())).await.unwrap();
        assert_eq!(store.count_user_references(user.id).await.unwrap(), 1);

        store
            .append_comment(NewComment {
                task_id: task.id,
                author_id: Some(user.id),
                body: "on it".to_string(),
                role_at_time: None,
            })
            .await
            .unwrap();
        assert_eq!(store.count_comments_by_author(user.id).await.unwrap(), 1);
    }
}
