/// Notification dispatcher
///
/// Every notification is persisted first and then published on a broadcast
/// channel that backs the SSE stream. Publishing with no subscribers is not
/// an error.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use crate::auth::{authorization::require_ownership, context::AuthContext};
use crate::models::notification::{NewNotification, Notification};
use crate::store::NotificationStore;

/// Buffered messages per SSE subscriber before it starts lagging
pub const CHANNEL_CAPACITY: usize = 256;

/// Creates, lists and marks notifications
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    sender: broadcast::Sender<Notification>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { store, sender }
    }

    /// Persists a notification and publishes it to live subscribers
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        message: impl Into<String>,
        task_id: Option<Uuid>,
    ) -> WorkflowResult<Notification> {
        let notification = self
            .store
            .insert_notification(NewNotification {
                recipient_id,
                message: message.into(),
                task_id,
            })
            .await?;

        let listeners = self.sender.send(notification.clone()).unwrap_or(0);
        debug!(
            notification_id = %notification.id,
            recipient_id = %recipient_id,
            listeners,
            "Notification dispatched"
        );
        Ok(notification)
    }

    /// [`Dispatcher::notify`] for side effects of a completed write: a
    /// failure is logged and swallowed
    pub async fn notify_best_effort(
        &self,
        recipient_id: Uuid,
        message: impl Into<String>,
        task_id: Option<Uuid>,
    ) -> Option<Notification> {
        match self.notify(recipient_id, message, task_id).await {
            Ok(notification) => Some(notification),
            Err(err) => {
                warn!(
                    recipient_id = %recipient_id,
                    task_id = ?task_id,
                    error = %err,
                    "Failed to dispatch notification"
                );
                None
            }
        }
    }

    /// Unread notifications, newest first; only the recipient may ask
    pub async fn list_unread(
        &self,
        actor: &AuthContext,
        user_id: Uuid,
    ) -> WorkflowResult<Vec<Notification>> {
        require_ownership(actor, user_id)?;
        Ok(self.store.list_unread(user_id).await?)
    }

    /// Marks one notification read; already-read notifications are returned
    /// unchanged
    pub async fn mark_read(
        &self,
        actor: &AuthContext,
        notification_id: Uuid,
    ) -> WorkflowResult<Notification> {
        let notification = self
            .store
            .find_notification(notification_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("notification", notification_id))?;

        if !actor.is_user(notification.recipient_id) {
            warn!(
                notification_id = %notification_id,
                actor_id = %actor.user_id,
                "Attempt to mark another user's notification"
            );
            return Err(WorkflowError::Forbidden(
                "Notification belongs to another user".to_string(),
            ));
        }

        if notification.read {
            return Ok(notification);
        }

        Ok(self.store.mark_read(notification_id).await?)
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(&self, actor: &AuthContext, user_id: Uuid) -> WorkflowResult<u64> {
        require_ownership(actor, user_id)?;
        let updated = self.store.mark_all_read(user_id).await?;
        info!(user_id = %user_id, updated, "Notifications marked read");
        Ok(updated)
    }

    /// Live feed of every new notification; callers filter by recipient
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        permission::PermissionSet,
        user::{User, UserStatus},
    };
    use crate::store::memory::MemoryStore;

    fn ctx() -> AuthContext {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            department: None,
            status: UserStatus::Active,
            roles: vec![],
            permissions: PermissionSet::new(),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        };
        AuthContext::from_user(&user, PermissionSet::new())
    }

    #[tokio::test]
    async fn test_mark_read_twice_is_idempotent() {
        let dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
        let me = ctx();
        let n = dispatcher.notify(me.user_id, "hello", None).await.unwrap();

        let first = dispatcher.mark_read(&me, n.id).await.unwrap();
        let second = dispatcher.mark_read(&me, n.id).await.unwrap();

        assert!(first.read);
        assert!(second.read);
        assert!(dispatcher.list_unread(&me, me.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_recipient_may_read() {
        let dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
        let owner = ctx();
        let other = ctx();
        let n = dispatcher.notify(owner.user_id, "hello", None).await.unwrap();

        assert!(matches!(
            dispatcher.mark_read(&other, n.id).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            dispatcher.list_unread(&other, owner.user_id).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert_eq!(dispatcher.list_unread(&owner, owner.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_and_unread_order() {
        let dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
        let me = ctx();
        dispatcher.notify(me.user_id, "one", None).await.unwrap();
        dispatcher.notify(me.user_id, "two", None).await.unwrap();

        let unread = dispatcher.list_unread(&me, me.user_id).await.unwrap();
        assert_eq!(unread[0].message, "two");

        assert_eq!(dispatcher.mark_all_read(&me, me.user_id).await.unwrap(), 2);
        assert_eq!(dispatcher.mark_all_read(&me, me.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_new_notifications() {
        let dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
        let mut rx = dispatcher.subscribe();
        let me = ctx();

        let sent = dispatcher.notify(me.user_id, "ping", None).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, sent.id);
    }
}
