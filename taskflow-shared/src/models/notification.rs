/// Per-user notifications
///
/// Created only by the notification dispatcher. The read flag only ever moves
/// from `false` to `true`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notifications (
///     seq BIGSERIAL UNIQUE,
///     id UUID PRIMARY KEY,
///     recipient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     task_id UUID REFERENCES tasks(id) ON DELETE SET NULL,
///     message TEXT NOT NULL,
///     read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,

    pub recipient_id: Uuid,

    pub message: String,

    pub read: bool,

    /// Task that triggered the notification, if any
    pub task_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub message: String,
    pub task_id: Option<Uuid>,
}
