/// Comment / audit trail entries
///
/// Comments are append-only and listed in creation order; insertion order
/// breaks ties between entries created in the same instant. The author's
/// primary role is captured at write time so later role changes do not
/// rewrite history.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE comments (
///     seq BIGSERIAL UNIQUE,
///     id UUID PRIMARY KEY,
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     author_id UUID REFERENCES users(id),
///     body TEXT NOT NULL,
///     role_at_time TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of a task's audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,

    pub task_id: Uuid,

    /// `None` for system entries
    pub author_id: Option<Uuid>,

    pub body: String,

    /// Author's primary role when the comment was written
    pub role_at_time: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Input for appending a comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub task_id: Uuid,
    pub author_id: Option<Uuid>,
    pub body: String,
    pub role_at_time: Option<String>,
}
