/// Append-only comment trail per task

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use crate::auth::context::AuthContext;
use crate::models::comment::{Comment, NewComment};
use crate::store::CommentStore;

/// Writes and reads task comments
///
/// Visibility of the parent task is checked by the caller; this type only
/// enforces that bodies are not blank.
#[derive(Clone)]
pub struct AuditTrail {
    comments: Arc<dyn CommentStore>,
}

impl AuditTrail {
    pub fn new(comments: Arc<dyn CommentStore>) -> Self {
        Self { comments }
    }

    /// Trimmed body, or a validation error when nothing is left
    pub fn validate_body(body: &str) -> WorkflowResult<String> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(WorkflowError::validation("comment", "must not be empty"));
        }
        Ok(trimmed.to_string())
    }

    /// Appends a comment; `author` is `None` for system entries
    ///
    /// The author's primary role is captured as `roleAtTime`.
    pub async fn append(
        &self,
        task_id: Uuid,
        author: Option<&AuthContext>,
        body: &str,
    ) -> WorkflowResult<Comment> {
        let body = Self::validate_body(body)?;

        let comment = self
            .comments
            .append_comment(NewComment {
                task_id,
                author_id: author.map(|a| a.user_id),
                body,
                role_at_time: author.and_then(|a| a.primary_role.clone()),
            })
            .await?;

        debug!(task_id = %task_id, comment_id = %comment.id, "Comment appended");
        Ok(comment)
    }

    /// Oldest first
    pub async fn list(&self, task_id: Uuid) -> WorkflowResult<Vec<Comment>> {
        Ok(self.comments.list_comments(task_id).await?)
    }
}
