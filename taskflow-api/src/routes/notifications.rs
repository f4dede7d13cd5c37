/// Notification endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/notifications/unread/:user_id` - Unread, newest first
/// - `PUT /api/v1/notifications/read/:notification_id` - Mark one read
/// - `PUT /api/v1/notifications/readall/:user_id` - Mark all read
/// - `GET /api/v1/notifications/stream` - SSE feed of new notifications
///
/// # SSE Event Format
///
/// ```text
/// event: notification
/// id: 6f1c...
/// data: {"id":"6f1c...","recipientId":"...","message":"New task assigned: Q3 report","read":false,"taskId":"...","createdAt":"..."}
/// ```
///
/// A keep-alive comment is sent every 25 seconds.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use serde::Serialize;
use std::time::Duration;
use taskflow_shared::{auth::context::AuthContext, models::notification::Notification};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt as _,
};
use uuid::Uuid;

/// Keep-alive interval for the SSE feed
const KEEP_ALIVE_SECONDS: u64 = 25;

/// Mark-all response
#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    /// Notifications that flipped from unread to read
    pub updated: u64,
}

pub async fn list_unread(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(
        state
            .services
            .dispatcher
            .list_unread(&auth, user_id)
            .await?,
    ))
}

/// Idempotent: marking an already-read notification succeeds
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(
        state
            .services
            .dispatcher
            .mark_read(&auth, notification_id)
            .await?,
    ))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = state
        .services
        .dispatcher
        .mark_all_read(&auth, user_id)
        .await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// Pushes the caller's notifications as they are created
///
/// Only notifications created after the subscription are sent; clients
/// call `unread` once on connect to catch up.
pub async fn stream(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let user_id = auth.user_id;
    tracing::debug!(user_id = %user_id, "Notification stream opened");

    let events = BroadcastStream::new(state.services.dispatcher.subscribe()).filter_map(
        move |item| match item {
            Ok(notification) if notification.recipient_id == user_id => Some(
                Event::default()
                    .event("notification")
                    .id(notification.id.to_string())
                    .json_data(&notification),
            ),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(user_id = %user_id, skipped, "Notification stream lagged");
                None
            }
        },
    );

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECONDS)))
}
