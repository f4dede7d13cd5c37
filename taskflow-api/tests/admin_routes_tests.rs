/// User, role, report and notification routes
///
/// Covers the administrative surface and the notification endpoints,
/// including the SSE feed.

mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestContext, PASSWORD};
use futures::StreamExt as _;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_user_management_requires_permission() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.get("/api/v1/getusers", &ctx.director).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, users) = ctx.get("/api/v1/getusers", &ctx.ceo).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ceo", "director", "outsider", "worker"]);
    assert!(users[0].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_add_and_update_user() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .post(
            "/api/v1/adduser",
            &ctx.ceo,
            json!({
                "username": "newhire",
                "password": "Welcome#2025",
                "confirmPassword": "Welcome#2024",
                "email": "newhire@example.com",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "password");

    let (status, body) = ctx
        .post(
            "/api/v1/adduser",
            &ctx.ceo,
            json!({ "username": "newhire", "password": "weak", "email": "newhire@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "password");

    let (status, created) = ctx
        .post(
            "/api/v1/adduser",
            &ctx.ceo,
            json!({
                "username": "newhire",
                "password": "Welcome#2025",
                "confirmPassword": "Welcome#2025",
                "email": "newhire@example.com",
                "department": "Engineering",
                "role": "DIRECTOR",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["roles"], json!(["DIRECTOR"]));
    assert_eq!(created["status"], "ACTIVE");

    let (status, body) = ctx
        .post(
            "/api/v1/adduser",
            &ctx.ceo,
            json!({ "username": "newhire", "password": "Welcome#2025", "email": "x@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, body) = ctx
        .post(
            "/api/v1/adduser",
            &ctx.ceo,
            json!({ "username": "ghost", "password": "Welcome#2025", "email": "g@example.com", "roles": ["JANITOR"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "roles");

    let user_id = created["userId"].as_str().unwrap();

    let (status, body) = ctx
        .put(
            &format!("/api/v1/updateuser/{}", user_id),
            &ctx.ceo,
            json!({ "username": "renamed" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "username");

    let (status, updated) = ctx
        .put(
            &format!("/api/v1/updateuser/{}", user_id),
            &ctx.ceo,
            json!({
                "username": "newhire",
                "email": "new.hire@example.com",
                "roles": ["NORMAL_USER"],
                "permissions": ["REPORT_VIEW"],
                "password": "",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["email"], "new.hire@example.com");
    assert_eq!(updated["roles"], json!(["NORMAL_USER"]));
    assert_eq!(updated["permissions"], json!(["REPORT_VIEW"]));

    // Empty password left the old one in place
    let (status, _) = ctx
        .call(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({ "username": "newhire", "password": "Welcome#2025" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_user_deactivates_when_referenced() {
    let ctx = TestContext::new().await;
    ctx.create_task(&ctx.director, &ctx.worker, "Keep history").await;

    let (status, body) = ctx
        .call(
            Method::DELETE,
            &format!("/api/v1/deleteuser/{}", ctx.worker.id()),
            Some(&ctx.ceo),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "DEACTIVATED");

    let (status, _) = ctx.get("/api/v1/me", &ctx.worker).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Inactive users cannot receive work
    let (status, body) = ctx
        .post(
            "/api/v1/task/add",
            &ctx.director,
            json!({
                "title": "More work",
                "dueDate": "2030-01-01T00:00:00Z",
                "categories": ["Ops"],
                "assignedTo": ctx.worker.id(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "assignedTo");

    let (status, body) = ctx
        .call(
            Method::DELETE,
            &format!("/api/v1/deleteuser/{}", ctx.outsider.id()),
            Some(&ctx.ceo),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "DELETED");

    let (status, _) = ctx
        .call(
            Method::DELETE,
            &format!("/api/v1/deleteuser/{}", ctx.ceo.id()),
            Some(&ctx.ceo),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_permission_edit_takes_effect_next_request() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx.get("/api/v1/roles", &ctx.director).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, roles) = ctx.get("/api/v1/roles", &ctx.ceo).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles.as_array().unwrap().len(), 4);

    let (status, _) = ctx.get("/api/v1/task/getall", &ctx.worker).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, role) = ctx
        .put(
            "/api/v1/roles/NORMAL_USER/permissions",
            &ctx.ceo,
            json!({ "permissions": ["TASK_VIEW_ALL", "TASK_COMMENT"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", role);
    assert_eq!(role["permissions"], json!(["TASK_VIEW_ALL", "TASK_COMMENT"]));

    let (status, _) = ctx.get("/api/v1/task/getall", &ctx.worker).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .put(
            "/api/v1/roles/NORMAL_USER/permissions",
            &ctx.ceo,
            json!({ "permissions": ["FLY"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .put(
            "/api/v1/roles/JANITOR/permissions",
            &ctx.ceo,
            json!({ "permissions": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report_summary() {
    let ctx = TestContext::new().await;
    let first = ctx.create_task(&ctx.director, &ctx.worker, "One").await;
    ctx.create_task(&ctx.director, &ctx.worker, "Two").await;

    ctx.put(
        &format!("/api/v1/task/duedate/{}", first),
        &ctx.director,
        json!({ "dueDate": "2020-01-01T00:00:00Z" }),
    )
    .await;

    let (status, _) = ctx.get("/api/v1/reports/summary", &ctx.worker).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = ctx.get("/api/v1/reports/summary", &ctx.director).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["totalTasks"], 2);
    assert_eq!(summary["completedTasks"], 0);
    assert_eq!(summary["pendingTasks"], 2);
    assert_eq!(summary["overdueTasks"], 1);
    assert_eq!(summary["byStatus"]["TODO"], 2);
}

#[tokio::test]
async fn test_notification_read_flags() {
    let ctx = TestContext::new().await;
    ctx.create_task(&ctx.director, &ctx.worker, "First").await;
    ctx.create_task(&ctx.director, &ctx.worker, "Second").await;

    let unread_url = format!("/api/v1/notifications/unread/{}", ctx.worker.id());

    let (status, _) = ctx.get(&unread_url, &ctx.director).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, unread) = ctx.get(&unread_url, &ctx.worker).await;
    assert_eq!(status, StatusCode::OK);
    let unread = unread.as_array().unwrap().clone();
    assert_eq!(unread.len(), 2);
    assert!(unread[0]["message"].as_str().unwrap().contains("Second"));

    let read_url = format!(
        "/api/v1/notifications/read/{}",
        unread[0]["id"].as_str().unwrap()
    );

    let (status, _) = ctx.put(&read_url, &ctx.outsider, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for _ in 0..2 {
        let (status, body) = ctx.put(&read_url, &ctx.worker, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["read"], true);
    }

    let (_, remaining) = ctx.get(&unread_url, &ctx.worker).await;
    assert_eq!(remaining.as_array().unwrap().len(), 1);

    let (status, body) = ctx
        .put(
            &format!("/api/v1/notifications/readall/{}", ctx.worker.id()),
            &ctx.worker,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (_, remaining) = ctx.get(&unread_url, &ctx.worker).await;
    assert!(remaining.as_array().unwrap().is_empty());

    let (status, _) = ctx
        .put(
            &format!("/api/v1/notifications/read/{}", uuid::Uuid::new_v4()),
            &ctx.worker,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notification_stream_pushes_own_events() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(
            Method::GET,
            "/api/v1/notifications/stream",
            Some(&ctx.worker.token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let mut body = response.into_body().into_data_stream();

    // Not for the worker; must not show up on their stream
    ctx.create_task(&ctx.ceo, &ctx.outsider, "Not yours").await;
    let task_id = ctx.create_task(&ctx.director, &ctx.worker, "Yours").await;

    let mut received = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !received.contains("\n\n") {
            let chunk = body.next().await.unwrap().unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .unwrap();

    assert!(received.starts_with("event: notification\n"), "{}", received);
    assert!(received.contains(&task_id.to_string()));
    assert!(!received.contains("Not yours"));
}

#[tokio::test]
async fn test_login_reports_primary_role() {
    let ctx = TestContext::new().await;
    let response = ctx
        .send(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({ "username": "ceo", "password": PASSWORD })),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["primaryRole"], "CEO");
}
