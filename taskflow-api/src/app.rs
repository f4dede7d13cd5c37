/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use taskflow_api::{app::{build_router, AppState}, config::Config};
/// use taskflow_shared::store::Stores;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Stores::in_memory(), config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth::jwt_auth_layer, security::SecurityHeadersLayer},
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use chrono::Duration;
use std::sync::Arc;
use taskflow_shared::{auth::jwt::TokenIssuer, services::Services, store::Stores};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor; every field is
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Workflow services over `stores`
    pub services: Services,

    /// Raw ports, used by the health check
    pub stores: Stores,

    /// Signs and validates access and refresh tokens
    pub tokens: TokenIssuer,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        let tokens = TokenIssuer::new(
            config.jwt.secret.clone(),
            Duration::hours(config.jwt.access_ttl_hours),
        );

        Self {
            services: Services::new(stores.clone()),
            stores,
            tokens,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                         # Health check (public)
/// └── /api/v1/
///     ├── POST /login, /refresh           # public
///     ├── GET  /me
///     ├── /task/
///     │   ├── GET  /getall, /mytask/:user_id, /:task_id
///     │   ├── POST /add, /submit/:task_id
///     │   ├── PUT  /accept/:task_id, /status/:task_id,
///     │   │        /duedate/:task_id, /assign/:task_id
///     │   └── GET|POST /:task_id/comments
///     ├── /notifications/
///     │   ├── GET /unread/:user_id, /stream
///     │   └── PUT /read/:notification_id, /readall/:user_id
///     ├── GET /getusers, POST /adduser,
///     │   PUT /updateuser/:user_id, DELETE /deleteuser/:user_id
///     ├── GET /roles, PUT /roles/:name/permissions
///     └── GET /reports/summary
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (everything under `/api/v1` except login and refresh)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let task_routes = Router::new()
        .route("/getall", get(routes::tasks::list_tasks))
        .route("/mytask/:user_id", get(routes::tasks::list_user_tasks))
        .route("/add", post(routes::tasks::create_task))
        .route("/accept/:task_id", put(routes::tasks::accept_task))
        .route("/submit/:task_id", post(routes::tasks::submit_task))
        .route("/status/:task_id", put(routes::tasks::update_status))
        .route("/duedate/:task_id", put(routes::tasks::update_due_date))
        .route("/assign/:task_id", put(routes::tasks::reassign_task))
        .route("/:task_id", get(routes::tasks::get_task))
        .route(
            "/:task_id/comments",
            get(routes::tasks::list_comments).post(routes::tasks::add_comment),
        );

    let notification_routes = Router::new()
        .route("/unread/:user_id", get(routes::notifications::list_unread))
        .route("/read/:notification_id", put(routes::notifications::mark_read))
        .route("/readall/:user_id", put(routes::notifications::mark_all_read))
        .route("/stream", get(routes::notifications::stream));

    let protected_routes = Router::new()
        .route("/me", get(routes::auth::me))
        .nest("/task", task_routes)
        .nest("/notifications", notification_routes)
        .route("/getusers", get(routes::users::list_users))
        .route("/adduser", post(routes::users::create_user))
        .route("/updateuser/:user_id", put(routes::users::update_user))
        .route("/deleteuser/:user_id", delete(routes::users::delete_user))
        .route("/roles", get(routes::roles::list_roles))
        .route("/roles/:name/permissions", put(routes::roles::set_permissions))
        .route("/reports/summary", get(routes::reports::summary))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new().merge(public_routes).merge(protected_routes);

    let cors = if state.config.api.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
