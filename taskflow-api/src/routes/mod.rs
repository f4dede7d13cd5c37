/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login, token refresh, current principal
/// - `tasks`: Task lifecycle and comments
/// - `notifications`: Unread list, read flags, SSE feed
/// - `users`: User management
/// - `roles`: Role permission editing
/// - `reports`: Task summary

pub mod auth;
pub mod health;
pub mod notifications;
pub mod reports;
pub mod roles;
pub mod tasks;
pub mod users;
