/// Middleware modules for the API server
///
/// - `auth`: bearer-token authentication that resolves the caller's
///   permissions from the directory on every request
/// - `security`: security response headers

pub mod auth;
pub mod security;
