//! The route handler for logging out.

use axum::http::StatusCode;
use axum_extra::extract::PrivateCookieJar;

use crate::auth_cookie::invalidate_auth_cookie;

/// Handler for log-out requests via the POST method.
///
/// Invalidates the auth cookie so that the client is no longer logged in.
pub async fn post_log_out(jar: PrivateCookieJar) -> (StatusCode, PrivateCookieJar) {
    (StatusCode::OK, invalidate_auth_cookie(jar))
}
