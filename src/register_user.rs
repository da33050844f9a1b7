//! The route handler for registering a new user account.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error, PasswordHash,
    auth_cookie::set_auth_cookie,
    user::{UserData, create_user},
};

/// The data sent by the client to create a new account.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    /// The email address to register with. Must not be in use by another
    /// account.
    pub email: String,
    /// The plaintext password for the new account.
    pub password: String,
}

/// The state needed to register a new user.
#[derive(Debug, Clone)]
pub struct RegisterUserState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegisterUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegisterUserState> for Key {
    fn from_ref(state: &RegisterUserState) -> Self {
        state.cookie_key.clone()
    }
}

/// Check that `email` looks like an email address.
///
/// This is intentionally lenient. The only way to know whether an address is
/// real is to send mail to it, so this only rejects strings that cannot
/// possibly be one.
fn validate_email(email: &str) -> Result<&str, Error> {
    let email = email.trim();

    let (local_part, domain) = email.split_once('@').ok_or(Error::InvalidEmail)?;

    if local_part.is_empty() || domain.is_empty() {
        return Err(Error::InvalidEmail);
    }

    Ok(email)
}

/// Handler for registration requests via the POST method.
///
/// Creates the account, logs the new user in by setting the auth cookie, and
/// returns the new user's ID and email with a 201 status.
pub async fn post_register_user(
    State(state): State<RegisterUserState>,
    jar: PrivateCookieJar,
    Json(form): Json<RegisterForm>,
) -> Result<Response, Error> {
    let email = validate_email(&form.email)?;
    let password_hash = PasswordHash::from_raw_password(&form.password, PasswordHash::DEFAULT_COST)?;

    let user = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        create_user(email, password_hash, &connection)?
    };

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((StatusCode::CREATED, jar, Json(UserData::from(user))).into_response())
}
