//! This file defines the route handler for logging in a user.
//! The auth_cookie module handles the lower level cookie logic.

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
    AppState, Error, PasswordHash, ValidatedPassword,
    auth_cookie::set_auth_cookie,
    user::{User, UserData, get_user_by_email},
};

/// The credentials sent by the client to log in.
#[derive(Debug, Deserialize)]
pub struct LogInData {
    /// The email the user registered with.
    pub email: String,
    /// The user's plaintext password.
    pub password: String,
}

/// The state needed to perform a log-in.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request, the auth cookie is set and the user's ID
/// and email are returned. An unknown email and a wrong password both produce
/// the same 401 error, and the unknown-email path still pays the cost of a
/// password hash, so that neither the response nor its timing reveals which
/// emails are registered.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Json(user_data): Json<LogInData>,
) -> Result<Response, Error> {
    let maybe_user: Option<User> = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_email(&user_data.email, &connection) {
            Ok(user) => Some(user),
            Err(Error::NotFound) => None,
            Err(error) => {
                tracing::error!("Unhandled error while verifying credentials: {error}");
                return Err(error);
            }
        }
    };

    let Some(user) = maybe_user else {
        // Hash the password anyway so the timing matches the wrong-password path.
        let _ = PasswordHash::new(
            ValidatedPassword::new_unchecked(&user_data.password),
            PasswordHash::DEFAULT_COST,
        );

        return Err(Error::InvalidCredentials);
    };

    user.password_hash.verify(&user_data.password)?;

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((StatusCode::OK, jar, Json(UserData::from(user))).into_response())
}
