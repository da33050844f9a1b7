//! Fintrack is a REST API for tracking personal income and expenses.
//!
//! The API exposes two resources, categories and transactions, that are
//! scoped to the authenticated user: every query filters by the owner and
//! newly created records are stamped with the requesting user's ID.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod auth_cookie;
mod auth_middleware;
mod category;
mod database_id;
mod db;
mod endpoints;
mod log_in;
mod log_out;
mod logging;
mod password;
mod register_user;
mod routing;
mod state;
mod transaction;
mod user;

pub use database_id::DatabaseID;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use state::AppState;
pub use user::{User, UserID, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an email and password combination that does not
    /// match a registered user.
    ///
    /// The same error is used for an unknown email and a wrong password so
    /// that the response does not reveal which emails are registered.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth cookie is missing from the request or could not be parsed.
    #[error("authentication required")]
    CookieMissing,

    /// The auth cookie is present but its token has expired.
    #[error("the session has expired, please log in again")]
    CookieExpired,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// The client receives a generic internal server error instead.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email used to register already belongs to another user.
    #[error("the email is already in use")]
    DuplicateEmail,

    /// The string used to register is not a plausible email address.
    #[error("invalid email address")]
    InvalidEmail,

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// The category ID on a transaction does not refer to a category owned
    /// by the requesting user.
    #[error("the category ID does not refer to one of your categories")]
    InvalidCategory(DatabaseID),

    /// The transaction type is not one of the known values.
    #[error("{0:?} is not a valid transaction type, expected \"income\" or \"expense\"")]
    InvalidTransactionType(String),

    /// A date string could not be parsed as a calendar date.
    #[error("{0:?} is not a valid date, expected the format YYYY-MM-DD")]
    InvalidDateFormat(String),

    /// The ordering query parameter is not one of the known values.
    #[error(
        "{0:?} is not a valid ordering, expected one of \"date\", \"-date\", \"amount\" or \"-amount\""
    )]
    InvalidOrdering(String),

    /// The requested resource was not found.
    ///
    /// Records owned by another user are indistinguishable from records that
    /// do not exist, so requests for them also produce this error.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An error occurred while serializing a struct as JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            // FOREIGN KEY failures (extended code 787) also land here:
            // SQLite's message does not name the violated constraint, and
            // category references are validated before any insert.
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// The JSON body used for all error responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::InvalidCredentials | Error::CookieMissing | Error::CookieExpired => {
                StatusCode::UNAUTHORIZED
            }
            Error::TooWeak(_)
            | Error::DuplicateEmail
            | Error::InvalidEmail
            | Error::EmptyCategoryName
            | Error::InvalidCategory(_)
            | Error::InvalidTransactionType(_)
            | Error::InvalidDateFormat(_)
            | Error::InvalidOrdering(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::HashingError(_)
            | Error::JSONSerializationError(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are logged on the server, not shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);

            ErrorBody {
                error: "an internal error occurred, check the server logs for details".to_owned(),
            }
        } else {
            ErrorBody {
                error: self.to_string(),
            }
        };

        (status, Json(body)).into_response()
    }
}
