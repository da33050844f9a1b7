//! This file defines the category type, its database functions and the route
//! handlers for the category REST endpoints.
//!
//! Categories let a user label their transactions (e.g. "Groceries", "Rent").
//! Every category belongs to exactly one user and is never visible to anyone
//! else.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{AppState, DatabaseID, Error, user::UserID};

/// The name of a category.
///
/// The name must contain at least one non-whitespace character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a new category name.
    ///
    /// Leading and trailing whitespace is removed.
    ///
    /// # Errors
    ///
    /// Returns an [Error::EmptyCategoryName] if `name` is empty or blank.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            return Err(Error::EmptyCategoryName);
        }

        Ok(Self(name.to_string()))
    }

    /// Create a new category name without validation.
    ///
    /// The caller should ensure that `name` is not empty or blank.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if an invalid name
    /// is provided it may cause incorrect behaviour but will not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A label that a user can attach to their transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The category's ID in the application database.
    pub id: DatabaseID,
    /// The category's name.
    pub name: CategoryName,
    /// The ID of the user that owns the category.
    pub user_id: UserID,
}

/// A category as it appears in responses from the REST API.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    /// The category's ID in the application database.
    pub id: DatabaseID,
    /// The category's name.
    pub name: String,
    /// The ID of the user that owns the category.
    pub user: UserID,
}

impl From<Category> for CategoryData {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name.0,
            user: category.user_id,
        }
    }
}

/// The data sent by the client to create or update a category.
///
/// The owner is always taken from the auth cookie, never from the request
/// body.
#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    /// The name for the category.
    pub name: String,
}

/// The state needed for the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryEndpointState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

impl CategoryEndpointState {
    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }
}

/// Handler for listing the requesting user's categories via the GET method.
pub async fn get_category_list(
    State(state): State<CategoryEndpointState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let categories = get_categories_by_user(user_id, &connection)?;

    let category_data: Vec<CategoryData> = categories.into_iter().map(CategoryData::from).collect();

    Ok(Json(category_data).into_response())
}

/// Handler for creating a category via the POST method.
pub async fn post_category(
    State(state): State<CategoryEndpointState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<CategoryForm>,
) -> Result<Response, Error> {
    let name = CategoryName::new(&form.name)?;

    let connection = state.lock_connection()?;
    let category = create_category(name, user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(CategoryData::from(category))).into_response())
}

/// Handler for fetching a single category via the GET method.
///
/// Asking for a category owned by another user produces the same 404 response
/// as asking for a category that does not exist, so that the response does
/// not reveal which IDs are in use.
pub async fn get_category_detail(
    State(state): State<CategoryEndpointState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let category = get_category(category_id, user_id, &connection)?;

    Ok(Json(CategoryData::from(category)).into_response())
}

/// Handler for renaming a category via the PUT method.
pub async fn put_category(
    State(state): State<CategoryEndpointState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<DatabaseID>,
    Json(form): Json<CategoryForm>,
) -> Result<Response, Error> {
    let name = CategoryName::new(&form.name)?;

    let connection = state.lock_connection()?;
    let category = update_category(category_id, name, user_id, &connection)?;

    Ok(Json(CategoryData::from(category)).into_response())
}

/// Handler for deleting a category via the DELETE method.
///
/// Transactions that referred to the deleted category keep existing but lose
/// the reference.
pub async fn delete_category_endpoint(
    State(state): State<CategoryEndpointState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    delete_category(category_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Create the category table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new category for `user_id` into the database.
///
/// # Errors
///
/// This function will return an error if there was an SQL related error.
pub fn create_category(
    name: CategoryName,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (name, user_id) VALUES (?1, ?2)",
        (name.as_ref(), user_id.as_i64()),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        name,
        user_id,
    })
}

/// Get the category with `category_id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the category does not exist or belongs to
/// another user, or an [Error::SqlError] if there was an SQL related error.
pub fn get_category(
    category_id: DatabaseID,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, user_id FROM category WHERE id = :id AND user_id = :user_id")?
        .query_row(
            &[(":id", &category_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Get all categories owned by `user_id`, ordered by ID.
///
/// An empty vector is returned if the user has no categories.
///
/// # Errors
///
/// This function will return an error if there was an SQL related error.
pub fn get_categories_by_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, user_id FROM category WHERE user_id = :user_id ORDER BY id ASC")?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Rename the category with `category_id` owned by `user_id`.
///
/// Returns the updated category.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the category does not exist or belongs to
/// another user, or an [Error::SqlError] if there was an SQL related error.
pub fn update_category(
    category_id: DatabaseID,
    name: CategoryName,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET name = ?1 WHERE id = ?2 AND user_id = ?3",
        (name.as_ref(), category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(Category {
        id: category_id,
        name,
        user_id,
    })
}

/// Delete the category with `category_id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the category does not exist or belongs to
/// another user, or an [Error::SqlError] if there was an SQL related error.
pub fn delete_category(
    category_id: DatabaseID,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let raw_user_id = row.get(2)?;

    Ok(Category {
        id,
        name: CategoryName::new_unchecked(&raw_name),
        user_id: UserID::new(raw_user_id),
    })
}



#[cfg(test)]
mod category_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::{Path, State}, http::StatusCode};
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash,
        db::initialize,
        user::{UserID, create_user},
    };

    use super::{
        CategoryData, CategoryEndpointState, CategoryForm, CategoryName, create_category,
        delete_category_endpoint, get_category, get_category_detail, get_category_list,
        post_category, put_category,
    };

    fn get_test_state() -> (CategoryEndpointState, UserID) {
        let connection =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");
        let user_id = create_user(
            "alice@example.com",
            PasswordHash::new_unchecked("hunter2"),
            &connection,
        )
        .expect("Could not create test user")
        .id;

        (
            CategoryEndpointState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            user_id,
        )
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Could not read response body");

        serde_json::from_slice(&body).expect("Response body was not valid JSON")
    }

    #[tokio::test]
    async fn post_category_creates_category_for_requesting_user() {
        let (state, user_id) = get_test_state();

        let response = post_category(
            State(state),
            Extension(user_id),
            Json(CategoryForm {
                name: "Groceries".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        assert_eq!(body["name"], "Groceries");
        assert_eq!(body["user"], user_id.as_i64());
    }

    #[tokio::test]
    async fn post_category_fails_with_blank_name() {
        let (state, user_id) = get_test_state();

        let result = post_category(
            State(state),
            Extension(user_id),
            Json(CategoryForm {
                name: "  ".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::EmptyCategoryName)));
    }

    #[tokio::test]
    async fn get_category_list_returns_own_categories() {
        let (state, user_id) = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            create_category(CategoryName::new_unchecked("Groceries"), user_id, &connection)
                .unwrap();
            create_category(CategoryName::new_unchecked("Rent"), user_id, &connection).unwrap();
        }

        let response = get_category_list(State(state), Extension(user_id))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        let categories: Vec<CategoryData> = serde_json::from_value(body).unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Groceries");
        assert_eq!(categories[1].name, "Rent");
    }

    #[tokio::test]
    async fn get_category_detail_fails_with_unknown_id() {
        let (state, user_id) = get_test_state();

        let result = get_category_detail(State(state), Extension(user_id), Path(999)).await;

        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn put_category_renames() {
        let (state, user_id) = get_test_state();
        let category_id = {
            let connection = state.db_connection.lock().unwrap();
            create_category(CategoryName::new_unchecked("Grocceries"), user_id, &connection)
                .unwrap()
                .id
        };

        let response = put_category(
            State(state),
            Extension(user_id),
            Path(category_id),
            Json(CategoryForm {
                name: "Groceries".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["name"], "Groceries");
    }

    #[tokio::test]
    async fn delete_category_returns_no_content() {
        let (state, user_id) = get_test_state();
        let category_id = {
            let connection = state.db_connection.lock().unwrap();
            create_category(CategoryName::new_unchecked("Rent"), user_id, &connection)
                .unwrap()
                .id
        };

        let response =
            delete_category_endpoint(State(state.clone()), Extension(user_id), Path(category_id))
                .await
                .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(
            get_category(category_id, user_id, &connection),
            Err(Error::NotFound)
        );
    }
}
