//! This file defines the transaction type, its database functions and the
//! route handlers for the transaction REST endpoints.
//!
//! A transaction records money entering or leaving a user's accounts. Like
//! categories, transactions belong to exactly one user and are never visible
//! to anyone else.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::{
    Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
};

use crate::{AppState, DatabaseID, Error, category::get_category, user::UserID};

/// The format dates are sent over the wire and stored in the database in.
const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Whether a transaction adds money to or removes money from the user's
/// accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in, e.g. a salary payment.
    Income,
    /// Money going out, e.g. a supermarket purchase.
    Expense,
}

impl TransactionType {
    /// The transaction type as the string used in the API and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            _ => Err(Error::InvalidTransactionType(s.to_string())),
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single income or expense record.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The transaction's ID in the application database.
    pub id: DatabaseID,
    /// How much money the transaction is for.
    pub amount: f64,
    /// Whether the money came in or went out.
    pub transaction_type: TransactionType,
    /// The date the transaction happened on.
    pub date: Date,
    /// An optional free-form note.
    pub description: Option<String>,
    /// The ID of the category the transaction is labelled with, if any.
    pub category_id: Option<DatabaseID>,
    /// The name of the category the transaction is labelled with, if any.
    pub category_name: Option<String>,
    /// The ID of the user that owns the transaction.
    pub user_id: UserID,
    /// When the transaction was first recorded.
    pub created_at: OffsetDateTime,
    /// When the transaction was last modified.
    pub updated_at: OffsetDateTime,
}

/// A transaction as it appears in responses from the REST API.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    /// The transaction's ID in the application database.
    pub id: DatabaseID,
    /// How much money the transaction is for.
    pub amount: f64,
    /// Whether the money came in or went out.
    pub transaction_type: TransactionType,
    /// The date the transaction happened on.
    #[serde(with = "transaction_date")]
    pub date: Date,
    /// An optional free-form note.
    pub description: Option<String>,
    /// The ID of the category the transaction is labelled with, if any.
    pub category: Option<DatabaseID>,
    /// The name of the referenced category, denormalized for convenience.
    /// Ignored on input.
    pub category_name: Option<String>,
    /// When the transaction was first recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Transaction> for TransactionData {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            amount: transaction.amount,
            transaction_type: transaction.transaction_type,
            date: transaction.date,
            description: transaction.description,
            category: transaction.category_id,
            category_name: transaction.category_name,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }
}

/// Serde helper for (de)serializing dates as "YYYY-MM-DD" strings.
mod transaction_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
    use time::Date;

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = date.format(DATE_FORMAT).map_err(S::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Date::parse(&raw, DATE_FORMAT).map_err(D::Error::custom)
    }
}

/// The data sent by the client to create or update a transaction.
///
/// The owner and the timestamps are always set by the server, never taken
/// from the request body.
#[derive(Debug, Deserialize)]
pub struct TransactionForm {
    /// How much money the transaction is for.
    pub amount: f64,
    /// Whether the money came in or went out.
    pub transaction_type: TransactionType,
    /// The date the transaction happened on.
    #[serde(with = "transaction_date")]
    pub date: Date,
    /// An optional free-form note.
    #[serde(default)]
    pub description: Option<String>,
    /// The ID of the category to label the transaction with, if any. The
    /// category must belong to the requesting user.
    #[serde(default)]
    pub category: Option<DatabaseID>,
}

/// The fields needed to insert or overwrite a transaction, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// How much money the transaction is for.
    pub amount: f64,
    /// Whether the money came in or went out.
    pub transaction_type: TransactionType,
    /// The date the transaction happened on.
    pub date: Date,
    /// An optional free-form note.
    pub description: Option<String>,
    /// The ID of the category to label the transaction with, if any.
    pub category_id: Option<DatabaseID>,
}

impl From<TransactionForm> for NewTransaction {
    fn from(form: TransactionForm) -> Self {
        Self {
            amount: form.amount,
            transaction_type: form.transaction_type,
            date: form.date,
            description: form.description,
            category_id: form.category,
        }
    }
}

/// The order transactions are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOrdering {
    /// Oldest first.
    DateAscending,
    /// Newest first.
    DateDescending,
    /// Smallest amount first.
    AmountAscending,
    /// Largest amount first.
    AmountDescending,
}

impl FromStr for TransactionOrdering {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(TransactionOrdering::DateAscending),
            "-date" => Ok(TransactionOrdering::DateDescending),
            "amount" => Ok(TransactionOrdering::AmountAscending),
            "-amount" => Ok(TransactionOrdering::AmountDescending),
            _ => Err(Error::InvalidOrdering(s.to_string())),
        }
    }
}

impl TransactionOrdering {
    /// The ORDER BY clause for this ordering. The transaction ID is used as a
    /// tie-breaker so the order is stable across requests.
    fn as_sql(&self) -> &'static str {
        match self {
            TransactionOrdering::DateAscending => "t.date ASC, t.id ASC",
            TransactionOrdering::DateDescending => "t.date DESC, t.id DESC",
            TransactionOrdering::AmountAscending => "t.amount ASC, t.id ASC",
            TransactionOrdering::AmountDescending => "t.amount DESC, t.id DESC",
        }
    }
}

/// The ORDER BY clause used when the client does not ask for an ordering:
/// newest first, with the most recently recorded transaction winning ties.
const DEFAULT_ORDERING_SQL: &str = "t.date DESC, t.created_at DESC, t.id DESC";

/// The raw query parameters accepted by the transaction list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListParams {
    /// Only list transactions labelled with this category ID.
    pub category: Option<DatabaseID>,
    /// Only list transactions of this type ("income" or "expense").
    pub transaction_type: Option<String>,
    /// Only list transactions that happened on this date ("YYYY-MM-DD").
    pub date: Option<String>,
    /// List transactions in this order ("date", "-date", "amount" or
    /// "-amount").
    pub ordering: Option<String>,
}

impl TransactionListParams {
    /// Parse the raw query parameters into a [TransactionFilter].
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidTransactionType], [Error::InvalidDateFormat]
    /// or [Error::InvalidOrdering] if the corresponding parameter cannot be
    /// parsed.
    pub fn parse(self) -> Result<TransactionFilter, Error> {
        let transaction_type = self
            .transaction_type
            .map(|raw| raw.parse::<TransactionType>())
            .transpose()?;

        let date = self
            .date
            .map(|raw| Date::parse(&raw, DATE_FORMAT).map_err(|_| Error::InvalidDateFormat(raw)))
            .transpose()?;

        let ordering = self
            .ordering
            .map(|raw| raw.parse::<TransactionOrdering>())
            .transpose()?;

        Ok(TransactionFilter {
            category: self.category,
            transaction_type,
            date,
            ordering,
        })
    }
}

/// A validated filter for the transaction list.
#[derive(Debug, Default, PartialEq)]
pub struct TransactionFilter {
    /// Only list transactions labelled with this category ID.
    pub category: Option<DatabaseID>,
    /// Only list transactions of this type.
    pub transaction_type: Option<TransactionType>,
    /// Only list transactions that happened on this date.
    pub date: Option<Date>,
    /// List transactions in this order. Defaults to newest first.
    pub ordering: Option<TransactionOrdering>,
}

/// The state needed for the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionEndpointState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

impl TransactionEndpointState {
    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }
}

/// Handler for listing the requesting user's transactions via the GET method.
///
/// Supports filtering by category, transaction type and date, and ordering by
/// date or amount in either direction.
pub async fn get_transaction_list(
    State(state): State<TransactionEndpointState>,
    Extension(user_id): Extension<UserID>,
    Query(params): Query<TransactionListParams>,
) -> Result<Response, Error> {
    let filter = params.parse()?;

    let connection = state.lock_connection()?;
    let transactions = get_transactions(user_id, &filter, &connection)?;

    let transaction_data: Vec<TransactionData> =
        transactions.into_iter().map(TransactionData::from).collect();

    Ok(Json(transaction_data).into_response())
}

/// Handler for creating a transaction via the POST method.
pub async fn post_transaction(
    State(state): State<TransactionEndpointState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<TransactionForm>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let transaction = create_transaction(NewTransaction::from(form), user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(TransactionData::from(transaction))).into_response())
}

/// Handler for fetching a single transaction via the GET method.
///
/// Asking for a transaction owned by another user produces the same 404
/// response as asking for a transaction that does not exist, so that the
/// response does not reveal which IDs are in use.
pub async fn get_transaction_detail(
    State(state): State<TransactionEndpointState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let transaction = get_transaction(transaction_id, user_id, &connection)?;

    Ok(Json(TransactionData::from(transaction)).into_response())
}

/// Handler for overwriting a transaction via the PUT method.
pub async fn put_transaction(
    State(state): State<TransactionEndpointState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<DatabaseID>,
    Json(form): Json<TransactionForm>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let transaction = update_transaction(
        transaction_id,
        NewTransaction::from(form),
        user_id,
        &connection,
    )?;

    Ok(Json(TransactionData::from(transaction)).into_response())
}

/// Handler for deleting a transaction via the DELETE method.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionEndpointState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    delete_transaction(transaction_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Create the transaction table.
///
/// "transaction" is an SQL keyword, hence the quoting.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            amount REAL NOT NULL,
            transaction_type TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT,
            category_id INTEGER,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date
            ON \"transaction\" (user_id, date)",
        (),
    )?;

    Ok(())
}

/// Check that the category a transaction refers to exists and belongs to
/// `user_id`.
///
/// A category that exists but belongs to another user is reported the same
/// way as one that does not exist.
fn validate_category_reference(
    category_id: Option<DatabaseID>,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let Some(category_id) = category_id else {
        return Ok(());
    };

    match get_category(category_id, user_id, connection) {
        Ok(_) => Ok(()),
        Err(Error::NotFound) => Err(Error::InvalidCategory(category_id)),
        Err(error) => Err(error),
    }
}

/// Create and insert a new transaction for `user_id` into the database.
///
/// The `created_at` and `updated_at` timestamps are set to the current time.
///
/// # Errors
///
/// Returns an [Error::InvalidCategory] if the transaction refers to a
/// category that does not exist or belongs to another user, or an
/// [Error::SqlError] if there was an SQL related error.
pub fn create_transaction(
    new_transaction: NewTransaction,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_category_reference(new_transaction.category_id, user_id, connection)?;

    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO \"transaction\" (amount, transaction_type, date, description, category_id, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            new_transaction.amount,
            new_transaction.transaction_type.as_str(),
            new_transaction.date,
            &new_transaction.description,
            new_transaction.category_id,
            user_id.as_i64(),
            now,
            now,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_transaction(id, user_id, connection)
}

const SELECT_TRANSACTION: &str = "SELECT t.id, t.amount, t.transaction_type, t.date, t.description, t.category_id, t.user_id, t.created_at, t.updated_at, c.name
    FROM \"transaction\" t
    LEFT JOIN category c ON t.category_id = c.id";

/// Get the transaction with `transaction_id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the transaction does not exist or belongs
/// to another user, or an [Error::SqlError] if there was an SQL related
/// error.
pub fn get_transaction(
    transaction_id: DatabaseID,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "{SELECT_TRANSACTION} WHERE t.id = :id AND t.user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &transaction_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Get the transactions owned by `user_id` that match `filter`.
///
/// An empty vector is returned if no transactions match.
///
/// # Errors
///
/// This function will return an error if there was an SQL related error.
pub fn get_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut query = format!("{SELECT_TRANSACTION} WHERE t.user_id = ?1");
    let mut params: Vec<Value> = vec![Value::Integer(user_id.as_i64())];

    if let Some(category_id) = filter.category {
        params.push(Value::Integer(category_id));
        query.push_str(&format!(" AND t.category_id = ?{}", params.len()));
    }

    if let Some(transaction_type) = filter.transaction_type {
        params.push(Value::Text(transaction_type.as_str().to_string()));
        query.push_str(&format!(" AND t.transaction_type = ?{}", params.len()));
    }

    if let Some(date) = filter.date {
        let formatted = date
            .format(DATE_FORMAT)
            .map_err(|_| Error::InvalidDateFormat(date.to_string()))?;
        params.push(Value::Text(formatted));
        query.push_str(&format!(" AND t.date = ?{}", params.len()));
    }

    let ordering_sql = filter
        .ordering
        .map(|ordering| ordering.as_sql())
        .unwrap_or(DEFAULT_ORDERING_SQL);
    query.push_str(&format!(" ORDER BY {ordering_sql}"));

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params), map_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the transaction with `transaction_id` owned by `user_id`.
///
/// The `updated_at` timestamp is set to the current time. Returns the updated
/// transaction.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if the transaction does not exist or belongs to
///   another user.
/// - [Error::InvalidCategory] if the new data refers to a category that does
///   not exist or belongs to another user.
/// - [Error::SqlError] if there was an SQL related error.
pub fn update_transaction(
    transaction_id: DatabaseID,
    new_transaction: NewTransaction,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_category_reference(new_transaction.category_id, user_id, connection)?;

    let rows_affected = connection.execute(
        "UPDATE \"transaction\"
            SET amount = ?1, transaction_type = ?2, date = ?3, description = ?4, category_id = ?5, updated_at = ?6
            WHERE id = ?7 AND user_id = ?8",
        (
            new_transaction.amount,
            new_transaction.transaction_type.as_str(),
            new_transaction.date,
            &new_transaction.description,
            new_transaction.category_id,
            OffsetDateTime::now_utc(),
            transaction_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_transaction(transaction_id, user_id, connection)
}

/// Delete the transaction with `transaction_id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the transaction does not exist or belongs
/// to another user, or an [Error::SqlError] if there was an SQL related
/// error.
pub fn delete_transaction(
    transaction_id: DatabaseID,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (transaction_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let raw_transaction_type: String = row.get(2)?;
    let date = row.get(3)?;
    let description = row.get(4)?;
    let category_id = row.get(5)?;
    let raw_user_id = row.get(6)?;
    let created_at = row.get(7)?;
    let updated_at = row.get(8)?;
    let category_name = row.get(9)?;

    let transaction_type = raw_transaction_type.parse().map_err(|error: Error| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            error.to_string().into(),
        )
    })?;

    Ok(Transaction {
        id,
        amount,
        transaction_type,
        date,
        description,
        category_id,
        category_name,
        user_id: UserID::new(raw_user_id),
        created_at,
        updated_at,
    })
}




#[cfg(test)]
mod transaction_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error, PasswordHash,
        category::{CategoryName, create_category},
        db::initialize,
        user::{UserID, create_user},
    };

    use super::{
        NewTransaction, TransactionFilter, TransactionOrdering, TransactionType,
        create_transaction, delete_transaction, get_transaction, get_transactions,
        update_transaction,
    };

    fn get_db_connection() -> Connection {
        let connection =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        connection
    }

    fn create_test_user(email: &str, connection: &Connection) -> UserID {
        create_user(email, PasswordHash::new_unchecked("hunter2"), connection)
            .expect("Could not create test user")
            .id
    }

    fn new_transaction(amount: f64) -> NewTransaction {
        NewTransaction {
            amount,
            transaction_type: TransactionType::Expense,
            date: date!(2024 - 07 - 15),
            description: None,
            category_id: None,
        }
    }

    #[test]
    fn insert_transaction_succeeds() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let category = create_category(
            CategoryName::new_unchecked("Groceries"),
            user_id,
            &connection,
        )
        .unwrap();

        let transaction = create_transaction(
            NewTransaction {
                amount: 42.5,
                transaction_type: TransactionType::Expense,
                date: date!(2024 - 07 - 15),
                description: Some("Weekly shop".to_string()),
                category_id: Some(category.id),
            },
            user_id,
            &connection,
        )
        .unwrap();

        assert!(transaction.id > 0);
        assert_eq!(transaction.amount, 42.5);
        assert_eq!(transaction.transaction_type, TransactionType::Expense);
        assert_eq!(transaction.date, date!(2024 - 07 - 15));
        assert_eq!(transaction.description.as_deref(), Some("Weekly shop"));
        assert_eq!(transaction.category_id, Some(category.id));
        assert_eq!(transaction.category_name.as_deref(), Some("Groceries"));
        assert_eq!(transaction.user_id, user_id);
        assert_eq!(transaction.created_at, transaction.updated_at);
    }

    #[test]
    fn insert_transaction_fails_with_other_users_category() {
        let connection = get_db_connection();
        let alice = create_test_user("alice@example.com", &connection);
        let bob = create_test_user("bob@example.com", &connection);
        let alices_category =
            create_category(CategoryName::new_unchecked("Groceries"), alice, &connection).unwrap();

        let result = create_transaction(
            NewTransaction {
                category_id: Some(alices_category.id),
                ..new_transaction(9.99)
            },
            bob,
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidCategory(alices_category.id)));
    }

    #[test]
    fn insert_transaction_fails_with_nonexistent_category() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);

        let result = create_transaction(
            NewTransaction {
                category_id: Some(999),
                ..new_transaction(9.99)
            },
            user_id,
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidCategory(999)));
    }

    #[test]
    fn get_transaction_fails_for_other_users_transaction() {
        let connection = get_db_connection();
        let alice = create_test_user("alice@example.com", &connection);
        let bob = create_test_user("bob@example.com", &connection);
        let transaction = create_transaction(new_transaction(9.99), alice, &connection).unwrap();

        assert_eq!(
            get_transaction(transaction.id, bob, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn list_uses_newest_first_ordering_by_default() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let older = create_transaction(
            NewTransaction {
                date: date!(2024 - 07 - 01),
                ..new_transaction(1.0)
            },
            user_id,
            &connection,
        )
        .unwrap();
        let newer = create_transaction(
            NewTransaction {
                date: date!(2024 - 07 - 20),
                ..new_transaction(2.0)
            },
            user_id,
            &connection,
        )
        .unwrap();

        let transactions =
            get_transactions(user_id, &TransactionFilter::default(), &connection).unwrap();

        assert_eq!(transactions, vec![newer, older]);
    }

    #[test]
    fn list_breaks_date_ties_by_most_recently_created() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let first = create_transaction(new_transaction(1.0), user_id, &connection).unwrap();
        let second = create_transaction(new_transaction(2.0), user_id, &connection).unwrap();

        let transactions =
            get_transactions(user_id, &TransactionFilter::default(), &connection).unwrap();

        assert_eq!(transactions, vec![second, first]);
    }

    #[test]
    fn list_only_returns_own_transactions() {
        let connection = get_db_connection();
        let alice = create_test_user("alice@example.com", &connection);
        let bob = create_test_user("bob@example.com", &connection);
        let alices = create_transaction(new_transaction(1.0), alice, &connection).unwrap();
        create_transaction(new_transaction(2.0), bob, &connection).unwrap();

        let transactions =
            get_transactions(alice, &TransactionFilter::default(), &connection).unwrap();

        assert_eq!(transactions, vec![alices]);
    }

    #[test]
    fn list_filters_by_category() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let groceries = create_category(
            CategoryName::new_unchecked("Groceries"),
            user_id,
            &connection,
        )
        .unwrap();
        let in_category = create_transaction(
            NewTransaction {
                category_id: Some(groceries.id),
                ..new_transaction(1.0)
            },
            user_id,
            &connection,
        )
        .unwrap();
        create_transaction(new_transaction(2.0), user_id, &connection).unwrap();

        let filter = TransactionFilter {
            category: Some(groceries.id),
            ..Default::default()
        };
        let transactions = get_transactions(user_id, &filter, &connection).unwrap();

        assert_eq!(transactions, vec![in_category]);
    }

    #[test]
    fn list_filters_by_transaction_type() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let income = create_transaction(
            NewTransaction {
                transaction_type: TransactionType::Income,
                ..new_transaction(100.0)
            },
            user_id,
            &connection,
        )
        .unwrap();
        create_transaction(new_transaction(2.0), user_id, &connection).unwrap();

        let filter = TransactionFilter {
            transaction_type: Some(TransactionType::Income),
            ..Default::default()
        };
        let transactions = get_transactions(user_id, &filter, &connection).unwrap();

        assert_eq!(transactions, vec![income]);
    }

    #[test]
    fn list_filters_by_date() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let on_date = create_transaction(
            NewTransaction {
                date: date!(2024 - 07 - 01),
                ..new_transaction(1.0)
            },
            user_id,
            &connection,
        )
        .unwrap();
        create_transaction(new_transaction(2.0), user_id, &connection).unwrap();

        let filter = TransactionFilter {
            date: Some(date!(2024 - 07 - 01)),
            ..Default::default()
        };
        let transactions = get_transactions(user_id, &filter, &connection).unwrap();

        assert_eq!(transactions, vec![on_date]);
    }

    #[test]
    fn list_orders_by_amount() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let medium = create_transaction(new_transaction(5.0), user_id, &connection).unwrap();
        let large = create_transaction(new_transaction(10.0), user_id, &connection).unwrap();
        let small = create_transaction(new_transaction(1.0), user_id, &connection).unwrap();

        let ascending = get_transactions(
            user_id,
            &TransactionFilter {
                ordering: Some(TransactionOrdering::AmountAscending),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        let descending = get_transactions(
            user_id,
            &TransactionFilter {
                ordering: Some(TransactionOrdering::AmountDescending),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();

        assert_eq!(ascending, vec![small.clone(), medium.clone(), large.clone()]);
        assert_eq!(descending, vec![large, medium, small]);
    }

    #[test]
    fn list_combines_filters() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let groceries = create_category(
            CategoryName::new_unchecked("Groceries"),
            user_id,
            &connection,
        )
        .unwrap();
        let matching = create_transaction(
            NewTransaction {
                transaction_type: TransactionType::Expense,
                category_id: Some(groceries.id),
                ..new_transaction(1.0)
            },
            user_id,
            &connection,
        )
        .unwrap();
        // same category, wrong type
        create_transaction(
            NewTransaction {
                transaction_type: TransactionType::Income,
                category_id: Some(groceries.id),
                ..new_transaction(2.0)
            },
            user_id,
            &connection,
        )
        .unwrap();

        let filter = TransactionFilter {
            category: Some(groceries.id),
            transaction_type: Some(TransactionType::Expense),
            ..Default::default()
        };
        let transactions = get_transactions(user_id, &filter, &connection).unwrap();

        assert_eq!(transactions, vec![matching]);
    }

    #[test]
    fn update_transaction_overwrites_fields() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let inserted = create_transaction(new_transaction(1.0), user_id, &connection).unwrap();

        let updated = update_transaction(
            inserted.id,
            NewTransaction {
                amount: 99.0,
                transaction_type: TransactionType::Income,
                date: date!(2024 - 08 - 01),
                description: Some("Refund".to_string()),
                category_id: None,
            },
            user_id,
            &connection,
        )
        .unwrap();

        assert_eq!(updated.id, inserted.id);
        assert_eq!(updated.amount, 99.0);
        assert_eq!(updated.transaction_type, TransactionType::Income);
        assert_eq!(updated.date, date!(2024 - 08 - 01));
        assert_eq!(updated.description.as_deref(), Some("Refund"));
        assert_eq!(updated.created_at, inserted.created_at);
        assert!(updated.updated_at >= inserted.updated_at);
    }

    #[test]
    fn update_transaction_fails_for_other_users_transaction() {
        let connection = get_db_connection();
        let alice = create_test_user("alice@example.com", &connection);
        let bob = create_test_user("bob@example.com", &connection);
        let inserted = create_transaction(new_transaction(1.0), alice, &connection).unwrap();

        let result = update_transaction(inserted.id, new_transaction(2.0), bob, &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_transaction_fails_with_other_users_category() {
        let connection = get_db_connection();
        let alice = create_test_user("alice@example.com", &connection);
        let bob = create_test_user("bob@example.com", &connection);
        let bobs_category =
            create_category(CategoryName::new_unchecked("Secrets"), bob, &connection).unwrap();
        let inserted = create_transaction(new_transaction(1.0), alice, &connection).unwrap();

        let result = update_transaction(
            inserted.id,
            NewTransaction {
                category_id: Some(bobs_category.id),
                ..new_transaction(1.0)
            },
            alice,
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidCategory(bobs_category.id)));
    }

    #[test]
    fn delete_transaction_removes_row() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let inserted = create_transaction(new_transaction(1.0), user_id, &connection).unwrap();

        delete_transaction(inserted.id, user_id, &connection).unwrap();

        assert_eq!(
            get_transaction(inserted.id, user_id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_transaction_fails_for_other_users_transaction() {
        let connection = get_db_connection();
        let alice = create_test_user("alice@example.com", &connection);
        let bob = create_test_user("bob@example.com", &connection);
        let inserted = create_transaction(new_transaction(1.0), alice, &connection).unwrap();

        assert_eq!(
            delete_transaction(inserted.id, bob, &connection),
            Err(Error::NotFound)
        );
        assert!(get_transaction(inserted.id, alice, &connection).is_ok());
    }

    #[test]
    fn deleting_category_clears_reference_but_keeps_transaction() {
        let connection = get_db_connection();
        let user_id = create_test_user("alice@example.com", &connection);
        let category = create_category(
            CategoryName::new_unchecked("Groceries"),
            user_id,
            &connection,
        )
        .unwrap();
        let transaction = create_transaction(
            NewTransaction {
                category_id: Some(category.id),
                ..new_transaction(1.0)
            },
            user_id,
            &connection,
        )
        .unwrap();

        crate::category::delete_category(category.id, user_id, &connection).unwrap();

        let transaction = get_transaction(transaction.id, user_id, &connection).unwrap();
        assert_eq!(transaction.category_id, None);
        assert_eq!(transaction.category_name, None);
    }
}
