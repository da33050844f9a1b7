//! Sets up the application database.

use rusqlite::Connection;

use crate::{
    category::create_category_table, transaction::create_transaction_table,
    user::create_user_table,
};

/// Create the tables for the domain models.
///
/// The statements use `IF NOT EXISTS`, so it is safe to call this function on
/// a database that has already been initialized.
///
/// # Errors
///
/// This function will return an error if any of the SQL queries failed.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    // SQLite leaves foreign key constraints off unless each connection opts in.
    connection.pragma_update(None, "foreign_keys", true)?;

    create_user_table(connection)?;
    create_category_table(connection)?;
    create_transaction_table(connection)?;

    Ok(())
}
