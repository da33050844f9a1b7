//! The integer ID type shared by all database records.

/// An alias for the integer IDs that SQLite assigns to rows.
///
/// User IDs use the [UserID](crate::UserID) newtype instead so that they
/// cannot be mixed up with category or transaction IDs.
pub type DatabaseID = i64;
