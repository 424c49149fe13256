//! SQLite source for dbdump
//!
//! Implements the `Connection` and `SchemaIntrospection` capabilities over
//! `rusqlite`, reading catalog metadata through SQLite's pragma table-valued
//! functions. Row reads stream from a worker thread.

mod connection;
mod cursor;
mod schema;

pub use connection::SqliteConnection;
pub use cursor::SqliteCursor;
