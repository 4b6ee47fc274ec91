//! Rule storage boundary: the trait the engine depends on, its error type,
//! and a SQLite-backed implementation.

pub mod error;
pub mod sqlite;
pub mod traits;
