//! `SQLite` backend: rusqlite connections behind a tokio mutex, driven from
//! `spawn_blocking`.

mod manager;
mod params;
mod query;

pub use manager::{SharedSqliteConnection, SqliteManager, sqlite_path};
pub(crate) use manager::run_blocking;
pub(crate) use query::{execute, execute_batch, query};
