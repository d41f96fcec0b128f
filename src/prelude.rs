//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::admin::{
    AdminConnection, TemporaryDatabase, admin_locator, can_select, create_database,
    database_exists, drop_database, reap, with_admin_connection,
};
pub use crate::connection::{AsConnection, DbConnection};
pub use crate::engine::{Engine, EngineOptions};
pub use crate::error::SqlCaddyError;
pub use crate::locator::{DatabaseLocator, LocatorParts, build_locator, temporary_name};
pub use crate::pg_types::Interval;
pub use crate::quoting::quoted_identifier;
pub use crate::results::{ResultSet, Row};
pub use crate::scoped::{RequestScope, ScopedSessionHandle, SessionRegistry};
pub use crate::session::{Session, with_session};
pub use crate::sql_files::{
    load_sql_from_file, load_sql_from_folder, sql_from_file, sql_from_folder,
    sql_from_folder_iter,
};
pub use crate::statements::{
    ExecOptions, execute_fetchall, execute_fetchone, execute_sql, get_dbtype, sql_to_print,
    table_exists,
};
pub use crate::types::{Dialect, NamedParams, RowValues};
