//! Database lifecycle and session helpers for PostgreSQL, MySQL and SQLite.
//!
//! - [`admin`]: check, create and drop databases, terminate sessions,
//!   temporary databases
//! - [`session`] and [`scoped`]: units of work, per-request sessions
//! - [`statements`] and [`sql_files`]: ad-hoc SQL and `.sql` file loading
//! - [`pg_types`]: PostgreSQL interval and datetime helpers
//!
//! ```rust,no_run
//! use sql_caddy::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlCaddyError> {
//! let target: DatabaseLocator = "postgresql://app@localhost/orders".parse()?;
//! if create_database(&target, None, false).await? {
//!     with_session(&target, async |s| {
//!         load_sql_from_file(s, "schema.sql").await.map(drop)
//!     })
//!     .await?;
//! }
//! drop_database(&target).await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod binding;
pub mod connection;
pub mod engine;
pub mod error;
pub mod locator;
pub mod mysql;
pub mod pg_types;
pub mod postgres;
pub mod prelude;
pub mod quoting;
pub mod results;
pub mod scoped;
pub mod session;
pub mod sql_files;
pub mod sqlite;
pub mod statements;
pub mod types;

#[cfg(feature = "test-utils-postgres")]
pub mod test_utils;

pub use error::SqlCaddyError;
pub use types::{Dialect, NamedParams, RowValues};
