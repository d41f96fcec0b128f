use std::fmt;

use bb8::PooledConnection;
use tracing::debug;

use crate::binding::{PlaceholderStyle, bind_named};
use crate::error::SqlCaddyError;
use crate::mysql::{self, MysqlManager};
use crate::postgres::{self, PgManager};
use crate::results::ResultSet;
use crate::sqlite::{self, SqliteManager};
use crate::types::{Dialect, NamedParams};

/// A pooled connection to one of the supported dialects.
///
/// Dropping it returns the connection to its [`crate::engine::Engine`].
pub enum DbConnection {
    Postgres(PooledConnection<'static, PgManager>),
    Mysql(PooledConnection<'static, MysqlManager>),
    Sqlite(PooledConnection<'static, SqliteManager>),
}

impl fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DbConnection").field(&self.dialect()).finish()
    }
}

impl DbConnection {
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        match self {
            DbConnection::Postgres(_) => Dialect::Postgres,
            DbConnection::Mysql(_) => Dialect::Mysql,
            DbConnection::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Run a statement with `:name` parameters; returns the affected row
    /// count.
    ///
    /// # Errors
    /// Returns `SqlCaddyError::ParameterError` for unbound placeholders, or
    /// the driver error.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<usize, SqlCaddyError> {
        let dialect = DbConnection::dialect(self);
        let bound = bind_named(sql, PlaceholderStyle::for_dialect(dialect), params)?;
        debug!(%dialect, sql = %bound.sql, "execute");
        match self {
            DbConnection::Postgres(client) => {
                postgres::execute(client, &bound.sql, &bound.values).await
            }
            DbConnection::Mysql(conn) => mysql::execute(conn, &bound.sql, &bound.values).await,
            DbConnection::Sqlite(conn) => sqlite::execute(conn, &bound.sql, &bound.values).await,
        }
    }

    /// Run a row-returning statement with `:name` parameters.
    ///
    /// # Errors
    /// Returns `SqlCaddyError::ParameterError` for unbound placeholders, or
    /// the driver error.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<ResultSet, SqlCaddyError> {
        let dialect = DbConnection::dialect(self);
        let bound = bind_named(sql, PlaceholderStyle::for_dialect(dialect), params)?;
        debug!(%dialect, sql = %bound.sql, "query");
        match self {
            DbConnection::Postgres(client) => {
                postgres::query(client, &bound.sql, &bound.values).await
            }
            DbConnection::Mysql(conn) => mysql::query(conn, &bound.sql, &bound.values).await,
            DbConnection::Sqlite(conn) => sqlite::query(conn, &bound.sql, &bound.values).await,
        }
    }

    /// Run raw SQL that may hold several `;`-separated statements. No
    /// placeholder handling.
    ///
    /// # Errors
    /// Returns the driver error.
    pub async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlCaddyError> {
        match self {
            DbConnection::Postgres(client) => postgres::execute_batch(client, sql).await,
            DbConnection::Mysql(conn) => mysql::execute_batch(conn, sql).await,
            DbConnection::Sqlite(conn) => sqlite::execute_batch(conn, sql).await,
        }
    }
}

/// Anything that can lend out its underlying [`DbConnection`]: a bare
/// connection, a [`crate::session::Session`] or an
/// [`crate::admin::AdminConnection`].
///
/// Helpers that accept "a session or a connection" take
/// `&mut impl AsConnection`, so nothing else type-checks.
pub trait AsConnection: Send {
    /// # Errors
    /// Returns `SqlCaddyError::ConnectionError` once the connection has been
    /// released.
    fn as_connection(&mut self) -> Result<&mut DbConnection, SqlCaddyError>;
}

impl AsConnection for DbConnection {
    fn as_connection(&mut self) -> Result<&mut DbConnection, SqlCaddyError> {
        Ok(self)
    }
}

impl<T: AsConnection + ?Sized> AsConnection for &mut T {
    fn as_connection(&mut self) -> Result<&mut DbConnection, SqlCaddyError> {
        (**self).as_connection()
    }
}
