//! Database lifecycle: existence checks, create, drop, the connection reaper
//! and temporary databases, all driven through a short-lived administrative
//! connection.

mod lifecycle;
mod reaper;
mod temporary;

pub use lifecycle::{can_select, create_database, database_exists, drop_database};
pub use reaper::{kill_query, reap};
pub use temporary::{TEMPORARY_PREFIX, TemporaryDatabase};

use tracing::debug;

use crate::connection::{AsConnection, DbConnection};
use crate::engine::{Engine, EngineOptions};
use crate::error::SqlCaddyError;
use crate::locator::{DatabaseLocator, current_username};
use crate::types::Dialect;

/// Bootstrap database every PostgreSQL server has.
const POSTGRES_ADMIN_DATABASE: &str = "postgres";

/// Where administrative statements for `locator` are run: the `postgres`
/// database on a PostgreSQL server, no default schema on MySQL, the target
/// itself for SQLite.
#[must_use]
pub fn admin_locator(locator: &DatabaseLocator) -> DatabaseLocator {
    match locator.dialect() {
        Dialect::Postgres => {
            let admin = locator.with_database(Some(POSTGRES_ADMIN_DATABASE));
            if admin.username().is_some() {
                admin
            } else {
                admin.with_username(current_username().as_deref())
            }
        }
        Dialect::Mysql => locator.with_database(None),
        Dialect::Sqlite => locator.clone(),
    }
}

/// A connection to the bootstrap database, plus the single-connection pool
/// that owns it.
///
/// Both are released when this value is closed or dropped. PostgreSQL
/// statements autocommit; MySQL sessions run with `sql_mode = 'ANSI'` so
/// double-quoted identifiers work.
pub struct AdminConnection {
    // dropped before the engine so the connection goes back to a live pool
    conn: DbConnection,
    engine: Engine,
}

impl std::fmt::Debug for AdminConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConnection")
            .field("locator", self.engine.locator())
            .finish_non_exhaustive()
    }
}

impl AdminConnection {
    /// Connect to the bootstrap database of `locator`'s server.
    ///
    /// # Errors
    /// Returns the connect error, or the error from the session setup.
    pub async fn open(locator: &DatabaseLocator) -> Result<Self, SqlCaddyError> {
        let admin = admin_locator(locator);
        debug!(locator = %admin.redacted(), "opening admin connection");
        let engine = Engine::with_options(&admin, EngineOptions::default().with_max_size(1)).await?;
        let mut conn = engine.connect().await?;
        if admin.dialect() == Dialect::Mysql {
            debug!("setting ANSI sql_mode on admin connection");
            conn.execute_batch("SET sql_mode = 'ANSI'").await?;
        }
        Ok(Self { conn, engine })
    }

    /// Locator of the bootstrap database this connection is attached to.
    #[must_use]
    pub fn locator(&self) -> &DatabaseLocator {
        self.engine.locator()
    }

    /// Release the connection, then dispose its pool.
    pub fn close(self) {
        let Self { conn, engine } = self;
        drop(conn);
        engine.dispose();
    }
}

impl AsConnection for AdminConnection {
    fn as_connection(&mut self) -> Result<&mut DbConnection, SqlCaddyError> {
        Ok(&mut self.conn)
    }
}

/// Run `f` on an [`AdminConnection`] for `locator`'s server. The connection
/// and its pool are released whatever `f` returns.
///
/// # Errors
/// Returns the connect error or the error from `f`.
pub async fn with_admin_connection<T, F>(
    locator: &DatabaseLocator,
    f: F,
) -> Result<T, SqlCaddyError>
where
    F: AsyncFnOnce(&mut AdminConnection) -> Result<T, SqlCaddyError>,
{
    let mut admin = AdminConnection::open(locator).await?;
    let result = f(&mut admin).await;
    admin.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NamedParams;

    #[test]
    fn admin_targets() {
        let pg: DatabaseLocator = "postgresql://alice@db.internal/app".parse().unwrap();
        let admin = admin_locator(&pg);
        assert_eq!(admin.database(), Some("postgres"));
        assert_eq!(admin.username(), Some("alice"));
        assert_eq!(admin.host(), Some("db.internal"));

        let my: DatabaseLocator = "mysql://root@localhost:3306/app".parse().unwrap();
        assert_eq!(admin_locator(&my).database(), None);

        let lite: DatabaseLocator = "sqlite:///app.db".parse().unwrap();
        assert_eq!(admin_locator(&lite), lite);
    }

    #[tokio::test]
    async fn sqlite_admin_connection_is_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.db");
        let locator: DatabaseLocator = format!("sqlite:///{}", path.display()).parse().unwrap();

        let count = with_admin_connection(&locator, async |admin| {
            let conn = admin.as_connection()?;
            assert_eq!(conn.dialect(), Dialect::Sqlite);
            conn.execute_batch("create table t (x int); insert into t values (1);")
                .await?;
            Ok(conn
                .query("select x from t", &NamedParams::new())
                .await?
                .len())
        })
        .await
        .unwrap();
        assert_eq!(count, 1);
        assert!(path.exists());
    }
}
