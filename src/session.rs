//! Units of work: a connection with an open transaction.

use tracing::{debug, warn};

use crate::connection::{AsConnection, DbConnection};
use crate::engine::Engine;
use crate::error::SqlCaddyError;
use crate::locator::DatabaseLocator;
use crate::types::Dialect;

/// A connection inside an explicit transaction.
///
/// Finish with [`Session::commit`] or [`Session::rollback`]. Dropping a
/// session with the transaction still open spawns a best-effort rollback on
/// the current tokio runtime.
pub struct Session {
    // declared before `engine` so the connection goes back to the pool first
    conn: Option<DbConnection>,
    engine: Option<Engine>,
    in_transaction: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conn", &self.conn)
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

fn begin_statement(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres | Dialect::Sqlite => "BEGIN",
        Dialect::Mysql => "START TRANSACTION",
    }
}

impl Session {
    /// Start a transaction on an already checked-out connection.
    ///
    /// # Errors
    /// Returns the driver error if `BEGIN` fails.
    pub async fn begin(mut conn: DbConnection) -> Result<Self, SqlCaddyError> {
        conn.execute_batch(begin_statement(conn.dialect())).await?;
        Ok(Self {
            conn: Some(conn),
            engine: None,
            in_transaction: true,
        })
    }

    /// Build an engine for `locator`, check out a connection and begin.
    /// The engine is disposed together with the session.
    ///
    /// # Errors
    /// Returns connect or `BEGIN` failures.
    pub async fn open(locator: &DatabaseLocator) -> Result<Self, SqlCaddyError> {
        let engine = Engine::new(locator).await?;
        let mut session = Self::begin(engine.connect().await?).await?;
        session.engine = Some(engine);
        Ok(session)
    }

    /// Start a transaction on a fresh connection from `engine`.
    ///
    /// # Errors
    /// Returns connect or `BEGIN` failures.
    pub async fn from_engine(engine: &Engine) -> Result<Self, SqlCaddyError> {
        Self::begin(engine.connect().await?).await
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.in_transaction
    }

    /// # Errors
    /// Returns the driver error; the session then rolls back on drop.
    pub async fn commit(self) -> Result<(), SqlCaddyError> {
        self.finish("COMMIT").await
    }

    /// # Errors
    /// Returns the driver error.
    pub async fn rollback(self) -> Result<(), SqlCaddyError> {
        self.finish("ROLLBACK").await
    }

    async fn finish(mut self, sql: &str) -> Result<(), SqlCaddyError> {
        self.conn_mut()?.execute_batch(sql).await?;
        self.in_transaction = false;
        debug!(action = sql, "session finished");
        Ok(())
    }

    fn conn_mut(&mut self) -> Result<&mut DbConnection, SqlCaddyError> {
        self.conn.as_mut().ok_or_else(|| {
            SqlCaddyError::ConnectionError("session connection already released".to_string())
        })
    }
}

impl AsConnection for Session {
    fn as_connection(&mut self) -> Result<&mut DbConnection, SqlCaddyError> {
        self.conn_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.execute_batch("ROLLBACK").await {
                        warn!(error = %e, "rollback of abandoned session failed");
                    }
                });
            }
            Err(_) => warn!("session dropped outside a tokio runtime; transaction left open"),
        }
    }
}

/// Run `f` inside a fresh session: commit when it returns `Ok`, roll back
/// when it returns `Err`. The engine behind the session is always disposed.
///
/// ```rust,no_run
/// use sql_caddy::prelude::*;
///
/// # async fn demo() -> Result<(), SqlCaddyError> {
/// let loc: DatabaseLocator = "sqlite:////tmp/app.db".parse()?;
/// let n = with_session(&loc, async |s| {
///     s.as_connection()?
///         .execute("insert into t (name) values (:name)", &NamedParams::new().with("name", "x"))
///         .await
/// })
/// .await?;
/// # let _ = n;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns the error from `f`, or from opening / committing the session.
pub async fn with_session<T, F>(locator: &DatabaseLocator, f: F) -> Result<T, SqlCaddyError>
where
    F: AsyncFnOnce(&mut Session) -> Result<T, SqlCaddyError>,
{
    let mut session = Session::open(locator).await?;
    match f(&mut session).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!(error = %rollback_err, "rollback after failed unit of work failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NamedParams;

    async fn memory_engine() -> Engine {
        let engine = Engine::new(&"sqlite://".parse().unwrap()).await.unwrap();
        let mut conn = engine.connect().await.unwrap();
        conn.execute_batch("create table t (x integer)").await.unwrap();
        engine
    }

    async fn count(engine: &Engine) -> usize {
        let mut conn = engine.connect().await.unwrap();
        conn.query("select x from t", &NamedParams::new())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn commit_keeps_rows() {
        let engine = memory_engine().await;
        let mut session = Session::from_engine(&engine).await.unwrap();
        session
            .as_connection()
            .unwrap()
            .execute("insert into t values (:x)", &NamedParams::new().with("x", 1))
            .await
            .unwrap();
        session.commit().await.unwrap();
        assert_eq!(count(&engine).await, 1);
    }

    #[tokio::test]
    async fn rollback_discards_rows() {
        let engine = memory_engine().await;
        let mut session = Session::from_engine(&engine).await.unwrap();
        assert!(session.is_active());
        session
            .as_connection()
            .unwrap()
            .execute("insert into t values (1)", &NamedParams::new())
            .await
            .unwrap();
        session.rollback().await.unwrap();
        assert_eq!(count(&engine).await, 0);
    }

    #[tokio::test]
    async fn released_connection_is_an_error() {
        let engine = memory_engine().await;
        let mut session = Session::from_engine(&engine).await.unwrap();
        session.conn = None;
        session.in_transaction = false;
        assert!(matches!(
            session.as_connection(),
            Err(SqlCaddyError::ConnectionError(_))
        ));
        assert!(session.commit().await.is_err());
    }

    #[tokio::test]
    async fn dropped_session_rolls_back() {
        let engine = memory_engine().await;
        {
            let mut session = Session::from_engine(&engine).await.unwrap();
            session
                .as_connection()
                .unwrap()
                .execute("insert into t values (1)", &NamedParams::new())
                .await
                .unwrap();
        }
        // the rollback runs on a spawned task and holds the only connection
        assert_eq!(count(&engine).await, 0);
    }
}
