use std::fmt;
use std::time::Duration;

use bb8::{AddError, Builder, ManageConnection, Pool, PooledConnection};
use tracing::debug;

use crate::connection::DbConnection;
use crate::error::SqlCaddyError;
use crate::locator::DatabaseLocator;
use crate::mysql::{MysqlManager, mysql_options};
use crate::postgres::{PgManager, pg_config};
use crate::sqlite::{SqliteManager, sqlite_path};
use crate::types::Dialect;

const DEFAULT_MAX_SIZE: u32 = 10;
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool sizing for an [`Engine`].
///
/// ```rust
/// use std::time::Duration;
/// use sql_caddy::prelude::*;
///
/// let options = EngineOptions::default()
///     .with_max_size(2)
///     .with_connection_timeout(Duration::from_secs(5));
/// assert_eq!(options.max_size(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    max_size: u32,
    connection_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }
}

/// Connection pool for one dialect.
#[derive(Clone)]
pub enum EnginePool {
    Postgres(Pool<PgManager>),
    Mysql(Pool<MysqlManager>),
    Sqlite(Pool<SqliteManager>),
}

impl fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres(pool) => f.debug_tuple("Postgres").field(&pool.state()).finish(),
            Self::Mysql(pool) => f.debug_tuple("Mysql").field(&pool.state()).finish(),
            Self::Sqlite(pool) => f.debug_tuple("Sqlite").field(&pool.state()).finish(),
        }
    }
}

/// A locator plus a pool of connections to it.
///
/// Creating an engine does not connect; the first [`Engine::connect`] does.
/// Failed connects are reported immediately, never retried.
#[derive(Debug)]
pub struct Engine {
    locator: DatabaseLocator,
    pool: EnginePool,
    max_size: u32,
}

impl Engine {
    /// Engine with default [`EngineOptions`].
    ///
    /// # Errors
    /// Returns `SqlCaddyError` if the locator cannot be turned into driver
    /// options.
    pub async fn new(locator: &DatabaseLocator) -> Result<Self, SqlCaddyError> {
        Self::with_options(locator, EngineOptions::default()).await
    }

    /// # Errors
    /// Returns `SqlCaddyError` if the locator cannot be turned into driver
    /// options or the pool cannot be built.
    pub async fn with_options(
        locator: &DatabaseLocator,
        options: EngineOptions,
    ) -> Result<Self, SqlCaddyError> {
        let mut max_size = options.max_size;
        let pool = match locator.dialect() {
            Dialect::Postgres => {
                let manager = PgManager::new(pg_config(locator)?);
                EnginePool::Postgres(pool_builder(options).build(manager).await?)
            }
            Dialect::Mysql => {
                let manager = MysqlManager::new(mysql_options(locator)?);
                EnginePool::Mysql(pool_builder(options).build(manager).await?)
            }
            Dialect::Sqlite => {
                let manager = SqliteManager::new(sqlite_path(locator));
                // an in-memory database lives exactly as long as its one connection
                let pool = if manager.is_in_memory() {
                    max_size = 1;
                    pool_builder(options)
                        .max_size(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                        .build(manager)
                        .await?
                } else {
                    pool_builder(options).build(manager).await?
                };
                EnginePool::Sqlite(pool)
            }
        };

        debug!(locator = %locator.redacted(), "engine created");
        Ok(Self {
            locator: locator.clone(),
            pool,
            max_size,
        })
    }

    #[must_use]
    pub fn locator(&self) -> &DatabaseLocator {
        &self.locator
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.locator.dialect()
    }

    #[must_use]
    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    /// Check a connection out of the pool.
    ///
    /// # Errors
    /// Returns the driver's connect error, or a pool timeout.
    pub async fn connect(&self) -> Result<DbConnection, SqlCaddyError> {
        Ok(match &self.pool {
            EnginePool::Postgres(pool) => {
                DbConnection::Postgres(checkout(pool, self.max_size).await?)
            }
            EnginePool::Mysql(pool) => DbConnection::Mysql(checkout(pool, self.max_size).await?),
            EnginePool::Sqlite(pool) => DbConnection::Sqlite(checkout(pool, self.max_size).await?),
        })
    }

    /// Open connections, checked out or idle.
    #[must_use]
    pub fn connections(&self) -> u32 {
        match &self.pool {
            EnginePool::Postgres(pool) => pool.state().connections,
            EnginePool::Mysql(pool) => pool.state().connections,
            EnginePool::Sqlite(pool) => pool.state().connections,
        }
    }

    /// Close the pool by dropping this engine's handle to it. Idle
    /// connections close once no checked-out connection still holds the
    /// pool; checked-out ones close when they are dropped.
    pub fn dispose(self) {
        let connections = self.connections();
        let Self { locator, pool, .. } = self;
        debug!(locator = %locator.redacted(), connections, "engine disposed");
        drop(pool);
    }
}

/// Check a connection out, opening it in the foreground when the pool has
/// nothing idle and room to grow.
///
/// bb8 reports connect errors from its background task only to its error
/// sink, so `get` would sit out the whole connection timeout on a bad
/// locator. Connecting here surfaces the driver error right away.
async fn checkout<M>(
    pool: &Pool<M>,
    max_size: u32,
) -> Result<PooledConnection<'static, M>, SqlCaddyError>
where
    M: ManageConnection,
    SqlCaddyError: From<M::Error> + From<bb8::RunError<M::Error>>,
{
    let state = pool.state();
    if state.idle_connections == 0 && state.connections < max_size {
        let conn = pool.dedicated_connection().await?;
        match pool.add(conn) {
            Ok(()) => {}
            // lost a race for the last slot; the pool still serves below
            Err(AddError::NoCapacity(_)) => debug!("pool full, connection dropped"),
            Err(AddError::Broken(_)) => debug!("new connection broken, connection dropped"),
        }
    }
    Ok(pool.get_owned().await?)
}

fn pool_builder<M: ManageConnection>(options: EngineOptions) -> Builder<M> {
    Pool::builder()
        .max_size(options.max_size)
        .connection_timeout(options.connection_timeout)
        .retry_connection(false)
}
