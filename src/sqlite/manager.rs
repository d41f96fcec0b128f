use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use bb8::ManageConnection;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SqlCaddyError;
use crate::locator::DatabaseLocator;

pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// The file a `SQLite` locator points at, `None` for the in-memory marker.
#[must_use]
pub fn sqlite_path(locator: &DatabaseLocator) -> Option<PathBuf> {
    if locator.is_in_memory() {
        None
    } else {
        locator.database().map(PathBuf::from)
    }
}

/// bb8 manager for `SQLite` connections.
///
/// Opening a file connection creates the file if it is missing.
pub struct SqliteManager {
    path: Option<PathBuf>,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlCaddyError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.path.clone();
        async move {
            debug!(path = ?path, "sqlite connect");
            let conn = tokio::task::spawn_blocking(move || match path {
                Some(path) => rusqlite::Connection::open(path),
                None => rusqlite::Connection::open_in_memory(),
            })
            .await
            .map_err(|e| {
                SqlCaddyError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
            })??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(SqlCaddyError::SqliteError)
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlCaddyError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlCaddyError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlCaddyError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
