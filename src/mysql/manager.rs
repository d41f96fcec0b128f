use std::future::Future;

use bb8::ManageConnection;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::debug;

/// bb8 manager for `sqlx` `MySQL` connections.
pub struct MysqlManager {
    options: MySqlConnectOptions,
}

impl MysqlManager {
    #[must_use]
    pub fn new(options: MySqlConnectOptions) -> Self {
        Self { options }
    }
}

impl ManageConnection for MysqlManager {
    type Connection = MySqlConnection;
    type Error = sqlx::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let options = self.options.clone();
        async move {
            debug!(
                host = options.get_host(),
                port = options.get_port(),
                db = ?options.get_database(),
                "mysql connect"
            );
            options.connect().await
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.ping().await }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
