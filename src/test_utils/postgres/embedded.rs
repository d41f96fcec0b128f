use postgresql_embedded::PostgreSQL;
use tracing::{debug, warn};

use crate::admin::can_select;
use crate::error::SqlCaddyError;
use crate::locator::{DatabaseLocator, LocatorParts, build_locator};
use crate::types::Dialect;

/// A running embedded `PostgreSQL` server.
///
/// The server's data directory is temporary; it is removed when the server
/// stops or this value is dropped.
pub struct EmbeddedPostgres {
    postgresql: PostgreSQL,
    locator: DatabaseLocator,
}

impl std::fmt::Debug for EmbeddedPostgres {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedPostgres")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl EmbeddedPostgres {
    /// Install (bundled binaries), start and check a server.
    ///
    /// # Errors
    /// Returns `SqlCaddyError::ConnectionError` if the server cannot be set
    /// up or started, or does not answer `select 1` afterwards.
    pub async fn start() -> Result<Self, SqlCaddyError> {
        let mut postgresql = PostgreSQL::default();
        postgresql.setup().await.map_err(embedded_error)?;
        postgresql.start().await.map_err(embedded_error)?;

        let settings = postgresql.settings();
        let locator = build_locator(
            Dialect::Postgres,
            LocatorParts::default()
                .with_host(settings.host.clone())
                .with_port(settings.port)
                .with_username(settings.username.clone())
                .with_password(settings.password.clone()),
        );
        debug!(locator = %locator.redacted(), "embedded postgres started");

        if !can_select(&locator).await? {
            return Err(SqlCaddyError::ConnectionError(format!(
                "embedded postgres at {} does not answer",
                locator.redacted()
            )));
        }
        Ok(Self {
            postgresql,
            locator,
        })
    }

    /// Superuser locator for the `postgres` database.
    #[must_use]
    pub fn locator(&self) -> &DatabaseLocator {
        &self.locator
    }

    /// Superuser locator for another database on this server.
    #[must_use]
    pub fn locator_for(&self, database: &str) -> DatabaseLocator {
        self.locator.with_database(Some(database))
    }

    pub async fn stop(self) {
        if let Err(e) = self.postgresql.stop().await {
            warn!(error = %e, "embedded postgres did not stop cleanly");
        }
    }
}

fn embedded_error(err: postgresql_embedded::Error) -> SqlCaddyError {
    SqlCaddyError::ConnectionError(format!("embedded postgres: {err}"))
}
