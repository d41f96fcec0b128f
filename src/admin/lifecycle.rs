use std::io::ErrorKind;

use tracing::{debug, info};

use super::reaper::reap;
use super::{AdminConnection, with_admin_connection};
use crate::connection::AsConnection;
use crate::engine::{Engine, EngineOptions};
use crate::error::SqlCaddyError;
use crate::locator::DatabaseLocator;
use crate::quoting::quoted_identifier;
use crate::sqlite::sqlite_path;
use crate::types::{Dialect, NamedParams};

const PG_EXISTS: &str = "select 1 from pg_catalog.pg_database where datname = :dbname";
const MYSQL_EXISTS: &str =
    "select schema_name from information_schema.schemata where schema_name = :dbname";

fn single_connection() -> EngineOptions {
    EngineOptions::default().with_max_size(1)
}

fn server_database_name(locator: &DatabaseLocator) -> Result<&str, SqlCaddyError> {
    locator
        .database()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            SqlCaddyError::ConfigError(format!(
                "{} names no database",
                locator.redacted()
            ))
        })
}

/// Whether the database `locator` points at exists.
///
/// By default `SQLite` checks for the file (the in-memory database always
/// exists) and the server dialects look the name up in the server catalog
/// through an [`AdminConnection`]. With `test_by_select` every dialect
/// instead connects to the target and runs `select 1` (see [`can_select`]);
/// for `SQLite` that creates the file, so the two modes can disagree.
///
/// # Errors
/// Returns connect or catalog query errors. Errors that mean "not there" are
/// only downgraded to `false` in the `test_by_select` mode.
pub async fn database_exists(
    locator: &DatabaseLocator,
    test_by_select: bool,
) -> Result<bool, SqlCaddyError> {
    if test_by_select {
        return can_select(locator).await;
    }

    match locator.dialect() {
        Dialect::Sqlite => {
            let exists = match sqlite_path(locator) {
                None => true,
                Some(path) => tokio::fs::try_exists(&path)
                    .await
                    .map_err(|e| SqlCaddyError::at_path(path, e))?,
            };
            debug!(locator = %locator.redacted(), exists, "sqlite file check");
            Ok(exists)
        }
        dialect @ (Dialect::Postgres | Dialect::Mysql) => {
            let Some(name) = locator.database().filter(|n| !n.is_empty()) else {
                return Ok(false);
            };
            let sql = if dialect == Dialect::Postgres {
                PG_EXISTS
            } else {
                MYSQL_EXISTS
            };
            let params = NamedParams::new().with("dbname", name);
            with_admin_connection(locator, async |admin: &mut AdminConnection| {
                let found = !admin.as_connection()?.query(sql, &params).await?.is_empty();
                debug!(database = name, found, "catalog lookup");
                Ok(found)
            })
            .await
        }
    }
}

/// Connect straight to the target and run `select 1`.
///
/// Connection refused, authentication failures, unknown databases and
/// permission errors mean `false`; anything else is returned. The engine is
/// disposed either way.
///
/// # Errors
/// Returns errors that do not indicate an unavailable database.
pub async fn can_select(locator: &DatabaseLocator) -> Result<bool, SqlCaddyError> {
    let engine = Engine::with_options(locator, single_connection()).await?;
    let outcome = select_one(&engine).await;
    engine.dispose();

    match outcome {
        Ok(()) => Ok(true),
        Err(e) if e.indicates_unavailable() => {
            debug!(locator = %locator.redacted(), error = %e, "select check failed");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn select_one(engine: &Engine) -> Result<(), SqlCaddyError> {
    let mut conn = engine.connect().await?;
    conn.query("select 1", &NamedParams::new()).await?;
    Ok(())
}

/// Create the database `locator` points at.
///
/// Returns `false` when it already exists. With `wipe_if_existing` it is
/// dropped first, so the result is then always a fresh database. `template`
/// adds a `template` clause to the `CREATE DATABASE` statement. For `SQLite`
/// creating means connecting once so the file is written.
///
/// # Errors
/// Returns the connect or server error; nothing is retried.
pub async fn create_database(
    locator: &DatabaseLocator,
    template: Option<&str>,
    wipe_if_existing: bool,
) -> Result<bool, SqlCaddyError> {
    if wipe_if_existing {
        drop_database(locator).await?;
    }

    if database_exists(locator, false).await? {
        info!(locator = %locator.redacted(), "database already exists");
        return Ok(false);
    }

    match locator.dialect() {
        Dialect::Sqlite => {
            let engine = Engine::with_options(locator, single_connection()).await?;
            let connected = engine.connect().await.map(drop);
            engine.dispose();
            connected?;
        }
        Dialect::Postgres | Dialect::Mysql => {
            let name = server_database_name(locator)?;
            let mut sql = format!("create database {}", quoted_identifier(name));
            if let Some(template) = template {
                sql.push_str(" template ");
                sql.push_str(&quoted_identifier(template));
            }
            with_admin_connection(locator, async |admin: &mut AdminConnection| {
                debug!(%sql, "create");
                admin.as_connection()?.execute_batch(&sql).await
            })
            .await?;
        }
    }

    info!(locator = %locator.redacted(), "database created");
    Ok(true)
}

/// Drop the database `locator` points at.
///
/// Returns `false` when there was nothing to drop, including the in-memory
/// `SQLite` database. On PostgreSQL new connections are revoked first; on
/// both server dialects every other session on the database is then
/// terminated before `DROP DATABASE IF EXISTS`.
///
/// # Errors
/// Returns the first failing step's error. Steps that already ran stay done.
pub async fn drop_database(locator: &DatabaseLocator) -> Result<bool, SqlCaddyError> {
    if !database_exists(locator, false).await? {
        debug!(locator = %locator.redacted(), "nothing to drop");
        return Ok(false);
    }

    match locator.dialect() {
        Dialect::Sqlite => {
            let Some(path) = sqlite_path(locator) else {
                return Ok(false);
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(SqlCaddyError::at_path(path, e)),
            }
        }
        dialect @ (Dialect::Postgres | Dialect::Mysql) => {
            let name = server_database_name(locator)?;
            let quoted = quoted_identifier(name);
            with_admin_connection(locator, async |admin: &mut AdminConnection| {
                let conn = admin.as_connection()?;
                if dialect == Dialect::Postgres {
                    let revoke = format!("revoke connect on database {quoted} from public");
                    debug!(sql = %revoke, "drop");
                    conn.execute_batch(&revoke).await?;
                }
                reap(conn, Some(name), true).await?;
                let drop_sql = format!("drop database if exists {quoted}");
                debug!(sql = %drop_sql, "drop");
                conn.execute_batch(&drop_sql).await
            })
            .await?;
        }
    }

    info!(locator = %locator.redacted(), "database dropped");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_locator(path: &std::path::Path) -> DatabaseLocator {
        format!("sqlite:///{}", path.display()).parse().unwrap()
    }

    #[tokio::test]
    async fn memory_database_always_exists() {
        let memory: DatabaseLocator = "sqlite://".parse().unwrap();
        assert!(database_exists(&memory, false).await.unwrap());
        assert!(database_exists(&memory, true).await.unwrap());
        assert!(!create_database(&memory, None, false).await.unwrap());
        assert!(!drop_database(&memory).await.unwrap());
    }

    #[tokio::test]
    async fn file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("life.db");
        let locator = file_locator(&path);

        assert!(!database_exists(&locator, false).await.unwrap());
        assert!(create_database(&locator, None, false).await.unwrap());
        assert!(path.exists());
        assert!(!create_database(&locator, None, false).await.unwrap());
        assert!(create_database(&locator, None, true).await.unwrap());
        assert!(drop_database(&locator).await.unwrap());
        assert!(!path.exists());
        assert!(!drop_database(&locator).await.unwrap());
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn lifecycle_futures_are_send() {
        let mysql: DatabaseLocator = "mysql://root@localhost/app".parse().unwrap();
        let pg: DatabaseLocator = "postgresql://localhost/app".parse().unwrap();
        assert_send(create_database(&mysql, None, true));
        assert_send(drop_database(&mysql));
        assert_send(database_exists(&mysql, true));
        assert_send(drop_database(&pg));
        assert_send(crate::session::Session::open(&mysql));
    }

    #[tokio::test]
    async fn unreachable_file_fails_fast() {
        let locator = file_locator(std::path::Path::new(
            "/nonexistent-sql-caddy-dir/nested/life.db",
        ));
        let created = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            create_database(&locator, None, false),
        )
        .await
        .unwrap();
        assert!(matches!(created, Err(SqlCaddyError::SqliteError(_))));
        let selectable = tokio::time::timeout(std::time::Duration::from_secs(5), can_select(&locator))
            .await
            .unwrap();
        assert!(!selectable.unwrap());
    }

    #[tokio::test]
    async fn server_locator_without_database() {
        let locator: DatabaseLocator = "postgresql://localhost".parse().unwrap();
        assert!(!database_exists(&locator, false).await.unwrap());
        assert!(matches!(
            server_database_name(&locator),
            Err(SqlCaddyError::ConfigError(_))
        ));
    }
}
