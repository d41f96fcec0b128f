use std::env;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::DatabaseLocator;
use crate::types::Dialect;

const PG_DEFAULT_PORT: u16 = 5432;
const MYSQL_DEFAULT_PORT: u16 = 3306;
const TEMPORARY_SUFFIX_LEN: usize = 10;

/// Partially specified connection details; unset fields are filled from the
/// environment by [`build_locator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorParts {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
}

impl LocatorParts {
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Build a locator for `dialect`, filling unset parts from the usual client
/// environment variables.
///
/// - `PostgreSQL`: `PGHOST`, `PGPORT`, `PGUSER` (then the OS user), database
///   `postgres`
/// - `MySQL`: `MYSQL_UNIX_PORT`, port 3306, user `root`
/// - `SQLite`: the database path only; none means in-memory
///
/// A host starting with `/` is a unix socket and moves into the query string.
#[must_use]
pub fn build_locator(dialect: Dialect, parts: LocatorParts) -> DatabaseLocator {
    let base = DatabaseLocator::new(dialect);
    match dialect {
        Dialect::Postgres => {
            let host = parts
                .host
                .or_else(|| env_var("PGHOST"))
                .unwrap_or_else(|| "localhost".to_string());
            let port = parts
                .port
                .or_else(|| env_var("PGPORT").and_then(|p| p.parse().ok()))
                .unwrap_or(PG_DEFAULT_PORT);
            let username = parts
                .username
                .or_else(|| env_var("PGUSER"))
                .or_else(current_username)
                .unwrap_or_else(|| "postgres".to_string());
            let database = parts.database.unwrap_or_else(|| "postgres".to_string());

            let loc = base
                .with_username(Some(&username))
                .with_password(parts.password.as_deref())
                .with_database(Some(&database));
            if host.starts_with('/') {
                loc.with_query_param("host", Some(&host))
                    .with_query_param("port", Some(&port.to_string()))
            } else {
                loc.with_host(Some(&host)).with_port(Some(port))
            }
        }
        Dialect::Mysql => {
            let host = parts
                .host
                .or_else(|| env_var("MYSQL_UNIX_PORT"))
                .unwrap_or_else(|| "localhost".to_string());
            let username = parts.username.unwrap_or_else(|| "root".to_string());

            let loc = base
                .with_username(Some(&username))
                .with_password(parts.password.as_deref())
                .with_database(parts.database.as_deref());
            if host.starts_with('/') {
                loc.with_query_param("unix_socket", Some(&host))
            } else {
                loc.with_host(Some(&host))
                    .with_port(Some(parts.port.unwrap_or(MYSQL_DEFAULT_PORT)))
            }
        }
        Dialect::Sqlite => base.with_database(parts.database.as_deref()),
    }
}

/// The login name of the current OS user, if the environment says.
#[must_use]
pub fn current_username() -> Option<String> {
    env_var("USER").or_else(|| env_var("USERNAME"))
}

/// `prefix` followed by ten random lowercase letters.
#[must_use]
pub fn temporary_name(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..TEMPORARY_SUFFIX_LEN)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect();
    format!("{prefix}{suffix}")
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_parts_win() {
        let loc = build_locator(
            Dialect::Postgres,
            LocatorParts::default()
                .with_username("alice")
                .with_password("pw")
                .with_host("db.internal")
                .with_port(6543)
                .with_database("orders"),
        );
        assert_eq!(loc.to_string(), "postgresql://alice:pw@db.internal:6543/orders");
    }

    #[test]
    fn socket_host_moves_to_query() {
        let loc = build_locator(
            Dialect::Postgres,
            LocatorParts::default()
                .with_username("alice")
                .with_host("/var/run/postgresql")
                .with_port(5433),
        );
        assert_eq!(loc.host(), None);
        assert_eq!(loc.query_param("host"), Some("/var/run/postgresql"));
        assert_eq!(loc.query_param("port"), Some("5433"));
        assert_eq!(loc.database(), Some("postgres"));

        let loc = build_locator(
            Dialect::Mysql,
            LocatorParts::default().with_host("/tmp/mysql.sock"),
        );
        assert_eq!(loc.query_param("unix_socket"), Some("/tmp/mysql.sock"));
        assert_eq!(loc.username(), Some("root"));
        assert_eq!(loc.port(), None);
    }

    #[test]
    fn mysql_defaults() {
        let loc = build_locator(
            Dialect::Mysql,
            LocatorParts::default().with_host("127.0.0.1").with_database("app"),
        );
        assert_eq!(loc.to_string(), "mysql://root@127.0.0.1:3306/app");
    }

    #[test]
    fn sqlite_only_uses_database() {
        let loc = build_locator(
            Dialect::Sqlite,
            LocatorParts::default().with_host("ignored").with_database("/tmp/a.db"),
        );
        assert_eq!(loc.to_string(), "sqlite:////tmp/a.db");
        assert!(build_locator(Dialect::Sqlite, LocatorParts::default()).is_in_memory());
    }

    #[test]
    fn temporary_names() {
        let a = temporary_name("sqlcaddy_tmp_");
        let b = temporary_name("sqlcaddy_tmp_");
        assert!(a.starts_with("sqlcaddy_tmp_"));
        assert_eq!(a.len(), "sqlcaddy_tmp_".len() + 10);
        assert!(a["sqlcaddy_tmp_".len()..].bytes().all(|c| c.is_ascii_lowercase()));
        assert_ne!(a, b);
    }
}
