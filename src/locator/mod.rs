//! Database locators: URL-shaped identifiers for a database on a server (or
//! a file on disk).
//!
//! ```text
//! dialect[+driver]://[user[:password]@][host[:port]]/database[?key=value&...]
//! ```
//!
//! - parse: `FromStr` / `Display` that round-trip
//! - build: environment-aware construction and temporary names

mod build;
mod parse;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Dialect;

pub use build::{LocatorParts, build_locator, current_username, temporary_name};

/// The `SQLite` database name that means "no file, keep it in memory".
pub const MEMORY_DATABASE: &str = ":memory:";

/// Immutable description of where a database lives.
///
/// "Altering" a locator always produces a new value:
/// ```rust
/// use sql_caddy::prelude::*;
///
/// let target: DatabaseLocator = "postgresql://alice@db.internal:5432/orders".parse()?;
/// let admin = target.with_database(Some("postgres"));
/// assert_eq!(admin.database(), Some("postgres"));
/// assert_eq!(target.database(), Some("orders"));
/// # Ok::<(), SqlCaddyError>(())
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatabaseLocator {
    dialect: Dialect,
    driver: Option<String>,
    username: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    query: BTreeMap<String, String>,
}

impl DatabaseLocator {
    /// A locator with only the dialect set.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            driver: None,
            username: None,
            password: None,
            host: None,
            port: None,
            database: None,
            query: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Driver suffix of the scheme (`mysql+pymysql` -> `pymysql`), kept for
    /// round-tripping only.
    #[must_use]
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    #[must_use]
    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// `SQLite` in-memory marker: no database name, or `:memory:`.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.dialect == Dialect::Sqlite
            && self
                .database
                .as_deref()
                .is_none_or(|db| db.is_empty() || db == MEMORY_DATABASE)
    }

    #[must_use]
    pub fn with_dialect(&self, dialect: Dialect) -> Self {
        Self {
            dialect,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_database(&self, database: Option<&str>) -> Self {
        Self {
            database: non_empty(database),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_username(&self, username: Option<&str>) -> Self {
        Self {
            username: non_empty(username),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_password(&self, password: Option<&str>) -> Self {
        Self {
            password: password.map(str::to_string),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_host(&self, host: Option<&str>) -> Self {
        Self {
            host: non_empty(host),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_port(&self, port: Option<u16>) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_query_param(&self, key: &str, value: Option<&str>) -> Self {
        let mut query = self.query.clone();
        match value {
            Some(v) => {
                query.insert(key.to_string(), v.to_string());
            }
            None => {
                query.remove(key);
            }
        }
        Self {
            query,
            ..self.clone()
        }
    }

    /// Rendering with the password masked, for logs and errors.
    #[must_use]
    pub fn redacted(&self) -> String {
        parse::render(self, true)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

impl fmt::Display for DatabaseLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&parse::render(self, false))
    }
}

impl fmt::Debug for DatabaseLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseLocator")
            .field(&self.redacted())
            .finish()
    }
}

impl From<DatabaseLocator> for String {
    fn from(locator: DatabaseLocator) -> Self {
        locator.to_string()
    }
}

impl TryFrom<String> for DatabaseLocator {
    type Error = crate::error::SqlCaddyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<&str> for DatabaseLocator {
    type Error = crate::error::SqlCaddyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}
