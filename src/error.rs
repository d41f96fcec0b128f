use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlCaddyError {
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error(transparent)]
    MysqlError(#[from] sqlx::Error),

    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[error(transparent)]
    PoolErrorMysql(#[from] bb8::RunError<sqlx::Error>),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("I/O error on {}: {source}", path.display())]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid database locator: {0}")]
    InvalidLocator(String),

    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

// The SQLite pool manager reports `SqlCaddyError` directly, so unwrap it
// instead of nesting another variant.
impl From<bb8::RunError<SqlCaddyError>> for SqlCaddyError {
    fn from(err: bb8::RunError<SqlCaddyError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                SqlCaddyError::ConnectionError("SQLite pool checkout timed out".to_string())
            }
        }
    }
}

/// SQLSTATE classes that mean "the database is not there for us": connection
/// exceptions, authorization failures, invalid catalog names, access/syntax
/// errors, resource and operator problems, internal errors.
const UNAVAILABLE_SQLSTATE_CLASSES: &[&str] = &["08", "28", "3D", "42", "53", "57", "58", "XX"];

const MYSQL_VANISHED_THREAD: &str = "Unknown thread id";

impl SqlCaddyError {
    /// The SQLSTATE reported by the server, when there is one.
    #[must_use]
    pub fn sqlstate(&self) -> Option<String> {
        match self {
            SqlCaddyError::PostgresError(e)
            | SqlCaddyError::PoolErrorPostgres(bb8::RunError::User(e)) => {
                e.code().map(|state| state.code().to_string())
            }
            SqlCaddyError::MysqlError(sqlx::Error::Database(db))
            | SqlCaddyError::PoolErrorMysql(bb8::RunError::User(sqlx::Error::Database(db))) => {
                db.code().map(|code| code.into_owned())
            }
            _ => None,
        }
    }

    /// Whether this error means "cannot reach / may not use / no such
    /// database" rather than a genuine failure.
    ///
    /// Only the select-based existence check downgrades these to `false`;
    /// everywhere else they propagate.
    #[must_use]
    pub fn indicates_unavailable(&self) -> bool {
        match self {
            SqlCaddyError::PostgresError(e)
            | SqlCaddyError::PoolErrorPostgres(bb8::RunError::User(e)) => match e.code() {
                Some(state) => sqlstate_is_unavailable(state.code()),
                // no SQLSTATE: refused, reset, or closed before the server answered
                None => true,
            },
            SqlCaddyError::MysqlError(e)
            | SqlCaddyError::PoolErrorMysql(bb8::RunError::User(e)) => match e {
                sqlx::Error::Database(db) => db
                    .code()
                    .is_none_or(|code| sqlstate_is_unavailable(&code)),
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::Protocol(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed => true,
                _ => false,
            },
            SqlCaddyError::SqliteError(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::PermissionDenied
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::ReadOnly
                    | rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
            ),
            SqlCaddyError::PoolErrorPostgres(bb8::RunError::TimedOut)
            | SqlCaddyError::PoolErrorMysql(bb8::RunError::TimedOut)
            | SqlCaddyError::ConnectionError(_) => true,
            _ => false,
        }
    }

    /// The MySQL "Unknown thread id" race: the session we meant to kill is
    /// already gone.
    #[must_use]
    pub fn is_vanished_session(&self) -> bool {
        match self {
            SqlCaddyError::MysqlError(sqlx::Error::Database(db)) => {
                db.message().contains(MYSQL_VANISHED_THREAD)
            }
            _ => false,
        }
    }

    pub(crate) fn at_path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SqlCaddyError::PathError {
            path: path.into(),
            source,
        }
    }
}

fn sqlstate_is_unavailable(code: &str) -> bool {
    code.get(..2)
        .is_some_and(|class| UNAVAILABLE_SQLSTATE_CLASSES.contains(&class))
}
