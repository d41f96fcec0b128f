//! Ad-hoc statement helpers that accept a session or a connection.

use tracing::{error, info};

use crate::binding::render_inline;
use crate::connection::AsConnection;
use crate::error::SqlCaddyError;
use crate::quoting::quoted_identifier;
use crate::results::{ResultSet, Row};
use crate::types::{Dialect, NamedParams};

/// Leading keywords of statements that produce rows.
const ROW_RETURNING_PREFIXES: &[&str] = &[
    "select", "explain", "returning", "pragma", "with", "show", "values",
];

/// Per-call switches for [`execute_sql`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Log only, do not run.
    pub dryrun: bool,
    /// Do not log the statement.
    pub quiet: bool,
}

impl ExecOptions {
    #[must_use]
    pub fn dryrun(mut self, dryrun: bool) -> Self {
        self.dryrun = dryrun;
        self
    }

    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// Whether `sql` is expected to return rows, judged by its first keyword.
#[must_use]
pub fn execute_returns_result(sql: &str) -> bool {
    let lowered = sql.trim_start().to_ascii_lowercase();
    ROW_RETURNING_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// `sql` with parameters substituted as literals, for logs.
///
/// # Errors
/// Returns `SqlCaddyError::ParameterError` when a placeholder has no value.
pub fn sql_to_print(sql: &str, params: &NamedParams) -> Result<String, SqlCaddyError> {
    render_inline(sql, params)
}

/// Log and run one statement.
///
/// Returns `None` for a dry run. Row-returning statements (see
/// [`execute_returns_result`]) yield their rows; others an empty result
/// carrying the affected-row count. Failures are logged, then returned.
///
/// # Errors
/// Returns the binding or driver error.
pub async fn execute_sql(
    conn: &mut impl AsConnection,
    sql: &str,
    params: &NamedParams,
    options: ExecOptions,
) -> Result<Option<ResultSet>, SqlCaddyError> {
    if !options.quiet {
        info!(sql = %sql_to_print(sql, params)?, "execute_sql");
    }
    if options.dryrun {
        return Ok(None);
    }

    let conn = conn.as_connection()?;
    let outcome = if execute_returns_result(sql) {
        conn.query(sql, params).await
    } else {
        conn.execute(sql, params).await.map(ResultSet::affected)
    };

    match outcome {
        Ok(result) => Ok(Some(result)),
        Err(e) => {
            error!(error = %e, sql, "statement failed");
            Err(e)
        }
    }
}

/// All rows of `sql`; empty for a dry run.
///
/// # Errors
/// Returns the binding or driver error.
pub async fn execute_fetchall(
    conn: &mut impl AsConnection,
    sql: &str,
    params: &NamedParams,
    options: ExecOptions,
) -> Result<Vec<Row>, SqlCaddyError> {
    Ok(execute_sql(conn, sql, params, options)
        .await?
        .map(ResultSet::into_rows)
        .unwrap_or_default())
}

/// First row of `sql`, if any; `None` for a dry run.
///
/// # Errors
/// Returns the binding or driver error.
pub async fn execute_fetchone(
    conn: &mut impl AsConnection,
    sql: &str,
    params: &NamedParams,
    options: ExecOptions,
) -> Result<Option<Row>, SqlCaddyError> {
    Ok(execute_sql(conn, sql, params, options)
        .await?
        .and_then(|rs| rs.into_rows().into_iter().next()))
}

/// Whether a table or view named `table` exists, in `schema` or the
/// connection's default one.
///
/// # Errors
/// Returns the driver error.
pub async fn table_exists(
    conn: &mut impl AsConnection,
    table: &str,
    schema: Option<&str>,
) -> Result<bool, SqlCaddyError> {
    let conn = conn.as_connection()?;
    let mut params = NamedParams::new().with("table", table);
    let sql = match (conn.dialect(), schema) {
        (Dialect::Postgres, Some(schema)) => {
            params.set("schema", schema);
            "select 1 from information_schema.tables \
             where table_schema = :schema and table_name = :table"
                .to_string()
        }
        (Dialect::Postgres, None) => "select 1 from information_schema.tables \
             where table_schema = current_schema() and table_name = :table"
            .to_string(),
        (Dialect::Mysql, Some(schema)) => {
            params.set("schema", schema);
            "select 1 from information_schema.tables \
             where table_schema = :schema and table_name = :table"
                .to_string()
        }
        (Dialect::Mysql, None) => "select 1 from information_schema.tables \
             where table_schema = database() and table_name = :table"
            .to_string(),
        (Dialect::Sqlite, schema) => {
            let master = match schema {
                Some(schema) => format!("{}.sqlite_master", quoted_identifier(schema)),
                None => "sqlite_master".to_string(),
            };
            format!("select 1 from {master} where type in ('table', 'view') and name = :table")
        }
    };
    Ok(!conn.query(&sql, &params).await?.is_empty())
}

/// The dialect behind a session or connection.
///
/// # Errors
/// Returns `SqlCaddyError::ConnectionError` if the connection was released.
pub fn get_dbtype(conn: &mut impl AsConnection) -> Result<Dialect, SqlCaddyError> {
    Ok(conn.as_connection()?.dialect())
}
