use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};

use super::params::bind_values;
use crate::error::SqlCaddyError;
use crate::results::ResultSet;
use crate::types::RowValues;

// Statements go through the `Executor` methods on `&mut MySqlConnection`,
// which return boxed `Send` futures. The generic `Query::fetch_all` and
// friends do not satisfy `Send` once they sit inside a spawned task.

/// Run a row-returning statement.
///
/// Column names come from the first row, so an empty result carries none.
pub(crate) async fn query(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlCaddyError> {
    let rows = if params.is_empty() {
        (&mut *conn).fetch_all(sqlx::raw_sql(sql)).await?
    } else {
        (&mut *conn)
            .fetch_all(bind_values(sqlx::query(sql), params))
            .await?
    };
    build_result_set(&rows)
}

/// Run a statement and return the affected row count.
///
/// Statements without parameters go over the text protocol, which accepts
/// everything the server does (`KILL`, `CREATE DATABASE`, ...).
pub(crate) async fn execute(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<usize, SqlCaddyError> {
    let result = if params.is_empty() {
        (&mut *conn).execute(sqlx::raw_sql(sql)).await?
    } else {
        (&mut *conn)
            .execute(bind_values(sqlx::query(sql), params))
            .await?
    };
    usize::try_from(result.rows_affected()).map_err(|e| {
        SqlCaddyError::ExecutionError(format!("mysql affected rows conversion error: {e}"))
    })
}

pub(crate) async fn execute_batch(
    conn: &mut MySqlConnection,
    sql: &str,
) -> Result<(), SqlCaddyError> {
    (&mut *conn).execute(sqlx::raw_sql(sql)).await?;
    Ok(())
}

fn build_result_set(rows: &[MySqlRow]) -> Result<ResultSet, SqlCaddyError> {
    let column_names: Vec<String> = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect()
        })
        .unwrap_or_default();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(column_names, rows.len());
    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }
    Ok(result_set)
}

/// Extract a `RowValues` from a `MySQL` row, dispatching on the column's
/// server type name.
fn extract_value(row: &MySqlRow, idx: usize) -> Result<RowValues, SqlCaddyError> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(RowValues::Null);
    }

    let type_name = row.column(idx).type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "BOOLEAN" => RowValues::Bool(row.try_get(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            RowValues::Int(row.try_get_unchecked::<i64, _>(idx)?)
        }
        name if name.ends_with("UNSIGNED") => {
            let unsigned: u64 = row.try_get_unchecked(idx)?;
            match i64::try_from(unsigned) {
                Ok(v) => RowValues::Int(v),
                Err(_) => RowValues::Text(unsigned.to_string()),
            }
        }
        "FLOAT" | "DOUBLE" => RowValues::Float(row.try_get_unchecked::<f64, _>(idx)?),
        "DATETIME" | "TIMESTAMP" => RowValues::Timestamp(row.try_get(idx)?),
        "DATE" => RowValues::Date(row.try_get(idx)?),
        // TIME can exceed a day or be negative; keep those as text
        "TIME" => match row.try_get::<chrono::NaiveTime, _>(idx) {
            Ok(t) => RowValues::Time(t),
            Err(_) => RowValues::Text(text_value(row, idx)?),
        },
        "JSON" => {
            let raw = text_value(row, idx)?;
            serde_json::from_str(&raw).map_or(RowValues::Text(raw), RowValues::JSON)
        }
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT"
        | "GEOMETRY" => RowValues::Blob(row.try_get_unchecked(idx)?),
        // VARCHAR, CHAR, TEXT, DECIMAL, ENUM, SET, ...
        _ => RowValues::Text(text_value(row, idx)?),
    };
    Ok(value)
}

fn text_value(row: &MySqlRow, idx: usize) -> Result<String, SqlCaddyError> {
    match row.try_get_unchecked::<String, _>(idx) {
        Ok(s) => Ok(s),
        Err(_) => {
            let bytes: Vec<u8> = row.try_get_unchecked(idx)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}
