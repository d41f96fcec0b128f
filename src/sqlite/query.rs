use std::sync::Arc;

use rusqlite::ToSql;
use rusqlite::types::Value;

use super::manager::{SharedSqliteConnection, run_blocking};
use super::params::convert;
use crate::error::SqlCaddyError;
use crate::results::ResultSet;
use crate::types::RowValues;

pub(crate) async fn query(
    conn: &SharedSqliteConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlCaddyError> {
    let converted = convert(params);
    let sql_owned = sql.to_owned();
    run_blocking(Arc::clone(conn), move |guard| {
        let mut stmt = guard.prepare(&sql_owned)?;
        build_result_set(&mut stmt, &converted)
    })
    .await
}

pub(crate) async fn execute(
    conn: &SharedSqliteConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<usize, SqlCaddyError> {
    let converted = convert(params);
    let sql_owned = sql.to_owned();
    run_blocking(Arc::clone(conn), move |guard| {
        let mut stmt = guard.prepare(&sql_owned)?;
        let refs: Vec<&dyn ToSql> = converted.iter().map(|v| v as &dyn ToSql).collect();
        Ok(stmt.execute(&refs[..])?)
    })
    .await
}

pub(crate) async fn execute_batch(
    conn: &SharedSqliteConnection,
    sql: &str,
) -> Result<(), SqlCaddyError> {
    let sql_owned = sql.to_owned();
    run_blocking(Arc::clone(conn), move |guard| {
        Ok(guard.execute_batch(&sql_owned)?)
    })
    .await
}

fn build_result_set(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[Value],
) -> Result<ResultSet, SqlCaddyError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::new(column_names);
    let mut rows_iter = stmt.query(&param_refs[..])?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<RowValues, SqlCaddyError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}
