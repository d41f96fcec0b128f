use tokio_postgres::types::Type;
use tokio_postgres::{Client, SimpleQueryMessage, Statement};

use super::params::param_refs;
use crate::error::SqlCaddyError;
use crate::pg_types::Interval;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Run a row-returning statement. The statement is prepared first so the
/// column names are known even when no rows come back.
pub(crate) async fn query(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlCaddyError> {
    let stmt = client.prepare(sql).await?;
    let rows = client.query(&stmt, &param_refs(params)).await?;
    build_result_set(&stmt, &rows)
}

/// Run a statement and return the affected row count.
///
/// Without parameters the simple-query protocol is used, which also accepts
/// statements that refuse to run in the extended protocol's implicit
/// transaction.
pub(crate) async fn execute(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<usize, SqlCaddyError> {
    if params.is_empty() {
        let messages = client.simple_query(sql).await?;
        let affected: u64 = messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum();
        return affected_to_usize(affected);
    }
    let affected = client.execute(sql, &param_refs(params)).await?;
    affected_to_usize(affected)
}

pub(crate) async fn execute_batch(client: &Client, sql: &str) -> Result<(), SqlCaddyError> {
    client.batch_execute(sql).await?;
    Ok(())
}

fn affected_to_usize(affected: u64) -> Result<usize, SqlCaddyError> {
    usize::try_from(affected).map_err(|e| {
        SqlCaddyError::ExecutionError(format!("postgres affected rows conversion error: {e}"))
    })
}

fn build_result_set(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, SqlCaddyError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
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

/// Extract a `RowValues` from a `tokio_postgres` row at the given index.
fn extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<RowValues, SqlCaddyError> {
    let ty = row.columns()[idx].type_().clone();

    let value = match ty {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .map(RowValues::TimestampTz),
        Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .map(RowValues::Date),
        Type::TIME => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)?
            .map(RowValues::Time),
        Type::INTERVAL => row
            .try_get::<_, Option<Interval>>(idx)?
            .map(RowValues::Interval),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(RowValues::JSON),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        Type::CHAR => row
            .try_get::<_, Option<i8>>(idx)?
            .map(|v| RowValues::Text(char::from(v.to_ne_bytes()[0]).to_string())),
        // text, varchar, bpchar, name and anything else String can decode
        _ => row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };

    Ok(value.unwrap_or(RowValues::Null))
}
