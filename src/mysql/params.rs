use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;

use crate::types::RowValues;

/// Bind positional values onto a `sqlx` query.
pub(super) fn bind_values<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[RowValues],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match value {
            RowValues::Int(i) => query.bind(*i),
            RowValues::Float(f) => query.bind(*f),
            RowValues::Text(s) => query.bind(s.clone()),
            RowValues::Bool(b) => query.bind(*b),
            RowValues::Timestamp(dt) => query.bind(*dt),
            RowValues::TimestampTz(dt) => query.bind(*dt),
            RowValues::Date(d) => query.bind(*d),
            RowValues::Time(t) => query.bind(*t),
            // no native interval type; the text form is what the server echoes back
            RowValues::Interval(i) => query.bind(i.to_string()),
            RowValues::Null => query.bind(None::<String>),
            RowValues::JSON(v) => query.bind(v.to_string()),
            RowValues::Blob(bytes) => query.bind(bytes.clone()),
        };
    }
    query
}
