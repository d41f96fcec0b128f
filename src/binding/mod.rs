//! `:name` placeholders and their translation into each driver's positional
//! form.
//!
//! The scanner is a small state machine that steps over quoted text,
//! comments, dollar-quoted blocks and `::` casts, so `':x'` or
//! `-- :x` are left alone.

use std::borrow::Cow;
use std::fmt::Write as _;

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_cast, is_line_comment_start, matches_tag,
    try_start_dollar_quote,
};
use scanner::{State, scan_name};

use crate::error::SqlCaddyError;
use crate::types::{Dialect, NamedParams, RowValues};

/// Target placeholder style for binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Numbered `$1`, repeated names share a slot.
    Postgres,
    /// Anonymous `?`, one value per occurrence.
    Mysql,
    /// Numbered `?1`, repeated names share a slot.
    Sqlite,
}

impl PlaceholderStyle {
    #[must_use]
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres => PlaceholderStyle::Postgres,
            Dialect::Mysql => PlaceholderStyle::Mysql,
            Dialect::Sqlite => PlaceholderStyle::Sqlite,
        }
    }

    fn backslash_escapes(self) -> bool {
        matches!(self, PlaceholderStyle::Mysql)
    }
}

/// SQL rewritten for a driver plus the values in positional order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement<'a> {
    pub sql: Cow<'a, str>,
    pub values: Vec<RowValues>,
}

/// Rewrite `:name` placeholders into `style` and collect their values.
///
/// Without parameters the SQL is passed through untouched (borrowed), which
/// keeps raw scripts free of accidental rewrites.
///
/// ```rust
/// use sql_caddy::binding::{PlaceholderStyle, bind_named};
/// use sql_caddy::prelude::*;
///
/// let params = NamedParams::new().with("name", "orders");
/// let bound = bind_named(
///     "select 1 from pg_database where datname = :name or datname = :name",
///     PlaceholderStyle::Postgres,
///     &params,
/// )?;
/// assert_eq!(bound.sql, "select 1 from pg_database where datname = $1 or datname = $1");
/// assert_eq!(bound.values.len(), 1);
/// # Ok::<(), SqlCaddyError>(())
/// ```
///
/// # Errors
/// Returns `SqlCaddyError::ParameterError` when a placeholder has no value.
pub fn bind_named<'a>(
    sql: &'a str,
    style: PlaceholderStyle,
    params: &NamedParams,
) -> Result<BoundStatement<'a>, SqlCaddyError> {
    if params.is_empty() {
        return Ok(BoundStatement {
            sql: Cow::Borrowed(sql),
            values: Vec::new(),
        });
    }

    let mut slots: Vec<String> = Vec::new();
    let mut values = Vec::new();
    let sql = rewrite_placeholders(sql, style.backslash_escapes(), |name| {
        let value = lookup(params, name)?;
        Ok(match style {
            PlaceholderStyle::Mysql => {
                values.push(value.clone());
                "?".to_string()
            }
            PlaceholderStyle::Postgres | PlaceholderStyle::Sqlite => {
                let slot = match slots.iter().position(|n| *n == name) {
                    Some(pos) => pos + 1,
                    None => {
                        slots.push(name.to_string());
                        values.push(value.clone());
                        slots.len()
                    }
                };
                let sigil = if style == PlaceholderStyle::Postgres { '$' } else { '?' };
                format!("{sigil}{slot}")
            }
        })
    })?;

    Ok(BoundStatement { sql, values })
}

/// Substitute literal values for display. Never execute the result.
///
/// # Errors
/// Returns `SqlCaddyError::ParameterError` when a placeholder has no value.
pub fn render_inline(sql: &str, params: &NamedParams) -> Result<String, SqlCaddyError> {
    if params.is_empty() {
        return Ok(sql.to_string());
    }
    rewrite_placeholders(sql, false, |name| lookup(params, name).map(literal))
        .map(Cow::into_owned)
}

/// SQL literal text for a value, as used by [`render_inline`].
#[must_use]
pub fn literal(value: &RowValues) -> String {
    match value {
        RowValues::Null => "NULL".to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Bool(b) => b.to_string(),
        RowValues::Text(s) => quote_text(s),
        RowValues::Timestamp(dt) => quote_text(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        RowValues::TimestampTz(dt) => quote_text(&dt.to_rfc3339()),
        RowValues::Date(d) => quote_text(&d.to_string()),
        RowValues::Time(t) => quote_text(&t.to_string()),
        RowValues::Interval(i) => quote_text(&i.to_string()),
        RowValues::JSON(v) => quote_text(&v.to_string()),
        RowValues::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2 + 3);
            hex.push_str("X'");
            for b in bytes {
                let _ = write!(hex, "{b:02x}");
            }
            hex.push('\'');
            hex
        }
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn lookup<'p>(params: &'p NamedParams, name: &str) -> Result<&'p RowValues, SqlCaddyError> {
    params
        .get(name)
        .ok_or_else(|| SqlCaddyError::ParameterError(format!("no value supplied for :{name}")))
}

fn rewrite_placeholders<'a, F>(
    sql: &'a str,
    backslash_escapes: bool,
    mut on_placeholder: F,
) -> Result<Cow<'a, str>, SqlCaddyError>
where
    F: FnMut(&str) -> Result<String, SqlCaddyError>,
{
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut state = State::Normal;
    let mut idx = 0;
    let bytes = sql.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backticked,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => state = State::BlockComment(1),
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                b':' if !is_cast(bytes, idx) && !follows_word(bytes, idx) => {
                    if let Some((end, name)) = scan_name(bytes, idx + 1)
                        && (bytes.get(end) != Some(&b':') || is_cast(bytes, end))
                    {
                        let replacement = on_placeholder(name)?;
                        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                        buf.push_str(&sql[copied..idx]);
                        buf.push_str(&replacement);
                        copied = end;
                        idx = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if backslash_escapes && b == b'\\' {
                    idx += 1; // skip escaped character
                } else if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Backticked => {
                if b == b'`' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    Ok(match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    })
}

fn follows_word(bytes: &[u8], idx: usize) -> bool {
    idx > 0 && {
        let prev = bytes[idx - 1];
        prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'\\'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NamedParams {
        NamedParams::new().with("a", 1).with("b", "two")
    }

    #[test]
    fn numbered_styles_reuse_slots() {
        let bound = bind_named(
            "select :b, :a where x = :a",
            PlaceholderStyle::Postgres,
            &params(),
        )
        .unwrap();
        assert_eq!(bound.sql, "select $1, $2 where x = $2");
        assert_eq!(bound.values, vec![RowValues::Text("two".into()), RowValues::Int(1)]);

        let bound = bind_named("select :a, :a", PlaceholderStyle::Sqlite, &params()).unwrap();
        assert_eq!(bound.sql, "select ?1, ?1");
        assert_eq!(bound.values.len(), 1);
    }

    #[test]
    fn mysql_repeats_values() {
        let bound = bind_named("select :a, :b, :a", PlaceholderStyle::Mysql, &params()).unwrap();
        assert_eq!(bound.sql, "select ?, ?, ?");
        assert_eq!(
            bound.values,
            vec![RowValues::Int(1), RowValues::Text("two".into()), RowValues::Int(1)]
        );
    }

    #[test]
    fn skips_literals_comments_and_casts() {
        let sql = "select ':a', \"x:a\", `y:a`, :a::text -- :b\n/* :b /* :b */ */ from t";
        let bound = bind_named(sql, PlaceholderStyle::Postgres, &params()).unwrap();
        assert_eq!(
            bound.sql,
            "select ':a', \"x:a\", `y:a`, $1::text -- :b\n/* :b /* :b */ */ from t"
        );
        assert_eq!(bound.values, vec![RowValues::Int(1)]);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "do $body$ begin perform :a; end $body$; select :a";
        let bound = bind_named(sql, PlaceholderStyle::Postgres, &params()).unwrap();
        assert_eq!(bound.sql, "do $body$ begin perform :a; end $body$; select $1");
    }

    #[test]
    fn mysql_backslash_escapes() {
        let sql = r"select 'it\'s :a', :b";
        let bound = bind_named(sql, PlaceholderStyle::Mysql, &params()).unwrap();
        assert_eq!(bound.sql, r"select 'it\'s :a', ?");
    }

    #[test]
    fn keeps_non_ascii_text() {
        let bound = bind_named("select 'héllo', :a, 'wörld'", PlaceholderStyle::Sqlite, &params())
            .unwrap();
        assert_eq!(bound.sql, "select 'héllo', ?1, 'wörld'");
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = bind_named("select :zzz", PlaceholderStyle::Postgres, &params()).unwrap_err();
        assert!(matches!(err, SqlCaddyError::ParameterError(msg) if msg.contains(":zzz")));
    }

    #[test]
    fn no_params_passes_through() {
        let sql = "select :a";
        let bound = bind_named(sql, PlaceholderStyle::Postgres, &NamedParams::new()).unwrap();
        assert!(matches!(bound.sql, Cow::Borrowed(_)));
        assert!(bound.values.is_empty());
    }

    #[test]
    fn renders_literals_for_display() {
        let params = NamedParams::new()
            .with("name", "O'Brien")
            .with("n", 3)
            .with("none", RowValues::Null)
            .with("bytes", RowValues::Blob(vec![0xde, 0xad]));
        let printed = render_inline(
            "insert into t values (:name, :n, :none, :bytes)",
            &params,
        )
        .unwrap();
        assert_eq!(printed, "insert into t values ('O''Brien', 3, NULL, X'dead')");
    }
}
