use sqlx::mysql::MySqlConnectOptions;
use tracing::debug;

use crate::error::SqlCaddyError;
use crate::locator::DatabaseLocator;

const DEFAULT_PORT: u16 = 3306;

/// Translate a locator into `sqlx` connect options.
///
/// `unix_socket` in the query string selects a socket instead of TCP. An
/// absent database name connects without a default schema.
///
/// # Errors
/// Currently infallible for parsed locators; kept fallible to match the
/// other backends.
pub fn mysql_options(locator: &DatabaseLocator) -> Result<MySqlConnectOptions, SqlCaddyError> {
    let mut opts = MySqlConnectOptions::new()
        .host(locator.host().unwrap_or("localhost"))
        .port(locator.port().unwrap_or(DEFAULT_PORT))
        .username(locator.username().unwrap_or("root"));

    if let Some(password) = locator.password() {
        opts = opts.password(password);
    }
    if let Some(database) = locator.database() {
        opts = opts.database(database);
    }

    for (key, value) in locator.query() {
        match key.as_str() {
            "unix_socket" => opts = opts.socket(value),
            "charset" => opts = opts.charset(value),
            other => debug!(parameter = other, "ignoring mysql locator parameter"),
        }
    }

    Ok(opts)
}
