use std::time::Duration;

use tracing::debug;

use crate::error::SqlCaddyError;
use crate::locator::{DatabaseLocator, current_username};

/// Translate a locator into a `tokio_postgres::Config`.
///
/// Honours the `host`, `port`, `application_name` and `connect_timeout`
/// query parameters. A host starting with `/` is a unix socket directory.
///
/// # Errors
/// Returns `SqlCaddyError::InvalidLocator` for malformed query parameters.
pub fn pg_config(locator: &DatabaseLocator) -> Result<tokio_postgres::Config, SqlCaddyError> {
    let mut cfg = tokio_postgres::Config::new();

    let user = locator
        .username()
        .map(str::to_string)
        .or_else(current_username)
        .unwrap_or_else(|| "postgres".to_string());
    cfg.user(&user);
    if let Some(password) = locator.password() {
        cfg.password(password);
    }

    let host = locator
        .host()
        .or_else(|| locator.query_param("host"))
        .unwrap_or("localhost");
    cfg.host(host);

    let port = match (locator.port(), locator.query_param("port")) {
        (Some(port), _) => Some(port),
        (None, Some(raw)) => Some(raw.parse::<u16>().map_err(|_| {
            SqlCaddyError::InvalidLocator(format!("invalid port query parameter {raw:?}"))
        })?),
        (None, None) => None,
    };
    if let Some(port) = port {
        cfg.port(port);
    }

    if let Some(database) = locator.database() {
        cfg.dbname(database);
    }

    for (key, value) in locator.query() {
        match key.as_str() {
            "host" | "port" => {}
            "application_name" => {
                cfg.application_name(value);
            }
            "connect_timeout" => {
                let secs: u64 = value.parse().map_err(|_| {
                    SqlCaddyError::InvalidLocator(format!("invalid connect_timeout {value:?}"))
                })?;
                cfg.connect_timeout(Duration::from_secs(secs));
            }
            other => debug!(parameter = other, "ignoring postgres locator parameter"),
        }
    }

    Ok(cfg)
}
