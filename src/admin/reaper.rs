use tracing::debug;

use crate::connection::AsConnection;
use crate::error::SqlCaddyError;
use crate::types::{Dialect, NamedParams, RowValues};

const PG_KILL: &str = "select pg_terminate_backend(psa.pid) \
     from pg_catalog.pg_stat_activity psa \
     where psa.pid <> pg_backend_pid()";

const MYSQL_PROCESSES: &str = "select ID as process_id \
     from information_schema.PROCESSLIST \
     where ID <> CONNECTION_ID()";

/// The statement that lists (MySQL) or terminates (PostgreSQL) other
/// sessions, narrowed to `database` when given. Without `hard_kill` only
/// sessions that are doing something are matched; idle ones are left alone.
///
/// The database name, when present, is bound as `:database`.
///
/// # Errors
/// Returns `SqlCaddyError::UnsupportedDialect` for `SQLite`, which has no
/// server sessions.
pub fn kill_query(
    dialect: Dialect,
    database: Option<&str>,
    hard_kill: bool,
) -> Result<String, SqlCaddyError> {
    let (mut sql, busy, by_database) = match dialect {
        Dialect::Postgres => (
            PG_KILL.to_string(),
            " and psa.state <> 'idle'",
            " and psa.datname = :database",
        ),
        Dialect::Mysql => (
            MYSQL_PROCESSES.to_string(),
            " and COMMAND <> 'Sleep'",
            " and DB = :database",
        ),
        Dialect::Sqlite => {
            return Err(SqlCaddyError::UnsupportedDialect(format!(
                "{dialect} has no sessions to terminate"
            )));
        }
    };
    if !hard_kill {
        sql.push_str(busy);
    }
    if database.is_some() {
        sql.push_str(by_database);
    }
    Ok(sql)
}

/// Terminate other sessions on the server, best effort.
///
/// Sessions can come and go while this runs; callers that need none left
/// must check again afterwards.
///
/// # Errors
/// Returns `SqlCaddyError::UnsupportedDialect` for `SQLite`, otherwise the
/// driver error. A MySQL session that vanished before it could be killed is
/// not an error.
pub async fn reap(
    conn: &mut impl AsConnection,
    database: Option<&str>,
    hard_kill: bool,
) -> Result<(), SqlCaddyError> {
    let conn = conn.as_connection()?;
    let dialect = conn.dialect();
    let sql = kill_query(dialect, database, hard_kill)?;
    let params = database.map_or_else(NamedParams::new, |db| {
        NamedParams::new().with("database", db)
    });

    if dialect == Dialect::Postgres {
        let terminated = conn.query(&sql, &params).await?.len();
        debug!(database, hard_kill, terminated, "reaped postgres sessions");
        return Ok(());
    }

    // MySQL: one KILL per listed process
    let processes = conn.query(&sql, &params).await?;
    let mut killed = 0usize;
    for row in &processes {
        let Some(id) = row.get_by_index(0).and_then(process_id) else {
            continue;
        };
        match conn
            .execute(&format!("kill connection {id}"), &NamedParams::new())
            .await
        {
            Ok(_) => killed += 1,
            Err(e) if e.is_vanished_session() => {
                debug!(id, "session ended before it could be killed");
            }
            Err(e) => return Err(e),
        }
    }
    debug!(database, hard_kill, killed, "reaped mysql sessions");
    Ok(())
}

fn process_id(value: &RowValues) -> Option<u64> {
    match value {
        RowValues::Int(id) => u64::try_from(*id).ok(),
        RowValues::Text(id) => id.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn postgres_query_shapes() {
        let soft = kill_query(Dialect::Postgres, Some("app"), false).unwrap();
        assert!(soft.contains("pg_terminate_backend"));
        assert!(soft.contains("psa.state <> 'idle'"));
        assert!(!soft.contains("psa.state = 'idle'"));
        assert!(soft.ends_with("psa.datname = :database"));

        let hard = kill_query(Dialect::Postgres, None, true).unwrap();
        assert!(!hard.contains("idle"));
        assert!(!hard.contains(":database"));
        assert!(hard.contains("pg_backend_pid()"));
    }

    #[test]
    fn mysql_query_shapes() {
        let soft = kill_query(Dialect::Mysql, Some("app"), false).unwrap();
        assert!(soft.contains("COMMAND <> 'Sleep'"));
        assert!(!soft.contains("COMMAND = 'Sleep'"));
        assert!(soft.contains("DB = :database"));
        assert!(soft.contains("CONNECTION_ID()"));

        let hard = kill_query(Dialect::Mysql, Some("app"), true).unwrap();
        assert!(!hard.contains("Sleep"));
    }

    #[test]
    fn process_ids() {
        assert_eq!(process_id(&RowValues::Int(42)), Some(42));
        assert_eq!(process_id(&RowValues::Text("7".into())), Some(7));
        assert_eq!(process_id(&RowValues::Int(-1)), None);
        assert_eq!(process_id(&RowValues::Null), None);
    }

    #[tokio::test]
    async fn sqlite_cannot_be_reaped() {
        assert!(matches!(
            kill_query(Dialect::Sqlite, None, true),
            Err(SqlCaddyError::UnsupportedDialect(_))
        ));
        let engine = Engine::new(&"sqlite://".parse().unwrap()).await.unwrap();
        let mut conn = engine.connect().await.unwrap();
        assert!(matches!(
            reap(&mut conn, Some("main"), true).await,
            Err(SqlCaddyError::UnsupportedDialect(_))
        ));
    }
}
