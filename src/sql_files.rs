//! Loading `.sql` files and folders of them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};
use walkdir::WalkDir;

use crate::connection::AsConnection;
use crate::error::SqlCaddyError;

/// Contents of `path`, trimmed.
///
/// # Errors
/// Returns `SqlCaddyError::PathError` if the file cannot be read.
pub fn sql_from_file(path: impl AsRef<Path>) -> Result<String, SqlCaddyError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| SqlCaddyError::at_path(path, e))?;
    Ok(text.trim().to_string())
}

/// `(path, sql)` for every non-empty `*.sql` file under `folder`, in path
/// order. Subdirectories are searched too.
///
/// # Errors
/// Returns `SqlCaddyError::ConfigError` if `folder` is not a directory, or
/// `SqlCaddyError::PathError` if walking or reading fails.
pub fn sql_from_folder_iter(
    folder: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, String)>, SqlCaddyError> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Err(SqlCaddyError::ConfigError(format!(
            "{} is not a folder",
            folder.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(folder).to_path_buf();
            SqlCaddyError::at_path(path, e.into())
        })?;
        let is_sql = entry.path().extension().is_some_and(|ext| ext == "sql");
        if entry.file_type().is_file() && is_sql {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let sql = sql_from_file(&path)?;
        if !sql.is_empty() {
            files.push((path, sql));
        }
    }
    Ok(files)
}

/// The statements of every file [`sql_from_folder_iter`] finds.
///
/// # Errors
/// See [`sql_from_folder_iter`].
pub fn sql_from_folder(folder: impl AsRef<Path>) -> Result<Vec<String>, SqlCaddyError> {
    Ok(sql_from_folder_iter(folder)?
        .into_iter()
        .map(|(_, sql)| sql)
        .collect())
}

/// Run every file under `folder`, in order, stopping at the first failure.
///
/// The folder is walked and read on the blocking pool before anything runs.
///
/// # Errors
/// Returns the read error or the failing file's driver error.
pub async fn load_sql_from_folder(
    conn: &mut impl AsConnection,
    folder: impl AsRef<Path>,
    verbose: bool,
) -> Result<(), SqlCaddyError> {
    let folder = folder.as_ref().to_path_buf();
    let files = tokio::task::spawn_blocking(move || sql_from_folder_iter(folder))
        .await
        .map_err(|e| SqlCaddyError::ExecutionError(format!("sql folder read join error: {e}")))??;
    for (path, sql) in files {
        if verbose {
            info!(path = %path.display(), "running sql file");
        }
        if let Err(e) = conn.as_connection()?.execute_batch(&sql).await {
            error!(path = %path.display(), error = %e, "sql file failed");
            return Err(e);
        }
    }
    Ok(())
}

/// Run the statements in `path` and return them. An empty file runs nothing.
///
/// # Errors
/// Returns the read error or the driver error.
pub async fn load_sql_from_file(
    conn: &mut impl AsConnection,
    path: impl AsRef<Path>,
) -> Result<String, SqlCaddyError> {
    let path = path.as_ref();
    let sql = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SqlCaddyError::at_path(path, e))?
        .trim()
        .to_string();
    if !sql.is_empty()
        && let Err(e) = conn.as_connection()?.execute_batch(&sql).await
    {
        error!(path = %path.display(), error = %e, "sql file failed");
        return Err(e);
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::statements::table_exists;

    fn write(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    #[test]
    fn folder_is_walked_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.sql", "  create table b (x int);\n");
        write(dir.path(), "a.sql", "create table a (x int);");
        write(dir.path(), "nested/c.sql", "create table c (x int);");
        write(dir.path(), "empty.sql", "\n\n");
        write(dir.path(), "notes.txt", "not sql");

        let files = sql_from_folder_iter(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|(p, _)| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            [
                PathBuf::from("a.sql"),
                PathBuf::from("b.sql"),
                PathBuf::from("nested/c.sql")
            ]
        );
        assert_eq!(
            sql_from_folder(dir.path()).unwrap()[1],
            "create table b (x int);"
        );
    }

    #[test]
    fn non_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.sql", "select 1");
        assert!(matches!(
            sql_from_folder_iter(dir.path().join("a.sql")),
            Err(SqlCaddyError::ConfigError(_))
        ));
        assert!(matches!(
            sql_from_file(dir.path().join("missing.sql")),
            Err(SqlCaddyError::PathError { .. })
        ));
    }

    #[tokio::test]
    async fn loads_into_a_connection() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.sql", "create table one (x int);\ncreate table two (x int);");
        write(dir.path(), "2.sql", "insert into one values (1);");

        let engine = Engine::new(&"sqlite://".parse().unwrap()).await.unwrap();
        let mut conn = engine.connect().await.unwrap();
        load_sql_from_folder(&mut conn, dir.path(), true).await.unwrap();
        assert!(table_exists(&mut conn, "two", None).await.unwrap());

        write(dir.path(), "blank.sql", "   ");
        let text = load_sql_from_file(&mut conn, dir.path().join("blank.sql"))
            .await
            .unwrap();
        assert!(text.is_empty());

        write(dir.path(), "bad.sql", "create table one (x int);");
        assert!(
            load_sql_from_file(&mut conn, dir.path().join("bad.sql"))
                .await
                .is_err()
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn read_failures_surface_from_the_async_loaders() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(&"sqlite://".parse().unwrap()).await.unwrap();
        let mut conn = engine.connect().await.unwrap();

        assert!(matches!(
            load_sql_from_file(&mut conn, dir.path().join("missing.sql")).await,
            Err(SqlCaddyError::PathError { .. })
        ));
        assert!(matches!(
            load_sql_from_folder(&mut conn, dir.path().join("missing"), false).await,
            Err(SqlCaddyError::ConfigError(_))
        ));

        write(dir.path(), "one.sql", "\n  create table late (x int);  \n");
        let text = load_sql_from_file(&mut conn, dir.path().join("one.sql"))
            .await
            .unwrap();
        assert_eq!(text, "create table late (x int);");
        assert!(table_exists(&mut conn, "late", None).await.unwrap());
    }
}
