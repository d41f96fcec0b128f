use tempfile::TempPath;
use tracing::{debug, warn};

use super::lifecycle::{create_database, drop_database};
use crate::error::SqlCaddyError;
use crate::locator::{DatabaseLocator, LocatorParts, build_locator, temporary_name};
use crate::types::Dialect;

/// Name prefix of every temporary database and file.
pub const TEMPORARY_PREFIX: &str = "sqlcaddy_tmp_";

/// A throwaway database that is dropped when the guard goes away.
///
/// ```rust,no_run
/// use sql_caddy::prelude::*;
///
/// # async fn demo() -> Result<(), SqlCaddyError> {
/// let temp = TemporaryDatabase::create(Dialect::Sqlite).await?;
/// with_session(temp.locator(), async |s| {
///     s.as_connection()?.execute_batch("create table t (x int)").await
/// })
/// .await?;
/// temp.cleanup().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TemporaryDatabase {
    locator: DatabaseLocator,
    file: Option<TempPath>,
    armed: bool,
}

impl TemporaryDatabase {
    /// A temporary database on the default server for `dialect` (see
    /// [`build_locator`]), or a temporary file for `SQLite`.
    ///
    /// # Errors
    /// Returns the error from creating the file or the database.
    pub async fn create(dialect: Dialect) -> Result<Self, SqlCaddyError> {
        Self::create_with(dialect, LocatorParts::default()).await
    }

    /// Like [`TemporaryDatabase::create`], with explicit connection details.
    /// Any database name in `parts` is replaced.
    ///
    /// # Errors
    /// Returns the error from creating the file or the database.
    pub async fn create_with(dialect: Dialect, parts: LocatorParts) -> Result<Self, SqlCaddyError> {
        if dialect == Dialect::Sqlite {
            let file = tempfile::Builder::new()
                .prefix(TEMPORARY_PREFIX)
                .suffix(".db")
                .tempfile()?
                .into_temp_path();
            let name = file.to_str().ok_or_else(|| {
                SqlCaddyError::ConfigError(format!(
                    "temporary path {} is not UTF-8",
                    file.display()
                ))
            })?;
            let locator = build_locator(dialect, parts.with_database(name));
            debug!(locator = %locator.redacted(), "temporary sqlite file");
            return Ok(Self {
                locator,
                file: Some(file),
                armed: true,
            });
        }

        let locator = build_locator(dialect, parts.with_database(temporary_name(TEMPORARY_PREFIX)));
        create_database(&locator, None, false).await?;
        Ok(Self {
            locator,
            file: None,
            armed: true,
        })
    }

    #[must_use]
    pub fn locator(&self) -> &DatabaseLocator {
        &self.locator
    }

    /// Leave the database (or file) in place and return its locator.
    ///
    /// # Errors
    /// Returns `SqlCaddyError::IoError` if the temporary file cannot be
    /// detached.
    pub fn keep(mut self) -> Result<DatabaseLocator, SqlCaddyError> {
        self.armed = false;
        if let Some(file) = self.file.take() {
            file.keep().map_err(|e| e.error)?;
        }
        Ok(self.locator.clone())
    }

    /// Drop the database now.
    ///
    /// # Errors
    /// Returns the drop error.
    pub async fn cleanup(mut self) -> Result<(), SqlCaddyError> {
        self.armed = false;
        match self.file.take() {
            Some(file) => file.close()?,
            None => {
                drop_database(&self.locator).await?;
            }
        }
        Ok(())
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        // the temp file, if any, removes itself
        if !self.armed || self.file.is_some() {
            return;
        }
        let locator = self.locator.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = drop_database(&locator).await {
                        warn!(locator = %locator.redacted(), error = %e, "temporary database cleanup failed");
                    }
                });
            }
            Err(_) => warn!(
                locator = %self.locator.redacted(),
                "temporary database dropped outside a tokio runtime; left in place"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::database_exists;

    #[tokio::test]
    async fn sqlite_file_goes_away() {
        let temp = TemporaryDatabase::create(Dialect::Sqlite).await.unwrap();
        let path = std::path::PathBuf::from(temp.locator().database().unwrap());
        assert!(path.exists());
        assert!(database_exists(temp.locator(), false).await.unwrap());
        drop(temp);
        assert!(!path.exists());

        let temp = TemporaryDatabase::create(Dialect::Sqlite).await.unwrap();
        let path = std::path::PathBuf::from(temp.locator().database().unwrap());
        temp.cleanup().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn kept_sqlite_file_survives() {
        let temp = TemporaryDatabase::create(Dialect::Sqlite).await.unwrap();
        let locator = temp.keep().unwrap();
        let path = std::path::PathBuf::from(locator.database().unwrap());
        assert!(path.exists());
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(TEMPORARY_PREFIX)
        );
        std::fs::remove_file(path).unwrap();
    }
}
