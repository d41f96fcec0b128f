//! Request-scoped sessions for web handlers, independent of any framework.
//!
//! Register each database once at startup, then per request:
//! [`SessionRegistry::begin_request`], use [`RequestScope::session`] as often
//! as needed (one session per handle per request), and end with
//! [`RequestScope::finish`] passing the response status.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::SqlCaddyError;
use crate::locator::DatabaseLocator;
use crate::session::Session;

/// Response statuses after which nothing is committed.
const ERROR_STATUSES: Range<u16> = 400..600;

/// Identifies one registered database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopedSessionHandle(usize);

#[derive(Debug)]
struct Registration {
    engine: Engine,
    commit_after_request: bool,
}

/// Databases that hand out one session per request.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    registrations: Vec<Registration>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database. With `commit_after_request` the request's session
    /// is committed by [`RequestScope::finish`] unless the status is an
    /// error; otherwise it is always rolled back.
    ///
    /// # Errors
    /// Returns `SqlCaddyError` if the engine cannot be built.
    pub async fn register(
        &mut self,
        locator: &DatabaseLocator,
        commit_after_request: bool,
    ) -> Result<ScopedSessionHandle, SqlCaddyError> {
        let engine = Engine::new(locator).await?;
        self.registrations.push(Registration {
            engine,
            commit_after_request,
        });
        Ok(ScopedSessionHandle(self.registrations.len() - 1))
    }

    #[must_use]
    pub fn begin_request(&self) -> RequestScope<'_> {
        RequestScope {
            registry: self,
            sessions: BTreeMap::new(),
        }
    }

    fn registration(&self, handle: ScopedSessionHandle) -> Result<&Registration, SqlCaddyError> {
        self.registrations.get(handle.0).ok_or_else(|| {
            SqlCaddyError::ConfigError(format!("unknown scoped session handle {}", handle.0))
        })
    }
}

/// The sessions opened during one request.
#[derive(Debug)]
pub struct RequestScope<'r> {
    registry: &'r SessionRegistry,
    sessions: BTreeMap<ScopedSessionHandle, Session>,
}

impl RequestScope<'_> {
    /// The request's session for `handle`, opened on first use.
    ///
    /// # Errors
    /// Returns `SqlCaddyError::ConfigError` for a handle from another
    /// registry, or connect / `BEGIN` failures.
    pub async fn session(
        &mut self,
        handle: ScopedSessionHandle,
    ) -> Result<&mut Session, SqlCaddyError> {
        if !self.sessions.contains_key(&handle) {
            let registration = self.registry.registration(handle)?;
            let session = Session::from_engine(&registration.engine).await?;
            self.sessions.insert(handle, session);
        }
        self.sessions.get_mut(&handle).ok_or_else(|| {
            SqlCaddyError::ExecutionError(format!("scoped session {} vanished", handle.0))
        })
    }

    /// End the request: commit the sessions that asked for it when `status`
    /// is not an error (400..600), then roll back and release the rest.
    ///
    /// Every session is released even if a commit fails; the first failure
    /// is returned.
    ///
    /// # Errors
    /// Returns the first commit or rollback error.
    pub async fn finish(self, status: u16) -> Result<(), SqlCaddyError> {
        let is_error = ERROR_STATUSES.contains(&status);
        let mut first_error = None;

        for (handle, session) in self.sessions {
            let commit = self
                .registry
                .registration(handle)
                .is_ok_and(|r| r.commit_after_request)
                && !is_error;
            let outcome = if commit {
                session.commit().await
            } else {
                session.rollback().await
            };
            debug!(handle = handle.0, status, commit, "scoped session released");
            if let Err(e) = outcome {
                warn!(handle = handle.0, error = %e, "scoped session teardown failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::AsConnection;
    use crate::types::NamedParams;

    async fn file_registry(dir: &tempfile::TempDir) -> (SessionRegistry, DatabaseLocator) {
        let path = dir.path().join("scoped.db");
        let loc: DatabaseLocator = format!("sqlite:///{}", path.display()).parse().unwrap();
        let engine = Engine::new(&loc).await.unwrap();
        engine
            .connect()
            .await
            .unwrap()
            .execute_batch("create table t (x integer)")
            .await
            .unwrap();
        (SessionRegistry::new(), loc)
    }

    async fn rows(loc: &DatabaseLocator) -> usize {
        let engine = Engine::new(loc).await.unwrap();
        let mut conn = engine.connect().await.unwrap();
        conn.query("select x from t", &NamedParams::new())
            .await
            .unwrap()
            .len()
    }

    async fn request(registry: &SessionRegistry, handle: ScopedSessionHandle, status: u16) {
        let mut scope = registry.begin_request();
        scope
            .session(handle)
            .await
            .unwrap()
            .as_connection()
            .unwrap()
            .execute("insert into t values (1)", &NamedParams::new())
            .await
            .unwrap();
        scope.finish(status).await.unwrap();
    }

    #[tokio::test]
    async fn commits_successful_requests_only() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, loc) = file_registry(&dir).await;
        let handle = registry.register(&loc, true).await.unwrap();

        request(&registry, handle, 200).await;
        assert_eq!(rows(&loc).await, 1);

        request(&registry, handle, 500).await;
        request(&registry, handle, 404).await;
        assert_eq!(rows(&loc).await, 1);
    }

    #[tokio::test]
    async fn without_commit_flag_nothing_sticks() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, loc) = file_registry(&dir).await;
        let handle = registry.register(&loc, false).await.unwrap();
        request(&registry, handle, 200).await;
        assert_eq!(rows(&loc).await, 0);
    }

    #[tokio::test]
    async fn one_session_per_handle_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, loc) = file_registry(&dir).await;
        let handle = registry.register(&loc, true).await.unwrap();

        let mut scope = registry.begin_request();
        for _ in 0..3 {
            scope
                .session(handle)
                .await
                .unwrap()
                .as_connection()
                .unwrap()
                .execute("insert into t values (1)", &NamedParams::new())
                .await
                .unwrap();
        }
        assert_eq!(scope.sessions.len(), 1);
        scope.finish(201).await.unwrap();
        assert_eq!(rows(&loc).await, 3);
    }

    #[tokio::test]
    async fn foreign_handles_are_rejected() {
        let registry = SessionRegistry::new();
        let mut scope = registry.begin_request();
        assert!(matches!(
            scope.session(ScopedSessionHandle(3)).await,
            Err(SqlCaddyError::ConfigError(_))
        ));
    }
}
