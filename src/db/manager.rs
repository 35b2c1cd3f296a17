//! Per-invocation connection lifecycle.
//!
//! Every tool invocation opens its own session through
//! [`ConnectionManager::acquire`] and gets back a [`ConnectionGuard`]. The
//! guard owns the session exclusively and releases it exactly once: through
//! [`ConnectionGuard::release`] on the normal path, or in `Drop` when the
//! operation errors out, panics or is cancelled.
//!
//! # Usage
//!
//! ```ignore
//! let mut guard = manager.acquire().await?;
//! let result = inspector.list_tables(guard.connection(), schema, true).await;
//! guard.release().await;
//! result
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::db::connector::{Connector, SqlxConnector};
use crate::error::DbResult;

/// Lifetime counters for sessions opened by a [`ConnectionManager`].
#[derive(Debug, Default)]
pub struct ConnectionStats {
    acquired: AtomicU64,
    released: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    /// Sessions successfully opened.
    pub acquired: u64,
    /// Sessions handed back, explicitly or by drop.
    pub released: u64,
    /// Connection attempts that failed.
    pub failed: u64,
}

impl StatsSnapshot {
    /// Sessions currently held by a guard.
    pub fn active(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

impl ConnectionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        // Read `released` first so a concurrent release never shows
        // released > acquired.
        let released = self.released.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let acquired = self.acquired.load(Ordering::SeqCst);
        StatsSnapshot {
            acquired,
            released,
            failed,
        }
    }
}

/// Opens one session per request and tracks every handle it gives out.
pub struct ConnectionManager<C: Connector = SqlxConnector> {
    connector: Arc<C>,
    stats: Arc<ConnectionStats>,
    next_id: AtomicU64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            stats: Arc::new(ConnectionStats::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Open a session for the duration of one operation.
    ///
    /// Failures are returned to the caller as-is; nothing is retried here.
    pub async fn acquire(&self) -> DbResult<ConnectionGuard<C>> {
        let conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(connection = id, "Connection acquired");

        Ok(ConnectionGuard {
            conn: Some(conn),
            connector: Arc::clone(&self.connector),
            stats: Arc::clone(&self.stats),
            id,
        })
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// RAII guard for one database session.
///
/// The session is released when [`release`](Self::release) is awaited or,
/// failing that, when the guard is dropped. The drop path counts the release
/// immediately and closes the session on a spawned task, so it also covers
/// cancellation of the owning future.
pub struct ConnectionGuard<C: Connector = SqlxConnector> {
    conn: Option<C::Connection>,
    connector: Arc<C>,
    stats: Arc<ConnectionStats>,
    id: u64,
}

impl<C: Connector> ConnectionGuard<C> {
    /// Get the session owned by this guard.
    pub fn connection(&mut self) -> &mut C::Connection {
        match self.conn.as_mut() {
            Some(conn) => conn,
            // Only `release` and `drop` take the session, and both consume
            // the guard.
            None => unreachable!("connection guard used after release"),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Explicitly release the session (preferred over relying on Drop).
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.stats.released.fetch_add(1, Ordering::SeqCst);
            debug!(connection = self.id, "Connection released");
            self.connector.close(conn).await;
        }
    }
}

impl<C: Connector> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        self.stats.released.fetch_add(1, Ordering::SeqCst);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let connector = Arc::clone(&self.connector);
                handle.spawn(async move {
                    connector.close(conn).await;
                });
                warn!(
                    connection = self.id,
                    "Connection released via Drop - operation did not complete"
                );
            }
            Err(_) => {
                // Outside a runtime the session is dropped without a
                // graceful close.
                drop(conn);
                warn!(
                    connection = self.id,
                    "Connection dropped outside of a runtime"
                );
            }
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionGuard<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("id", &self.id)
            .field("released", &self.conn.is_none())
            .finish_non_exhaustive()
    }
}
