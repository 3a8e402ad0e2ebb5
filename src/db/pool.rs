//! Connection pool management.
//!
//! The pool keeps idle connections in a lock-free multi-producer/multi-consumer
//! queue. `acquire` pops one, pings it and hands it out for exclusive use;
//! `release` pushes it back. An empty queue never blocks: a fresh connection is
//! opened outside the pool instead, and it joins the pool when released.
//!
//! The pool has no upper bound. Under bursty load, ad-hoc connections returned
//! through `release` stay pooled, so the idle count can exceed the initial size.

use crate::db::executor::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::{Backend, ConnectSettings};
use crossbeam_queue::SegQueue;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A connection checked out of the pool.
///
/// Owned exclusively by the caller until handed back with [`ConnectionPool::release`].
#[derive(Debug)]
pub struct PooledConnection {
    id: u64,
    conn: DbConnection,
}

impl PooledConnection {
    /// Identifier unique within the pool that opened this connection.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Deref for PooledConnection {
    type Target = DbConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Connections currently waiting in the pool.
    pub idle: usize,
    /// Connections opened since the pool was created, initial ones included.
    pub opened: u64,
    /// Connections closed after failing the liveness check.
    pub discarded: u64,
}

pub struct ConnectionPool {
    settings: ConnectSettings,
    idle: SegQueue<PooledConnection>,
    liveness_timeout: Duration,
    next_id: AtomicU64,
    discarded: AtomicU64,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("settings", &self.settings)
            .field("liveness_timeout", &self.liveness_timeout)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConnectionPool {
    /// Open a pool with `initial_size` live connections.
    ///
    /// Any failure while opening the initial connections is returned as is and
    /// is not retried. Connections opened before the failure are closed.
    pub async fn open(
        settings: ConnectSettings,
        initial_size: usize,
        liveness_timeout: Duration,
    ) -> DbResult<Arc<Self>> {
        info!(
            backend = %settings.backend,
            url = %settings.masked_url(),
            initial_size,
            "Opening connection pool"
        );

        let pool = Self {
            settings,
            idle: SegQueue::new(),
            liveness_timeout,
            next_id: AtomicU64::new(1),
            discarded: AtomicU64::new(0),
        };

        for _ in 0..initial_size {
            match pool.connect().await {
                Ok(conn) => pool.idle.push(conn),
                Err(e) => {
                    warn!(error = %e, "Initial connection failed, closing pool");
                    // The open error is what the caller needs; close failures are secondary.
                    if let Err(close_err) = pool.close_all().await {
                        debug!(error = %close_err, "Failed to close partially opened pool");
                    }
                    return Err(e);
                }
            }
        }

        info!(idle = pool.idle.len(), "Connection pool ready");
        Ok(Arc::new(pool))
    }

    pub fn backend(&self) -> Backend {
        self.settings.backend
    }

    /// Take a live connection, opening a new one when the pool is empty.
    pub async fn acquire(&self) -> DbResult<PooledConnection> {
        loop {
            let Some(mut conn) = self.idle.pop() else {
                debug!("Pool empty, opening ad-hoc connection");
                return self.connect().await;
            };

            let check = timeout(self.liveness_timeout, conn.ping()).await;
            let failure = match check {
                Ok(Ok(())) => return Ok(conn),
                Ok(Err(e)) => e,
                Err(_) => DbError::timeout("liveness check", self.liveness_timeout),
            };

            warn!(connection = conn.id, error = %failure, "Discarding dead connection");
            self.discarded.fetch_add(1, Ordering::Relaxed);
            let id = conn.id;
            if let Err(e) = conn.conn.close().await {
                debug!(connection = id, error = %e, "Failed to close dead connection");
            }
        }
    }

    /// Return a connection to the pool.
    pub fn release(&self, conn: PooledConnection) {
        self.idle.push(conn);
    }

    /// Close every pooled connection.
    ///
    /// Every connection is attempted; the first failure is returned.
    pub async fn close_all(&self) -> DbResult<()> {
        let mut first_error: Option<DbError> = None;
        let mut closed = 0usize;

        while let Some(conn) = self.idle.pop() {
            let id = conn.id;
            match conn.conn.close().await {
                Ok(()) => closed += 1,
                Err(e) => {
                    warn!(connection = id, error = %e, "Failed to close connection");
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(closed, "Connection pool closed");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.len(),
            opened: self.next_id.load(Ordering::Relaxed) - 1,
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    async fn connect(&self) -> DbResult<PooledConnection> {
        let conn = DbConnection::open(&self.settings).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(connection = id, "Connection opened");
        Ok(PooledConnection { id, conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sqlite_settings(file: &NamedTempFile) -> ConnectSettings {
        ConnectSettings::new(Backend::SQLite, format!("sqlite:{}", file.path().display()))
    }

    #[tokio::test]
    async fn test_open_creates_initial_connections() {
        let file = NamedTempFile::new().unwrap();
        let pool = ConnectionPool::open(sqlite_settings(&file), 3, Duration::from_secs(3))
            .await
            .unwrap();
        let stats = pool.stats();
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.opened, 3);
        assert_eq!(stats.discarded, 0);
        pool.close_all().await.unwrap();
        assert_eq!(pool.stats().idle, 0);
    }

    #[tokio::test]
    async fn test_empty_pool_opens_ad_hoc_and_keeps_it() {
        let file = NamedTempFile::new().unwrap();
        let pool = ConnectionPool::open(sqlite_settings(&file), 0, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(pool.stats().idle, 0);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(pool.stats().opened, 1);
        pool.release(conn);
        assert_eq!(pool.stats().idle, 1);

        let again = pool.acquire().await.unwrap();
        assert_eq!(again.id(), 1);
        assert_eq!(pool.stats().opened, 1);
        pool.release(again);
        pool.close_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_url_fails_open() {
        let settings = ConnectSettings::new(
            Backend::SQLite,
            "sqlite:/nonexistent-dir/definitely/missing.db",
        );
        let err = ConnectionPool::open(settings, 2, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_startup_fatal());
    }
}
