mod types;

use std::cell::Cell;
use std::fmt;

use deadpool::Runtime;
use deadpool::managed::{Manager, Object, Pool, PoolError, TimeoutType};
use tracing::{debug, info, warn};

use crate::config::PoolSettings;
use crate::connection::SqlConnection;
use crate::error::{DbError, DbResult};

pub use types::{PoolStatus, PooledConnection};

/// A deadpool manager whose connections speak [`SqlConnection`].
///
/// Implemented automatically; the PostgreSQL manager and the test manager both qualify.
pub trait ConnectionManager: Manager<Type: SqlConnection, Error: fmt::Display> {}

impl<M> ConnectionManager for M
where
    M: Manager,
    M::Type: SqlConnection,
    M::Error: fmt::Display,
{
}

/// Bounded pool of connections to one database.
///
/// At most `max_size` connections are alive at any time. `min_size` connections are opened
/// when the pool is built; more are opened on demand. Cloning yields another handle to the
/// same pool.
pub struct ConnectionPool<M: ConnectionManager> {
    inner: Pool<M>,
    settings: PoolSettings,
}

impl<M: ConnectionManager> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            settings: self.settings,
        }
    }
}

impl<M: ConnectionManager> fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("settings", &self.settings)
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<M: ConnectionManager> ConnectionPool<M> {
    /// Build the pool and establish `min_size` connections.
    ///
    /// # Errors
    /// Returns `DbError::Config` for invalid settings and `DbError::PoolInitialization` if
    /// the minimum connections cannot be established; the pool is closed in that case.
    pub async fn new(manager: M, settings: PoolSettings) -> DbResult<Self> {
        settings.validate()?;

        let inner = Pool::builder(manager)
            .max_size(settings.max_size)
            .wait_timeout(settings.acquire_timeout)
            .create_timeout(settings.create_timeout)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DbError::PoolInitialization(format!("pool build error: {e}")))?;

        let pool = Self { inner, settings };
        pool.warm_up().await?;
        info!(
            min_size = settings.min_size,
            max_size = settings.max_size,
            "connection pool initialized"
        );
        Ok(pool)
    }

    async fn warm_up(&self) -> DbResult<()> {
        let mut warmed = Vec::with_capacity(self.settings.min_size);
        for _ in 0..self.settings.min_size {
            match self.inner.get().await {
                Ok(conn) => warmed.push(conn),
                Err(e) => {
                    self.inner.close();
                    return Err(DbError::PoolInitialization(e.to_string()));
                }
            }
        }
        // dropping the warmed connections parks them in the idle set
        drop(warmed);
        Ok(())
    }

    /// Borrow a connection, opening a new one if none is idle and fewer than `max_size`
    /// exist, otherwise waiting for a release.
    ///
    /// # Errors
    /// `DbError::PoolExhausted` when the acquire timeout elapses, `DbError::PoolClosed` after
    /// [`ConnectionPool::close_all`], `DbError::Connection` if a new connection fails.
    pub async fn acquire(&self) -> DbResult<PooledConnection<M>> {
        let conn = self.inner.get().await.map_err(|e| self.map_pool_error(e))?;
        debug!(status = ?self.status(), "connection acquired");
        Ok(conn)
    }

    fn map_pool_error(&self, err: PoolError<M::Error>) -> DbError {
        match err {
            PoolError::Timeout(TimeoutType::Wait) => DbError::PoolExhausted(format!(
                "no connection became available within {:?} (max_size {})",
                self.settings.acquire_timeout.unwrap_or_default(),
                self.settings.max_size
            )),
            PoolError::Timeout(kind) => {
                DbError::Connection(format!("timed out while waiting for {kind:?}"))
            }
            PoolError::Closed => DbError::PoolClosed,
            PoolError::Backend(e) => DbError::Connection(e.to_string()),
            other => DbError::Connection(other.to_string()),
        }
    }

    /// Give a connection back. A broken connection is discarded instead of re-entering the
    /// idle set. Dropping a [`PooledConnection`] has the same effect for healthy connections.
    pub fn release(&self, conn: PooledConnection<M>) {
        if conn.is_broken() {
            self.discard(conn);
        } else {
            drop(conn);
        }
    }

    /// Remove a connection from the pool for good and close it.
    pub fn discard(&self, conn: PooledConnection<M>) {
        let raw = Object::take(conn);
        drop(raw);
        warn!(status = ?self.status(), "connection discarded");
    }

    /// Close the pool. Idle connections are closed now, borrowed ones when they come back;
    /// later `acquire` calls fail with `DbError::PoolClosed`. Calling it again is a no-op.
    pub fn close_all(&self) {
        if self.inner.is_closed() {
            return;
        }
        self.inner.close();
        info!("connection pool closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Close idle connections beyond `min_size`; returns how many were closed.
    pub fn shrink_idle(&self) -> usize {
        let keep = self.settings.min_size;
        let kept = Cell::new(0);
        let result = self.inner.retain(|_, _| {
            if kept.get() < keep {
                kept.set(kept.get() + 1);
                true
            } else {
                false
            }
        });
        let removed = result.removed.len();
        if removed > 0 {
            debug!(removed, "idle connections closed");
        }
        removed
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let status = self.inner.status();
        PoolStatus {
            max_size: status.max_size,
            live: status.size,
            idle: status.available,
            waiting: status.waiting,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}
