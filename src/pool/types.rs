use deadpool::managed::Object;

/// A connection borrowed from a [`ConnectionPool`](super::ConnectionPool).
///
/// Dereferences to the manager's connection type. Dropping it returns the connection to the
/// idle set.
pub type PooledConnection<M> = Object<M>;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Upper bound on live connections
    pub max_size: usize,
    /// Connections currently alive, idle or borrowed
    pub live: usize,
    /// Connections sitting in the idle set
    pub idle: usize,
    /// Callers waiting for a connection
    pub waiting: usize,
}

impl PoolStatus {
    /// Connections currently borrowed.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.live.saturating_sub(self.idle)
    }
}
