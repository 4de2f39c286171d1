//! Scripted in-memory connection manager.
//!
//! [`MockManager`] plugs into [`ConnectionPool`](crate::pool::ConnectionPool) like the
//! PostgreSQL manager does. Every statement a connection sees, including `BEGIN`, `COMMIT`
//! and `ROLLBACK`, is logged and answered by a responder closure.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};

use crate::connection::SqlConnection;
use crate::error::BoxError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// How a mock connection answers one statement.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Rows for `query`; `execute` reports their count.
    Rows(ResultSet),
    /// Affected-row count for `execute`; `query` returns no rows.
    Affected(u64),
    /// The statement fails; the connection stays usable.
    Fail(String),
    /// The statement fails and the connection is marked broken.
    Disconnect,
}

impl MockReply {
    /// Rows with the given column names.
    #[must_use]
    pub fn rows(columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let mut result = ResultSet::with_capacity(rows.len());
        result.set_column_names(columns.iter().map(|c| (*c).to_string()).collect());
        for row in rows {
            result.add_row_values(row);
        }
        MockReply::Rows(result)
    }
}

/// A statement as seen by a mock connection.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedStatement {
    /// Id of the connection that ran it (ids start at 1)
    pub connection: usize,
    pub sql: String,
    pub params: Vec<RowValues>,
}

#[derive(Debug, thiserror::Error)]
#[error("mock connection error: {0}")]
pub struct MockError(String);

type Responder = dyn Fn(&str, &[RowValues]) -> MockReply + Send + Sync;

#[derive(Default)]
struct MockState {
    log: Mutex<Vec<LoggedStatement>>,
    next_id: AtomicUsize,
    created: AtomicUsize,
    live: AtomicUsize,
    peak: AtomicUsize,
    fail_creates: AtomicBool,
}

impl MockState {
    fn record(&self, connection: usize, sql: &str, params: &[RowValues]) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoggedStatement {
                connection,
                sql: sql.to_string(),
                params: params.to_vec(),
            });
    }
}

/// Connection manager handing out [`MockConnection`]s.
///
/// Clones share the statement log and the counters, so a test keeps one clone for
/// inspection and hands the other to the pool.
#[derive(Clone)]
pub struct MockManager {
    state: Arc<MockState>,
    responder: Arc<Responder>,
    delay: Option<Duration>,
}

impl Default for MockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockManager")
            .field("created", &self.created())
            .field("live", &self.live())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl MockManager {
    /// Every statement succeeds with no rows and zero affected rows.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            responder: Arc::new(|_, _| MockReply::Affected(0)),
            delay: None,
        }
    }

    /// Answer statements with `responder`.
    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str, &[RowValues]) -> MockReply + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// Hold each `query`/`execute` for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make new connections fail (or succeed again).
    pub fn fail_creates(&self, fail: bool) {
        self.state.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Connections opened so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    /// Connections currently open.
    #[must_use]
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Highest number of connections open at the same time.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn statements(&self) -> Vec<LoggedStatement> {
        self.state
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// SQL text of every logged statement, in order.
    #[must_use]
    pub fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    pub fn clear_log(&self) {
        self.state
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Manager for MockManager {
    type Type = MockConnection;
    type Error = MockError;

    async fn create(&self) -> Result<MockConnection, MockError> {
        if self.state.fail_creates.load(Ordering::SeqCst) {
            return Err(MockError("connection refused".to_string()));
        }
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.created.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(live, Ordering::SeqCst);
        Ok(MockConnection {
            id,
            broken: AtomicBool::new(false),
            state: Arc::clone(&self.state),
            responder: Arc::clone(&self.responder),
            delay: self.delay,
        })
    }

    async fn recycle(&self, conn: &mut MockConnection, _: &Metrics) -> RecycleResult<MockError> {
        if conn.is_broken() {
            return Err(RecycleError::Message("connection is broken".into()));
        }
        Ok(())
    }
}

/// One scripted connection.
pub struct MockConnection {
    id: usize,
    broken: AtomicBool,
    state: Arc<MockState>,
    responder: Arc<Responder>,
    delay: Option<Duration>,
}

impl MockConnection {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    fn answer(&self, sql: &str, params: &[RowValues]) -> Result<MockReply, BoxError> {
        if self.is_broken() {
            return Err(Box::new(MockError(format!(
                "connection {} is closed",
                self.id
            ))));
        }
        self.state.record(self.id, sql, params);
        match (self.responder)(sql, params) {
            MockReply::Fail(message) => Err(Box::new(MockError(message))),
            MockReply::Disconnect => {
                self.broken.store(true, Ordering::SeqCst);
                Err(Box::new(MockError(format!("connection {} lost", self.id))))
            }
            reply => Ok(reply),
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SqlConnection for MockConnection {
    async fn batch_execute(&self, sql: &str) -> Result<(), BoxError> {
        self.answer(sql, &[]).map(|_| ())
    }

    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, BoxError> {
        self.pause().await;
        match self.answer(sql, params)? {
            MockReply::Rows(rows) => Ok(rows),
            _ => Ok(ResultSet::empty()),
        }
    }

    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, BoxError> {
        self.pause().await;
        match self.answer(sql, params)? {
            MockReply::Affected(n) => Ok(n),
            MockReply::Rows(rows) => Ok(rows.count as u64),
            _ => Ok(0),
        }
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }
}
