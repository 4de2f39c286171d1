use std::fmt;

use thiserror::Error;

/// Boxed driver error carried as the source of a failed operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type DbResult<T> = Result<T, DbError>;

/// The kind of logical operation an error or log line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Rpc,
    /// Caller-supplied SQL through one of the raw execution entry points.
    Raw,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Select => "SELECT",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Rpc => "RPC",
            Operation::Raw => "RAW SQL",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pool could not establish its minimum connections.
    #[error("Failed to initialize connection pool: {0}")]
    PoolInitialization(String),

    /// No connection became available before the acquire timeout elapsed.
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Connection error: {0}")]
    Connection(String),

    /// An unfiltered UPDATE or DELETE was refused before any SQL was sent.
    #[error("{operation} without a filter is refused (table: {table})")]
    SafetyViolation { operation: Operation, table: String },

    #[error("Cannot render {operation} for {target}: {reason}")]
    Render {
        operation: Operation,
        target: String,
        reason: String,
    },

    /// The driver reported a failure.
    ///
    /// `cause` is the SQLSTATE and the constraint, table or column names the server
    /// reported. Server messages can quote bound values, so the driver error itself is only
    /// reachable through [`std::error::Error::source`].
    #[error("{operation} on {target} failed: {cause}")]
    QueryExecution {
        operation: Operation,
        target: String,
        cause: String,
        #[source]
        source: BoxError,
    },
}

impl DbError {
    pub(crate) fn render(
        operation: Operation,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DbError::Render {
            operation,
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// True for the refusals raised before a statement reaches the database.
    #[must_use]
    pub fn is_policy_refusal(&self) -> bool {
        matches!(self, DbError::SafetyViolation { .. } | DbError::Render { .. })
    }

    /// True for failures obtaining a connection (as opposed to failures of a statement).
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            DbError::PoolInitialization(_)
                | DbError::PoolExhausted(_)
                | DbError::PoolClosed
                | DbError::Connection(_)
        )
    }
}

/// Identifies the table or procedure a scope works on, for error context and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub operation: Operation,
    pub target: String,
}

impl OperationContext {
    pub fn new(operation: Operation, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
        }
    }

    pub(crate) fn raw() -> Self {
        Self::new(Operation::Raw, "raw sql")
    }

    /// Wrap a driver failure with this context.
    pub(crate) fn failure(&self, source: impl Into<BoxError>) -> DbError {
        let source = source.into();
        DbError::QueryExecution {
            operation: self.operation,
            target: self.target.clone(),
            cause: redacted_cause(source.as_ref()),
            source,
        }
    }
}

impl fmt::Display for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.operation, self.target)
    }
}

/// Describe a driver error without anything the server may have copied from bound values
/// (message text, `DETAIL`, `WHERE`).
pub(crate) fn redacted_cause(source: &(dyn std::error::Error + Send + Sync + 'static)) -> String {
    let Some(pg) = source.downcast_ref::<tokio_postgres::Error>() else {
        return "driver error".to_string();
    };
    let Some(db) = pg.as_db_error() else {
        return if pg.is_closed() {
            "connection closed".to_string()
        } else {
            "client error".to_string()
        };
    };
    let mut cause = format!("SQLSTATE {}", db.code().code());
    for (label, name) in [
        ("table", db.table()),
        ("column", db.column()),
        ("constraint", db.constraint()),
    ] {
        if let Some(name) = name {
            cause.push_str(&format!(", {label} {name}"));
        }
    }
    cause
}
