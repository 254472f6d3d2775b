//! Store executor
//!
//! Provides the `StoreExecutor` trait that abstracts statement execution over `may_postgres`.
//!
//! Every PostgreSQL-backed component in this crate (the entity store, the credential
//! provider, schema setup) talks to the database through this trait, so the same code
//! runs against a plain connection or inside a [`Transaction`](crate::transaction::Transaction).

use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;
use std::time::Instant;

use crate::config::DatabaseConfig;
use crate::connection::ConnectionError;
use crate::transaction::{IsolationLevel, Transaction, TransactionError};
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Storage-layer error type
#[derive(Debug)]
pub enum StoreError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query construction or execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// Uniqueness or foreign-key rule rejected the write
    Constraint(String),
    /// Connecting to the database failed
    Connection(ConnectionError),
    /// Update-by-key found no row to change
    NotFound { table: &'static str, key: String },
    /// Statement exceeded the configured timeout
    Timeout(String),
    /// Other storage errors
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
            StoreError::QueryError(s) => write!(f, "Query error: {s}"),
            StoreError::ParseError(s) => write!(f, "Parse error: {s}"),
            StoreError::Constraint(s) => write!(f, "Constraint violation: {s}"),
            StoreError::Connection(e) => write!(f, "{e}"),
            StoreError::NotFound { table, key } => write!(f, "No row in {table} for key {key}"),
            StoreError::Timeout(s) => write!(f, "Statement timed out: {s}"),
            StoreError::Other(s) => write!(f, "Store error: {s}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ConnectionError> for StoreError {
    fn from(err: ConnectionError) -> Self {
        StoreError::Connection(err)
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        let message = err.to_string();
        // 57014 = query_canceled, raised when statement_timeout fires
        if message.contains("canceling statement due to statement timeout") {
            return StoreError::Timeout(message);
        }
        if message.contains("violates unique constraint")
            || message.contains("violates foreign key constraint")
            || message.contains("duplicate key value")
        {
            return StoreError::Constraint(message);
        }
        StoreError::PostgresError(err)
    }
}

/// Trait for executing database statements
///
/// This trait abstracts execution so that a direct client and an open transaction
/// can be used interchangeably by the stores.
///
/// # Examples
///
/// ```no_run
/// use census::config::DatabaseConfig;
/// use census::executor::{MayPostgresExecutor, StoreExecutor, StoreError};
///
/// # fn main() -> Result<(), StoreError> {
/// let executor = MayPostgresExecutor::connect_with(&DatabaseConfig::default())?;
///
/// let row = executor.query_one("SELECT COUNT(*) FROM residents", &[])?;
/// let count: i64 = row.get(0);
/// # Ok(())
/// # }
/// ```
pub trait StoreExecutor {
    /// Execute a SQL statement and return the number of rows affected
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, StoreError>;

    /// Execute a query that must return exactly one row
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, StoreError>;

    /// Execute a query and return all rows
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, StoreError>;

    /// Execute a query and return the first row, if any
    fn query_opt(&self, query: &str, params: &[&dyn ToSql]) -> Result<Option<Row>, StoreError> {
        Ok(self.query_all(query, params)?.into_iter().next())
    }
}

/// [`StoreExecutor`] over one `may_postgres` connection.
pub struct MayPostgresExecutor {
    client: Client,
    isolation: IsolationLevel,
}

impl MayPostgresExecutor {
    /// Wrap an open client. Units of work run at `READ COMMITTED`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            isolation: IsolationLevel::default(),
        }
    }

    /// Connect with the database section of the configuration. Units of work
    /// on this executor run at the configured isolation level.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the connection cannot be
    /// established or prepared.
    pub fn connect_with(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let client = crate::connection::open(config)?;
        Ok(Self {
            client,
            isolation: config.isolation,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Start a transaction at this executor's isolation level.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if the transaction cannot be started.
    pub fn begin(&self) -> Result<Transaction, TransactionError> {
        Transaction::begin(self.client.clone(), self.isolation)
    }

    /// Whether the server answers a `SELECT 1`.
    pub fn is_healthy(&self) -> bool {
        match crate::connection::ping(&self.client) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("database health check failed: {e}");
                false
            }
        }
    }
}

/// Run one statement against a client with span and metric bookkeeping.
pub(crate) fn instrumented<T>(
    query: &str,
    run: impl FnOnce() -> Result<T, PostgresError>,
) -> Result<T, StoreError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(query).entered();
    #[cfg(not(feature = "tracing"))]
    let _ = query;

    let start = Instant::now();
    let result = run().map_err(|e| {
        #[cfg(feature = "metrics")]
        METRICS.record_query_error();
        StoreError::from(e)
    });

    let duration = start.elapsed();
    #[cfg(feature = "metrics")]
    METRICS.record_query_duration(duration);
    #[cfg(not(feature = "metrics"))]
    let _ = duration;

    result
}

impl StoreExecutor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, StoreError> {
        instrumented(query, || self.client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, StoreError> {
        instrumented(query, || self.client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, StoreError> {
        instrumented(query, || self.client.query(query, params))
    }
}
