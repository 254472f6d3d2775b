//! Units of work over a `may_postgres` client.
//!
//! A [`Transaction`] is a [`StoreExecutor`], so `PgStore::atomically` runs
//! every statement of a household or approval workflow on one open
//! transaction. A unit of work started inside another uses a savepoint named
//! `census_unit_{depth}`. A transaction dropped without `commit` is rolled back.

use crate::executor::{instrumented, StoreError, StoreExecutor};
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use serde::Deserialize;
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Isolation level for top-level units of work, set with
/// `database.isolation` in the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug)]
pub enum TransactionError {
    /// `BEGIN` or `SAVEPOINT` failed.
    Begin(PostgresError),
    /// `COMMIT`, `ROLLBACK` or their savepoint forms failed.
    Finish(PostgresError),
    /// The transaction was already committed or rolled back.
    Closed,
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Begin(e) => write!(f, "Could not start unit of work: {e}"),
            TransactionError::Finish(e) => write!(f, "Could not finish unit of work: {e}"),
            TransactionError::Closed => {
                write!(f, "Unit of work has already been committed or rolled back")
            }
        }
    }
}

impl std::error::Error for TransactionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransactionError::Begin(e) | TransactionError::Finish(e) => Some(e),
            TransactionError::Closed => None,
        }
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Begin(e) | TransactionError::Finish(e) => StoreError::from(e),
            TransactionError::Closed => StoreError::Other(err.to_string()),
        }
    }
}

/// Anything a unit of work can be opened on: a connection, or an open
/// transaction (which nests through a savepoint).
pub trait TransactionSource {
    /// # Errors
    ///
    /// Returns `TransactionError::Begin` if `BEGIN`/`SAVEPOINT` fails.
    fn begin_transaction(&self) -> Result<Transaction, TransactionError>;
}

#[derive(Clone, Copy)]
enum Outcome {
    Commit,
    Rollback,
}

/// An open transaction or savepoint.
///
/// # Examples
///
/// ```no_run
/// use census::config::DatabaseConfig;
/// use census::executor::{MayPostgresExecutor, StoreError, StoreExecutor};
///
/// # fn main() -> Result<(), StoreError> {
/// let executor = MayPostgresExecutor::connect_with(&DatabaseConfig::default())?;
///
/// let transaction = executor.begin()?;
/// transaction.execute(
///     "UPDATE households SET chapter = $1 WHERE household_id = $2",
///     &[&"Mumbai", &uuid::Uuid::nil()],
/// )?;
/// transaction.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction {
    client: Client,
    depth: u32,
    closed: bool,
}

impl Transaction {
    pub(crate) fn begin(client: Client, isolation: IsolationLevel) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        let sql = format!("BEGIN ISOLATION LEVEL {}", isolation.as_sql());
        client
            .execute(sql.as_str(), &[])
            .map_err(TransactionError::Begin)?;
        Ok(Self {
            client,
            depth: 0,
            closed: false,
        })
    }

    /// Open a savepoint inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Closed` when this transaction has finished,
    /// or `Begin` if the savepoint cannot be created.
    pub fn begin_nested(&self) -> Result<Transaction, TransactionError> {
        if self.closed {
            return Err(TransactionError::Closed);
        }
        let depth = self.depth + 1;
        self.client
            .execute(format!("SAVEPOINT {}", savepoint(depth)).as_str(), &[])
            .map_err(TransactionError::Begin)?;
        Ok(Transaction {
            client: self.client.clone(),
            depth,
            closed: false,
        })
    }

    /// # Errors
    ///
    /// Returns `TransactionError::Finish` if the server rejects the commit.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        self.finish(Outcome::Commit)
    }

    /// # Errors
    ///
    /// Returns `TransactionError::Finish` if the server rejects the rollback.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        self.finish(Outcome::Rollback)
    }

    /// Savepoint depth; 0 for a top-level transaction.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    fn finish(&mut self, outcome: Outcome) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::Closed);
        }
        // Closed even on failure: the server has aborted the block either way.
        self.closed = true;

        let sql = match (outcome, self.depth) {
            (Outcome::Commit, 0) => "COMMIT".to_string(),
            (Outcome::Rollback, 0) => "ROLLBACK".to_string(),
            (Outcome::Commit, depth) => format!("RELEASE SAVEPOINT {}", savepoint(depth)),
            (Outcome::Rollback, depth) => format!("ROLLBACK TO SAVEPOINT {}", savepoint(depth)),
        };

        #[cfg(feature = "tracing")]
        let _span = match outcome {
            Outcome::Commit => tracing_helpers::commit_transaction_span(),
            Outcome::Rollback => tracing_helpers::rollback_transaction_span(),
        }
        .entered();

        self.client
            .execute(sql.as_str(), &[])
            .map(|_| ())
            .map_err(TransactionError::Finish)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(TransactionError::Closed.into());
        }
        Ok(())
    }
}

fn savepoint(depth: u32) -> String {
    format!("census_unit_{depth}")
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("unit of work at depth {} dropped while open; rolling back", self.depth);
            if let Err(e) = self.finish(Outcome::Rollback) {
                log::warn!("rollback of abandoned unit of work failed: {e}");
            }
        }
    }
}

impl StoreExecutor for Transaction {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, StoreError> {
        self.ensure_open()?;
        instrumented(query, || self.client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, StoreError> {
        self.ensure_open()?;
        instrumented(query, || self.client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, StoreError> {
        self.ensure_open()?;
        instrumented(query, || self.client.query(query, params))
    }
}

impl TransactionSource for crate::executor::MayPostgresExecutor {
    fn begin_transaction(&self) -> Result<Transaction, TransactionError> {
        self.begin()
    }
}

impl TransactionSource for Transaction {
    fn begin_transaction(&self) -> Result<Transaction, TransactionError> {
        self.begin_nested()
    }
}
